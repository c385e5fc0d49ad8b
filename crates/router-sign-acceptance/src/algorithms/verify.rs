//! # Sign Info Verification
//!
//! Independent re-derivation of what a sign request asks this node to sign.
//!
//! A request is only agreed to when the destination transaction rebuilt
//! locally from a *stable* source transaction hashes to exactly the hashes
//! the MPC network wants signed.

use crate::domain::{
    AcceptConfig, AcceptError, BuildTxArgs, RawTx, SignRequest, VerifyArgs,
};
use crate::ports::{AcceptRecordStore, Bridge, BridgeRegistry};
use std::sync::Arc;
use tracing::{debug, error, field, info, info_span, trace, Span};

/// Verifies sign requests against the chains they claim to come from.
pub struct SignInfoVerifier {
    identifier: String,
    mpc_initiator: String,
    bridges: Arc<dyn BridgeRegistry>,
    records: Option<Arc<dyn AcceptRecordStore>>,
}

impl SignInfoVerifier {
    /// Create a verifier for this node's identifier and initiator.
    pub fn new(
        config: &AcceptConfig,
        bridges: Arc<dyn BridgeRegistry>,
        records: Option<Arc<dyn AcceptRecordStore>>,
    ) -> Self {
        Self {
            identifier: config.identifier.clone(),
            mpc_initiator: config.mpc_initiator_account.clone(),
            bridges,
            records,
        }
    }

    /// Verify a sign request.
    ///
    /// Returns the parsed build args whenever parsing got that far. Their
    /// swap fields are also recorded on the current [`request_span`].
    pub async fn verify(
        &self,
        request: &SignRequest,
    ) -> (Option<BuildTxArgs>, Result<(), AcceptError>) {
        let args = match self.parse_args(request) {
            Ok(args) => args,
            Err(err) => return (None, Err(err)),
        };
        record_swap_fields(&Span::current(), &args);
        let result = self.verify_args(request, &args).await;
        (Some(args), result)
    }

    fn parse_args(&self, request: &SignRequest) -> Result<BuildTxArgs, AcceptError> {
        let context = match request.msg_context.as_slice() {
            [single] => single,
            other => {
                return Err(AcceptError::WrongMsgContext(format!(
                    "expected 1 element, got {}",
                    other.len()
                )))
            }
        };
        BuildTxArgs::from_msg_context(context)
            .map_err(|e| AcceptError::WrongMsgContext(e.to_string()))
    }

    async fn verify_args(
        &self,
        request: &SignRequest,
        args: &BuildTxArgs,
    ) -> Result<(), AcceptError> {
        if args.identifier != self.identifier {
            return Err(AcceptError::IdentifierMismatch {
                expected: self.identifier.clone(),
                got: args.identifier.clone(),
            });
        }

        if !request.account.eq_ignore_ascii_case(&self.mpc_initiator) {
            return Err(AcceptError::InitiatorMismatch(request.account.clone()));
        }

        if let Some(records) = &self.records {
            if args.is_nonce_bearing() {
                records.check_accept_record(args).await?;
            }
        }

        self.rebuild_and_verify_msg_hash(&request.key, &request.msg_hash, args)
            .await
    }

    /// Rebuild the destination transaction and compare its signing hash.
    ///
    /// On success with a nonce-bearing destination, an accept record is
    /// saved in a detached task.
    pub async fn rebuild_and_verify_msg_hash(
        &self,
        key_id: &str,
        msg_hash: &[String],
        args: &BuildTxArgs,
    ) -> Result<(), AcceptError> {
        if !args.swap_type.is_valid() {
            return Err(AcceptError::UnknownSwapType(args.swap_type.as_u32()));
        }

        let src = self
            .bridges
            .bridge(&args.from_chain_id)
            .ok_or_else(|| AcceptError::NoBridgeForChainId(args.from_chain_id.clone()))?;
        let dst = self
            .bridges
            .bridge(&args.to_chain_id)
            .ok_or_else(|| AcceptError::NoBridgeForChainId(args.to_chain_id.clone()))?;

        let verify_args = VerifyArgs::stable_only(args.swap_type, args.log_index);
        let swap_info = src
            .verify_transaction(&args.swap_id, &verify_args)
            .await
            .map_err(AcceptError::from)?;
        debug!(
            swap_id = %args.swap_id,
            from = %swap_info.from,
            "[accept] source transaction verified"
        );

        let dst_args = args.for_destination(dst.router_mpc(), &swap_info);
        let raw_tx = dst
            .build_raw_transaction(&dst_args)
            .await
            .map_err(|e| AcceptError::BuildRawTx(e.to_string()))?;

        dst.verify_msg_hash(&raw_tx, msg_hash)
            .map_err(|e| AcceptError::MsgHashMismatch(e.to_string()))?;

        if let Some(records) = &self.records {
            if args.is_nonce_bearing() {
                spawn_save_accept_record(
                    Arc::clone(records),
                    dst,
                    key_id.to_string(),
                    args.clone(),
                    raw_tx,
                );
            }
        }

        Ok(())
    }
}

fn spawn_save_accept_record(
    records: Arc<dyn AcceptRecordStore>,
    bridge: Arc<dyn Bridge>,
    key_id: String,
    args: BuildTxArgs,
    raw_tx: RawTx,
) {
    if bridge.signed_tx_hash_source().is_none() {
        trace!(key_id = %key_id, "[accept] bridge cannot report signed tx hash, record skipped");
        return;
    }

    tokio::spawn(async move {
        let Some(source) = bridge.signed_tx_hash_source() else {
            return;
        };
        let swap_tx = match source.signed_tx_hash_for_key(&key_id, &raw_tx).await {
            Ok(hash) => hash,
            Err(e) => {
                error!(key_id = %key_id, error = %e, "[accept] get signed tx hash failed");
                return;
            }
        };
        match records.add_accept_record(&args, &swap_tx).await {
            Ok(()) => info!(
                key_id = %key_id,
                chain_id = %args.to_chain_id,
                nonce = args.nonce,
                swap_tx = %swap_tx,
                "[accept] accept record saved"
            ),
            Err(e) => error!(
                key_id = %key_id,
                chain_id = %args.to_chain_id,
                nonce = args.nonce,
                error = %e,
                "[accept] save accept record failed"
            ),
        }
    });
}

/// Span for one sign request. Swap fields start empty and are filled by
/// [`record_swap_fields`] once the message context has been parsed.
pub fn request_span(key_id: &str) -> Span {
    info_span!(
        "sign_request",
        key_id = %key_id,
        identifier = field::Empty,
        swap_type = field::Empty,
        from_chain_id = field::Empty,
        to_chain_id = field::Empty,
        swap_id = field::Empty,
        log_index = field::Empty,
        token_id = field::Empty,
    )
}

/// Attach the parsed swap context to a [`request_span`].
pub fn record_swap_fields(span: &Span, args: &BuildTxArgs) {
    span.record("identifier", field::display(&args.identifier));
    span.record("swap_type", field::display(&args.swap_type));
    span.record("from_chain_id", field::display(&args.from_chain_id));
    span.record("to_chain_id", field::display(&args.to_chain_id));
    span.record("swap_id", field::display(&args.swap_id));
    span.record("log_index", args.log_index);
    span.record("token_id", field::display(&args.token_id));
}
