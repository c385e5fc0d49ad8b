//! # Sign Acceptance Service
//!
//! Wires the producer, dispatcher and verifier tasks around one dedup cache.
//!
//! ```text
//! MpcClient ──poll──> producer ──mpsc(queue_capacity)──> dispatcher
//!                                                           │ semaphore permit
//!                                                           ▼
//!                                     verifier task: reserve → verify → decide → submit
//! ```
//!
//! The bounded queue is the only backpressure between polling and
//! verification. Shutdown stops the producer and dispatcher; verifier tasks
//! already admitted run to completion on their own.

use crate::algorithms::{request_span, SignInfoVerifier};
use crate::domain::{
    decide, AcceptAction, AcceptConfig, AcceptError, AcceptStats, ConfigError,
    DedupCache, ProcessOutcome, Reservation, SignRequest, StatsCounters,
};
use crate::metrics;
use crate::ports::inbound::SignAcceptanceApi;
use crate::ports::outbound::{AcceptRecordStore, BridgeRegistry, MpcClient};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn, Instrument};

/// Polls are logged every this many successful polls.
const POLL_LOG_EVERY: u64 = 7;

/// State shared by the service loops and verifier tasks.
struct Shared {
    config: AcceptConfig,
    cache: Arc<DedupCache>,
    verifier: SignInfoVerifier,
    mpc: Arc<dyn MpcClient>,
    stats: StatsCounters,
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
}

/// Sign-acceptance worker.
pub struct SignAcceptanceService {
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SignAcceptanceService {
    /// Create a service. Fails if the config does not validate.
    pub fn new(
        config: AcceptConfig,
        mpc: Arc<dyn MpcClient>,
        bridges: Arc<dyn BridgeRegistry>,
        records: Option<Arc<dyn AcceptRecordStore>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let verifier = SignInfoVerifier::new(&config, bridges, records);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            shared: Arc::new(Shared {
                cache: DedupCache::new_shared(config.max_cached_keys),
                permits: Arc::new(Semaphore::new(config.max_concurrent_verifications)),
                in_flight: Arc::new(AtomicUsize::new(0)),
                stats: StatsCounters::default(),
                verifier,
                mpc,
                config,
            }),
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the producer and dispatcher loops. Must be called from within a
    /// Tokio runtime. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            warn!("[accept] service already started");
            return;
        }
        if is_shutdown(&self.shutdown_rx) {
            warn!("[accept] service was shut down, not starting");
            return;
        }

        let (tx, rx) = mpsc::channel(self.shared.config.queue_capacity);

        info!(
            identifier = %self.shared.config.identifier,
            tolerant = self.shared.config.tolerant_mode,
            max_concurrent = self.shared.config.max_concurrent_verifications,
            "[accept] starting sign acceptance"
        );

        tasks.push(tokio::spawn(run_producer(
            Arc::clone(&self.shared),
            tx,
            self.shutdown_rx.clone(),
        )));
        tasks.push(tokio::spawn(run_dispatcher(
            Arc::clone(&self.shared),
            rx,
            self.shutdown_rx.clone(),
        )));
    }

    /// Stop the producer and dispatcher and wait for both to exit.
    ///
    /// Verifier tasks already admitted are not awaited.
    pub async fn shutdown(&self) {
        info!("[accept] shutting down");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("[accept] failed to send shutdown signal: {}", e);
        }

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "[accept] service loop ended abnormally");
            }
        }
        info!("[accept] shutdown complete");
    }

    /// Dedup cache, shared with the running loops.
    pub fn cache(&self) -> &Arc<DedupCache> {
        &self.shared.cache
    }

    /// Configuration in use.
    pub fn config(&self) -> &AcceptConfig {
        &self.shared.config
    }
}

#[async_trait]
impl SignAcceptanceApi for SignAcceptanceService {
    async fn process_sign_request(&self, request: SignRequest) -> ProcessOutcome {
        let permit = match Arc::clone(&self.shared.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return ProcessOutcome::Ignored,
        };
        let _admitted = Admission::new(permit, &self.shared.in_flight);
        self.shared.process(request).await
    }

    fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    fn stats(&self) -> AcceptStats {
        self.shared.stats.snapshot()
    }
}

impl Shared {
    async fn process(&self, request: SignRequest) -> ProcessOutcome {
        let outcome = self
            .process_in_span(&request)
            .instrument(request_span(&request.key))
            .await;

        self.stats.record(&outcome);
        metrics::record_outcome(&outcome);
        outcome
    }

    async fn process_in_span(&self, request: &SignRequest) -> ProcessOutcome {
        let Some(reservation) = self.cache.try_reserve(&request.key) else {
            trace!("[accept] ignore cached sign request");
            return ProcessOutcome::AlreadyInProgress;
        };

        let (_, result) = self.verifier.verify(request).await;
        self.respond(request, reservation, result).await
    }

    async fn respond(
        &self,
        request: &SignRequest,
        mut reservation: Reservation,
        result: Result<(), AcceptError>,
    ) -> ProcessOutcome {
        let decision = match decide(&request.key, &result, self.config.tolerant_mode) {
            AcceptAction::Discard => {
                if let Err(e) = &result {
                    trace!(error = %e, "[accept] discard sign request");
                }
                reservation.mark_processed();
                return ProcessOutcome::Discarded;
            }
            AcceptAction::Ignore => {
                if let Err(e) = &result {
                    trace!(error = %e, "[accept] ignore sign request");
                }
                return ProcessOutcome::Ignored;
            }
            AcceptAction::Respond(decision) => decision,
        };

        match &result {
            Ok(()) => info!("[accept] verify sign info success"),
            Err(e) => error!(error = %e, "[accept] verify sign info failed"),
        }

        let submitted = self
            .mpc
            .submit_decision(
                &request.key,
                decision.result,
                &request.msg_hash,
                &decision.reasons,
            )
            .await;

        match submitted {
            Ok(rpc_result) => {
                info!(
                    result = %decision.result,
                    rpc_result = %rpc_result,
                    "[accept] accept sign finished"
                );
                reservation.mark_processed();
                ProcessOutcome::Submitted(decision)
            }
            Err(e) => {
                error!(
                    result = %decision.result,
                    rpc_result = e.rpc_result().unwrap_or_default(),
                    error = %e,
                    "[accept] accept sign job failed"
                );
                ProcessOutcome::SubmissionFailed
            }
        }
    }
}

/// Holds a semaphore permit and counts itself in `in_flight` until dropped.
struct Admission {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Admission {
    fn new(permit: OwnedSemaphorePermit, in_flight: &Arc<AtomicUsize>) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            _permit: permit,
            in_flight: Arc::clone(in_flight),
        }
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn is_shutdown(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Sleep for `duration`. Returns false if shutdown was signalled first.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.changed() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

async fn run_producer(
    shared: Arc<Shared>,
    tx: mpsc::Sender<SignRequest>,
    mut shutdown: watch::Receiver<bool>,
) {
    let wait_interval = shared.config.wait_interval();
    let retry_interval = shared.config.retry_interval();
    let mut polls: u64 = 0;

    'poll: while !is_shutdown(&shutdown) {
        let pending = tokio::select! {
            biased;
            _ = shutdown.changed() => break 'poll,
            pending = shared.mpc.pending_sign_requests(shared.config.max_sign_age_secs) => pending,
        };

        let requests = match pending {
            Ok(requests) => requests,
            Err(e) => {
                error!(error = %e, "[accept] get accept list failed");
                if !sleep_or_shutdown(retry_interval, &mut shutdown).await {
                    break 'poll;
                }
                continue;
            }
        };

        polls += 1;
        if polls % POLL_LOG_EVERY == 0 {
            info!(polls, pending = requests.len(), "[accept] polling sign requests");
        }

        for request in requests.into_iter().flatten() {
            if shared.cache.contains(&request.key) {
                trace!(key_id = %request.key, "[accept] ignore cached sign request");
                continue;
            }
            debug!(key_id = %request.key, "[accept] queueing sign request");
            tokio::select! {
                biased;
                _ = shutdown.changed() => break 'poll,
                sent = tx.send(request) => {
                    if sent.is_err() {
                        warn!("[accept] dispatcher gone, producer stopping");
                        break 'poll;
                    }
                }
            }
        }

        if !sleep_or_shutdown(wait_interval, &mut shutdown).await {
            break;
        }
    }

    info!(polls, "[accept] producer stopped");
}

async fn run_dispatcher(
    shared: Arc<Shared>,
    mut rx: mpsc::Receiver<SignRequest>,
    mut shutdown: watch::Receiver<bool>,
) {
    while !is_shutdown(&shutdown) {
        let request = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            next = rx.recv() => match next {
                Some(request) => request,
                None => break,
            },
        };

        let permit = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            permit = Arc::clone(&shared.permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let admission = Admission::new(permit, &shared.in_flight);
        info!(key_id = %request.key, "[accept] dispatch sign request");

        let task_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            let _admission = admission;
            task_shared.process(request).await;
        });
    }

    info!("[accept] dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticBridgeRegistry;
    use crate::domain::{BuildTxArgs, ChainId, SwapInfo, SwapType};
    use crate::ports::{MockBridge, MockMpcClient};
    use std::io;

    fn service(config: AcceptConfig) -> SignAcceptanceService {
        SignAcceptanceService::new(
            config,
            Arc::new(MockMpcClient::default()),
            Arc::new(StaticBridgeRegistry::new()),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = SignAcceptanceService::new(
            AcceptConfig::default(),
            Arc::new(MockMpcClient::default()),
            Arc::new(StaticBridgeRegistry::new()),
            None,
        );
        assert!(matches!(result, Err(ConfigError::Missing("identifier"))));
    }

    #[test]
    fn test_admission_counts_in_flight() {
        let semaphore = Arc::new(Semaphore::new(2));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let permit = || Arc::clone(&semaphore).try_acquire_owned().unwrap();

        let first = Admission::new(permit(), &in_flight);
        let second = Admission::new(permit(), &in_flight);
        assert_eq!(in_flight.load(Ordering::SeqCst), 2);
        assert_eq!(semaphore.available_permits(), 0);

        drop(first);
        assert_eq!(in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(semaphore.available_permits(), 1);
        drop(second);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_admission_released_on_panic() {
        let semaphore = Arc::new(Semaphore::new(1));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let permit = Arc::clone(&semaphore).acquire_owned().await.unwrap();
        let admission = Admission::new(permit, &in_flight);

        let handle = tokio::spawn(async move {
            let _admission = admission;
            panic!("verifier blew up");
        });
        assert!(handle.await.is_err());
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(semaphore.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_cached_key_already_in_progress() {
        let svc = service(AcceptConfig::new("router", "0xinit"));
        let _held = svc.cache().try_reserve("busy").unwrap();

        let request = SignRequest {
            key: "busy".into(),
            msg_hash: vec![],
            msg_context: vec![],
            account: "0xinit".into(),
        };
        assert_eq!(
            svc.process_sign_request(request).await,
            ProcessOutcome::AlreadyInProgress
        );
        assert_eq!(svc.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let svc = service(AcceptConfig::new("router", "0xinit"));
        svc.shutdown().await;
        svc.start();
        assert!(svc.tasks.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_noop() {
        let svc = service(AcceptConfig::new("router", "0xinit"));
        svc.start();
        svc.start();
        assert_eq!(svc.tasks.lock().len(), 2);
        svc.shutdown().await;
        assert!(svc.tasks.lock().is_empty());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_verification_logs_carry_request_context() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let registry = StaticBridgeRegistry::new()
            .with_bridge(
                ChainId::from(1),
                Arc::new(MockBridge::new("0xsrc", SwapInfo::default())),
            )
            .with_bridge(
                ChainId::from(56),
                Arc::new(MockBridge::new("0xdst", SwapInfo::default())),
            );
        let svc = SignAcceptanceService::new(
            AcceptConfig::new("router", "0xinit"),
            Arc::new(MockMpcClient::default()),
            Arc::new(registry),
            None,
        )
        .unwrap();

        let args = BuildTxArgs {
            identifier: "router".into(),
            swap_type: SwapType::Bridge,
            from_chain_id: ChainId::from(1),
            to_chain_id: ChainId::from(56),
            swap_id: "0xswap".into(),
            ..Default::default()
        };
        let request = SignRequest {
            key: "k-span".into(),
            msg_hash: vec!["0x00".into()],
            msg_context: vec![serde_json::to_string(&args).unwrap()],
            account: "0xinit".into(),
        };
        svc.process_sign_request(request).await;

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        let verified = output
            .lines()
            .find(|line| line.contains("source transaction verified"))
            .expect("verifier logged inside the request");
        assert!(verified.contains("key_id=k-span"));
        assert!(verified.contains("to_chain_id=56"));

        let failed = output
            .lines()
            .find(|line| line.contains("verify sign info failed"))
            .expect("responder logged the failure");
        assert!(failed.contains("key_id=k-span"));
        assert!(failed.contains("swap_id=0xswap"));
    }
}
