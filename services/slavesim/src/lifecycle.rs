//! Listener lifecycle of one simulated slave
//!
//! A [`ServerLifecycle`] owns the background listener bound to one transport.
//! Phase changes are published on a broadcast channel; the current state is
//! also observable through a `watch` channel.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{Result, SlaveSimError};
use crate::facade::RegisterFacade;
use crate::listener;
use crate::server::SlaveService;
use crate::transport::{TransportClaim, TransportConfig, TransportRegistry};

/// Upper bound for the second wait after a listener task was aborted
const ABORT_GRACE: Duration = Duration::from_millis(100);

/// Lifecycle state of a slave listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Stopped,
    Starting,
    Listening,
    Stopping,
    Error,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Listening => "listening",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Error => "error",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published phase, with the detail each phase carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusPhase {
    Starting,
    /// Bound address summary
    Listening(String),
    Stopping,
    Stopped,
    /// Cause of the failure
    Error(String),
}

impl StatusPhase {
    pub fn state(&self) -> LifecycleState {
        match self {
            StatusPhase::Starting => LifecycleState::Starting,
            StatusPhase::Listening(_) => LifecycleState::Listening,
            StatusPhase::Stopping => LifecycleState::Stopping,
            StatusPhase::Stopped => LifecycleState::Stopped,
            StatusPhase::Error(_) => LifecycleState::Error,
        }
    }
}

impl fmt::Display for StatusPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusPhase::Starting => f.write_str("starting"),
            StatusPhase::Listening(addr) => write!(f, "listening {}", addr),
            StatusPhase::Stopping => f.write_str("stopping"),
            StatusPhase::Stopped => f.write_str("stopped"),
            StatusPhase::Error(detail) => write!(f, "error {}", detail),
        }
    }
}

/// One status message on the notification channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusNotification {
    pub slave: String,
    pub phase: StatusPhase,
    pub at: DateTime<Utc>,
}

impl fmt::Display for StatusNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.slave, self.phase)
    }
}

/// Sending half of the status channel, shared by all lifecycles
#[derive(Debug, Clone)]
pub struct StatusNotifier {
    tx: broadcast::Sender<StatusNotification>,
}

impl StatusNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusNotification> {
        self.tx.subscribe()
    }

    /// Publish a phase; having no subscriber is not an error
    pub fn notify(&self, slave: &str, phase: StatusPhase) {
        info!(slave = %slave, "{}", phase);
        let _ = self.tx.send(StatusNotification {
            slave: slave.to_string(),
            phase,
            at: Utc::now(),
        });
    }
}

impl Default for StatusNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Timing of teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// How long `stop()` waits for the listener task before abandoning it
    pub teardown_timeout: Duration,
    /// Pause after release before `stopped` is reported
    pub settle_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            teardown_timeout: Duration::from_secs(2),
            settle_delay: Duration::from_millis(200),
        }
    }
}

/// Shared pieces every lifecycle of one simulator uses
#[derive(Debug, Clone, Default)]
pub struct LifecycleContext {
    pub registry: TransportRegistry,
    pub notifier: StatusNotifier,
    pub options: LifecycleOptions,
}

#[derive(Debug)]
struct RunningListener {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    claim: TransportClaim,
    endpoint: String,
}

/// Start/stop state machine around one background listener
#[derive(Debug)]
pub struct ServerLifecycle {
    name: Arc<str>,
    unit_id: u8,
    transport: TransportConfig,
    facade: Arc<RegisterFacade>,
    ctx: LifecycleContext,
    state: Arc<watch::Sender<LifecycleState>>,
    running: Option<RunningListener>,
}

impl ServerLifecycle {
    pub fn new(
        name: impl Into<Arc<str>>,
        unit_id: u8,
        transport: TransportConfig,
        facade: Arc<RegisterFacade>,
        ctx: LifecycleContext,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Stopped);
        Self {
            name: name.into(),
            unit_id,
            transport,
            facade,
            ctx,
            state: Arc::new(state),
            running: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Address summary reported by the listener while it is bound
    pub fn bound_address(&self) -> Option<&str> {
        self.running.as_ref().map(|r| r.endpoint.as_str())
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Listening
    }

    /// Replace name, unit id and transport; only allowed while not running
    pub fn reconfigure(
        &mut self,
        name: impl Into<Arc<str>>,
        unit_id: u8,
        transport: TransportConfig,
    ) -> Result<()> {
        if self.running.is_some() {
            return Err(SlaveSimError::invalid_state(format!(
                "{} must be stopped before its transport changes",
                self.name
            )));
        }
        self.name = name.into();
        self.unit_id = unit_id;
        self.transport = transport;
        Ok(())
    }

    /// Bind the transport and serve in the background
    ///
    /// No-op while starting or listening. Resolves once the listener reports
    /// its bind outcome; bind failures leave the lifecycle in `error`.
    pub async fn start(&mut self) -> Result<()> {
        match self.state() {
            LifecycleState::Starting | LifecycleState::Listening => {
                info!(slave = %self.name, "start ignored, already {}", self.state());
                return Ok(());
            },
            _ => {},
        }

        // Leftovers of a listener that failed after binding
        if let Some(stale) = self.running.take() {
            self.teardown(stale).await;
        }

        self.set_phase(StatusPhase::Starting);

        if let Err(e) = self.transport.validate() {
            return Err(self.fail(e));
        }
        let claim = match self.ctx.registry.claim(&self.transport, &self.name) {
            Ok(claim) => claim,
            Err(e) => return Err(self.fail(e)),
        };

        let cancel = CancellationToken::new();
        let service = SlaveService::new(
            Arc::clone(&self.name),
            self.unit_id,
            Arc::clone(&self.facade),
            cancel.clone(),
        )
        .with_tcp_wildcard(matches!(self.transport, TransportConfig::Tcp(_)));

        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = self.spawn_listener(service, cancel.clone(), ready_tx);

        match ready_rx.await {
            Ok(Ok(endpoint)) => {
                let promoted = self.state.send_if_modified(|state| {
                    if *state == LifecycleState::Starting {
                        *state = LifecycleState::Listening;
                        true
                    } else {
                        false
                    }
                });
                let running = RunningListener {
                    cancel,
                    handle,
                    claim,
                    endpoint: endpoint.clone(),
                };
                if !promoted {
                    // The listener died between bind and promotion
                    self.teardown(running).await;
                    return Err(SlaveSimError::bind(
                        self.transport.summary(),
                        "listener exited right after binding",
                    ));
                }
                self.ctx
                    .notifier
                    .notify(&self.name, StatusPhase::Listening(endpoint));
                self.running = Some(running);
                Ok(())
            },
            Ok(Err(e)) => {
                let _ = handle.await;
                drop(claim);
                Err(self.fail(e))
            },
            Err(_) => {
                let detail = match handle.await {
                    Err(join) => format!("listener task failed: {}", join),
                    Ok(()) => "listener exited without reporting".to_string(),
                };
                drop(claim);
                Err(self.fail(SlaveSimError::internal(detail)))
            },
        }
    }

    fn spawn_listener(
        &self,
        service: SlaveService,
        cancel: CancellationToken,
        ready: listener::ReadySender,
    ) -> JoinHandle<()> {
        let serve = listener::run(self.transport.clone(), service, cancel.clone(), ready);
        self.supervise(cancel, serve)
    }

    /// Run `serve` in the background; an uncancelled failure moves the state to `error`
    fn supervise<F>(&self, cancel: CancellationToken, serve: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let name = Arc::clone(&self.name);
        let state = Arc::clone(&self.state);
        let notifier = self.ctx.notifier.clone();

        tokio::spawn(async move {
            let Err(e) = serve.await else {
                return;
            };
            if cancel.is_cancelled() {
                return;
            }
            error!(slave = %name, "Listener failed: {}", e);
            let moved = state.send_if_modified(|s| {
                if matches!(*s, LifecycleState::Starting | LifecycleState::Listening) {
                    *s = LifecycleState::Error;
                    true
                } else {
                    false
                }
            });
            if moved {
                notifier.notify(&name, StatusPhase::Error(e.to_string()));
            }
        })
    }

    /// Cancel the listener, release the transport and report `stopped`
    ///
    /// Idempotent. A listener that outlives the teardown timeout is abandoned
    /// with a warning; `stopped` is still reached.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            if self.state() == LifecycleState::Error {
                self.set_phase(StatusPhase::Stopped);
            }
            return Ok(());
        };

        self.set_phase(StatusPhase::Stopping);
        if let Some(warning) = self.teardown(running).await {
            warn!(slave = %self.name, "{}", warning);
        }
        tokio::time::sleep(self.ctx.options.settle_delay).await;
        self.set_phase(StatusPhase::Stopped);
        Ok(())
    }

    /// Returns the teardown timeout warning, if the task had to be abandoned
    async fn teardown(&self, running: RunningListener) -> Option<SlaveSimError> {
        let RunningListener {
            cancel,
            mut handle,
            claim,
            endpoint,
        } = running;
        cancel.cancel();

        let waited = self.ctx.options.teardown_timeout;
        let warning = match tokio::time::timeout(waited, &mut handle).await {
            Ok(_) => None,
            Err(_) => {
                handle.abort();
                let _ = tokio::time::timeout(ABORT_GRACE, &mut handle).await;
                Some(SlaveSimError::TeardownTimeout {
                    endpoint: endpoint.clone(),
                    waited_ms: waited.as_millis() as u64,
                })
            },
        };
        drop(claim);
        info!(slave = %self.name, "Released {}", endpoint);
        warning
    }

    fn set_phase(&self, phase: StatusPhase) {
        self.state.send_replace(phase.state());
        self.ctx.notifier.notify(&self.name, phase);
    }

    fn fail(&self, err: SlaveSimError) -> SlaveSimError {
        error!(slave = %self.name, "Start failed: {}", err);
        self.set_phase(StatusPhase::Error(err.to_string()));
        err
    }
}

impl Drop for ServerLifecycle {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            running.handle.abort();
        }
    }
}
