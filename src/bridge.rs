//! Turns one asynchronous service call into a synchronous join point.
//!
//! [`CallBridge::dispatch`] spawns the request on the bridge's runtime and
//! hands back a [`PendingCall`]. The caller thread then parks in
//! [`PendingCall::wait`] on a one-shot completion gate that is signaled
//! exactly once, after every retry for the request has finished.
//!
//! A wait that times out does not cancel the in-flight request; it keeps
//! running until it completes or the bridge is dropped.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;

use crate::decode::service_error_message;
use crate::{BlobVisionError, ErrorKind, Result};

/// Error half of a [`CallOutcome`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status}): {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl From<BlobVisionError> for CallError {
    fn from(err: BlobVisionError) -> Self {
        let kind = err.kind();
        let status = err.status();
        let message = match &err {
            BlobVisionError::Http { body, .. } => {
                service_error_message(body).unwrap_or_else(|| err.to_string())
            }
            _ => err.to_string(),
        };
        Self {
            kind,
            message,
            status,
        }
    }
}

/// The single value a waiting caller observes for one call.
#[derive(Clone, Debug, PartialEq)]
pub enum CallOutcome<T> {
    Success(T),
    Failure(CallError),
}

impl<T> CallOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&CallError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(err) => Some(err),
        }
    }
}

impl<T> From<Result<T>> for CallOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Failure(err.into()),
        }
    }
}

/// Lifecycle of one bridged call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Dispatched,
    Succeeded,
    Failed,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Dispatched,
            2 => Self::Succeeded,
            _ => Self::Failed,
        }
    }
}

/// Shared state cell; only forward transitions are accepted.
#[derive(Debug)]
struct CallTracker(AtomicU8);

impl CallTracker {
    fn new() -> Self {
        Self(AtomicU8::new(CallState::Idle as u8))
    }

    fn state(&self) -> CallState {
        CallState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn advance(&self, from: CallState, to: CallState) -> bool {
        let moved = self
            .0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved {
            tracing::debug!(?from, ?to, "call state changed");
        }
        moved
    }
}

/// Sending half of a one-shot completion gate. Consumed by [`signal`](Self::signal).
#[derive(Debug)]
pub struct CompletionSignal<T>(oneshot::Sender<T>);

impl<T> CompletionSignal<T> {
    /// Opens the gate. Returns `false` when nobody is waiting anymore.
    pub fn signal(self, value: T) -> bool {
        self.0.send(value).is_ok()
    }
}

/// Receiving half of a one-shot completion gate.
#[derive(Debug)]
pub struct CompletionGate<T>(oneshot::Receiver<T>);

impl<T> CompletionGate<T> {
    /// Waits for the gate to open, up to `timeout` when given.
    pub async fn opened(self, timeout: Option<Duration>) -> Result<T> {
        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.0)
                .await
                .map_err(|_| BlobVisionError::Timeout(limit))?,
            None => self.0.await,
        };
        received.map_err(|_| BlobVisionError::Interrupted)
    }
}

/// Creates a gate that opens exactly once.
pub fn completion_gate<T>() -> (CompletionSignal<T>, CompletionGate<T>) {
    let (tx, rx) = oneshot::channel();
    (CompletionSignal(tx), CompletionGate(rx))
}

/// Owns the runtime that bridged calls execute on.
///
/// Must be used from synchronous code; blocking inside another runtime
/// panics.
pub struct CallBridge {
    runtime: Runtime,
}

impl fmt::Debug for CallBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallBridge").finish_non_exhaustive()
    }
}

impl CallBridge {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .thread_name("blobvision-call")
            .build()
            .map_err(|err| {
                BlobVisionError::InvalidConfig(format!("failed to start runtime: {err}"))
            })?;
        Ok(Self { runtime })
    }

    /// Runs preparatory work (such as payload loading) to completion.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Issues exactly one request; the calling thread does not block.
    pub fn dispatch<T, F>(&self, request: F) -> PendingCall<'_, T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let tracker = Arc::new(CallTracker::new());
        let (signal, gate) = completion_gate();

        tracker.advance(CallState::Idle, CallState::Dispatched);
        tracing::info!("call dispatched");

        let task_tracker = Arc::clone(&tracker);
        self.runtime.spawn(async move {
            let outcome = CallOutcome::from(request.await);
            let terminal = if outcome.is_success() {
                CallState::Succeeded
            } else {
                CallState::Failed
            };
            task_tracker.advance(CallState::Dispatched, terminal);
            if !signal.signal(outcome) {
                tracing::debug!("caller stopped waiting; outcome discarded");
            }
        });

        PendingCall {
            bridge: self,
            tracker,
            gate,
        }
    }

    /// Dispatches `request` and waits for its outcome.
    pub fn call<T, F>(&self, request: F, timeout: Option<Duration>) -> CallOutcome<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        self.dispatch(request).wait(timeout)
    }
}

/// Handle to an in-flight call; consumed by [`PendingCall::wait`].
pub struct PendingCall<'a, T> {
    bridge: &'a CallBridge,
    tracker: Arc<CallTracker>,
    gate: CompletionGate<CallOutcome<T>>,
}

impl<T> fmt::Debug for PendingCall<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("state", &self.state())
            .finish()
    }
}

impl<T> PendingCall<'_, T> {
    pub fn state(&self) -> CallState {
        self.tracker.state()
    }

    /// Suspends the caller until the outcome arrives or `timeout` expires.
    ///
    /// An expired wait yields a `Timeout` failure; a task that ends without
    /// signaling yields an `Interrupted` failure.
    pub fn wait(self, timeout: Option<Duration>) -> CallOutcome<T> {
        let received = self.bridge.block_on(self.gate.opened(timeout));
        match received {
            Ok(outcome) => {
                tracing::info!(success = outcome.is_success(), "call completed");
                outcome
            }
            Err(err) => {
                tracing::warn!(error = %err, state = ?self.tracker.state(), "no outcome received");
                CallOutcome::Failure(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{completion_gate, CallBridge, CallOutcome, CallState, CallTracker};
    use crate::{BlobVisionError, ErrorKind};

    fn bridge() -> CallBridge {
        CallBridge::new().expect("runtime must start")
    }

    #[test]
    fn success_is_delivered_once() {
        let bridge = bridge();
        let outcome = bridge.call(async { Ok(42u32) }, Some(Duration::from_secs(5)));
        assert_eq!(outcome, CallOutcome::Success(42));
    }

    #[test]
    fn failure_carries_kind_status_and_message() {
        let bridge = bridge();
        let outcome = bridge.call(
            async {
                Err::<(), _>(BlobVisionError::Http {
                    status: 400,
                    body: r#"{"error":{"code":"InvalidRequest","message":"bad image"}}"#.to_owned(),
                })
            },
            None,
        );
        let err = outcome.failure().expect("must fail");
        assert_eq!(err.kind, ErrorKind::ServiceError);
        assert_eq!(err.status, Some(400));
        assert_eq!(err.message, "InvalidRequest: bad image");
        assert_eq!(
            err.to_string(),
            "ServiceError (status 400): InvalidRequest: bad image"
        );
    }

    #[test]
    fn state_reaches_terminal_after_wait() {
        let bridge = bridge();
        let pending = bridge.dispatch(async { Ok("done") });
        assert!(matches!(
            pending.state(),
            CallState::Dispatched | CallState::Succeeded
        ));
        let tracker = Arc::clone(&pending.tracker);
        let outcome = pending.wait(None);
        assert!(outcome.is_success());
        assert_eq!(tracker.state(), CallState::Succeeded);
    }

    #[test]
    fn failed_call_ends_in_failed_state() {
        let bridge = bridge();
        let pending =
            bridge.dispatch(async { Err::<(), _>(BlobVisionError::Read("disk".to_owned())) });
        let tracker = Arc::clone(&pending.tracker);
        let outcome = pending.wait(None);
        assert_eq!(outcome.failure().map(|err| err.kind), Some(ErrorKind::ReadError));
        assert_eq!(tracker.state(), CallState::Failed);
    }

    #[test]
    fn timeout_yields_timeout_failure_without_cancelling() {
        let bridge = bridge();
        let finished = Arc::new(AtomicUsize::new(0));
        let task_finished = Arc::clone(&finished);
        let pending = bridge.dispatch(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            task_finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let tracker = Arc::clone(&pending.tracker);

        let outcome = pending.wait(Some(Duration::from_millis(10)));
        assert_eq!(outcome.failure().map(|err| err.kind), Some(ErrorKind::Timeout));
        assert_eq!(tracker.state(), CallState::Dispatched);

        bridge.block_on(async { tokio::time::sleep(Duration::from_millis(400)).await });
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.state(), CallState::Succeeded);
    }

    #[test]
    fn panicking_task_yields_interrupted() {
        let bridge = bridge();
        let outcome = bridge.call(
            async {
                if true {
                    panic!("request task blew up");
                }
                Ok(())
            },
            Some(Duration::from_secs(5)),
        );
        assert_eq!(
            outcome.failure().map(|err| err.kind),
            Some(ErrorKind::Interrupted)
        );
    }

    #[test]
    fn terminal_state_never_changes() {
        let tracker = CallTracker::new();
        assert!(tracker.advance(CallState::Idle, CallState::Dispatched));
        assert!(tracker.advance(CallState::Dispatched, CallState::Failed));
        assert!(!tracker.advance(CallState::Dispatched, CallState::Succeeded));
        assert!(!tracker.advance(CallState::Failed, CallState::Succeeded));
        assert_eq!(tracker.state(), CallState::Failed);
        assert!(tracker.state().is_terminal());
    }

    #[test]
    fn signal_reports_missing_waiter() {
        let (signal, gate) = completion_gate::<u8>();
        drop(gate);
        assert!(!signal.signal(1));
    }
}
