//! Deadline-bounded execution of blocking calls.
//!
//! A [`Gateway`] runs each unit of work on its own detached OS thread and
//! races it against the configured deadline. The caller gets whichever
//! comes first: the work's outcome or [`GatewayError::Timeout`].
//!
//! The worker is a plain thread rather than a task on tokio's blocking
//! pool. Dropping a runtime joins its blocking pool, so a wedged native
//! call there would also wedge process exit.
//!
//! The work itself is never cancelled. The native host API offers no way
//! to stop a call in progress, so a timed-out call keeps running in the
//! background and its eventual outcome is discarded. The outcome is
//! delivered through a single-slot [`oneshot`] channel: sending into it
//! never waits for a receiver, so abandoned work always finishes once the
//! native call returns.
//!
//! There is no cap on abandoned work. If the host API wedges, background
//! threads accumulate; [`Gateway::in_flight`] exposes the current count.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use hnswrap_common::{DeadlineConfig, GatewayError, HnsResult};
use tokio::sync::oneshot;

use crate::api::CallOutcome;

/// Races blocking work against a deadline.
#[derive(Debug, Clone)]
pub struct Gateway {
    config: Arc<DeadlineConfig>,
    in_flight: Arc<AtomicUsize>,
}

impl Gateway {
    /// Create a gateway using `config` for every call.
    #[must_use]
    pub fn new(config: DeadlineConfig) -> Self {
        Self {
            config: Arc::new(config),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a gateway applying one deadline to every operation.
    #[must_use]
    pub fn with_timeout(call_timeout: Duration) -> Self {
        Self::new(DeadlineConfig::new(call_timeout))
    }

    /// The deadline configuration.
    #[must_use]
    pub fn config(&self) -> &DeadlineConfig {
        &self.config
    }

    /// Number of calls whose work has not returned yet, including calls
    /// that already timed out.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run `work` with the deadline configured for `operation`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Underlying`] if the work reported an error.
    /// - [`GatewayError::Timeout`] if the deadline elapsed first.
    /// - [`GatewayError::Abandoned`] if the work panicked.
    /// - [`GatewayError::Spawn`] if no worker thread could be started.
    pub async fn execute<T, F>(&self, operation: &'static str, work: F) -> HnsResult<T>
    where
        F: FnOnce() -> CallOutcome<T> + Send + 'static,
        T: Send + 'static,
    {
        let deadline = self.config.timeout_for(operation);
        self.execute_with_deadline(operation, deadline, work).await
    }

    /// Run `work`, waiting at most `deadline` for its outcome.
    ///
    /// A zero deadline still starts the work but returns
    /// [`GatewayError::Timeout`] without waiting.
    ///
    /// # Errors
    ///
    /// See [`Gateway::execute`].
    pub async fn execute_with_deadline<T, F>(
        &self,
        operation: &'static str,
        deadline: Duration,
        work: F,
    ) -> HnsResult<T>
    where
        F: FnOnce() -> CallOutcome<T> + Send + 'static,
        T: Send + 'static,
    {
        let call = self.start(operation, deadline, work)?;

        if deadline.is_zero() {
            tracing::warn!(operation, "Zero deadline, not waiting for call");
            return Err(call.expired());
        }

        call.wait().await
    }

    fn start<T, F>(
        &self,
        operation: &'static str,
        deadline: Duration,
        work: F,
    ) -> HnsResult<PendingCall<T>>
    where
        F: FnOnce() -> CallOutcome<T> + Send + 'static,
        T: Send + 'static,
    {
        let (slot, outcome) = oneshot::channel();
        let ticket = InFlight::acquire(&self.in_flight);
        let started = Instant::now();

        tracing::debug!(
            operation,
            deadline = ?deadline,
            in_flight = ticket.count(),
            "Starting guarded call"
        );

        // Detached: the JoinHandle is dropped and nothing ever joins it.
        thread::Builder::new()
            .name(format!("hns-{operation}"))
            .spawn(move || {
                let _ticket = ticket;
                let result = work();
                if slot.send(result).is_err() {
                    tracing::warn!(
                        operation,
                        elapsed = ?started.elapsed(),
                        "Call completed after its caller stopped waiting, outcome discarded"
                    );
                }
            })
            .map_err(|err| {
                tracing::error!(operation, error = %err, "Failed to start worker thread");
                GatewayError::Spawn {
                    operation,
                    message: err.to_string(),
                }
            })?;

        Ok(PendingCall {
            operation,
            deadline,
            started,
            outcome,
        })
    }
}

/// One invocation in progress.
struct PendingCall<T> {
    operation: &'static str,
    deadline: Duration,
    started: Instant,
    outcome: oneshot::Receiver<CallOutcome<T>>,
}

impl<T> PendingCall<T> {
    async fn wait(self) -> HnsResult<T> {
        match tokio::time::timeout(self.deadline, self.outcome).await {
            Ok(Ok(result)) => {
                tracing::debug!(
                    operation = self.operation,
                    elapsed = ?self.started.elapsed(),
                    ok = result.is_ok(),
                    "Guarded call finished"
                );
                result.map_err(GatewayError::Underlying)
            }
            Ok(Err(_)) => {
                tracing::error!(
                    operation = self.operation,
                    "Guarded call dropped its outcome slot"
                );
                Err(GatewayError::Abandoned {
                    operation: self.operation,
                })
            }
            Err(_) => {
                tracing::warn!(
                    operation = self.operation,
                    deadline = ?self.deadline,
                    "Guarded call timed out, leaving it to finish in the background"
                );
                Err(GatewayError::Timeout {
                    operation: self.operation,
                    deadline: self.deadline,
                })
            }
        }
    }

    /// Give up without waiting. The receiver is dropped here.
    fn expired(self) -> GatewayError {
        GatewayError::Timeout {
            operation: self.operation,
            deadline: self.deadline,
        }
    }
}

/// Counts a call as outstanding until its work returns or unwinds.
struct InFlight {
    counter: Arc<AtomicUsize>,
    count: usize,
}

impl InFlight {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        let count = counter.fetch_add(1, Ordering::AcqRel) + 1;
        Self {
            counter: Arc::clone(counter),
            count,
        }
    }

    const fn count(&self) -> usize {
        self.count
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hnswrap_common::HcnError;

    #[tokio::test(flavor = "multi_thread")]
    async fn returns_value_before_deadline() {
        let gateway = Gateway::with_timeout(Duration::from_secs(1));
        let value = gateway.execute("Ping", || Ok(42)).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn passes_native_error_through() {
        let gateway = Gateway::with_timeout(Duration::from_secs(1));
        let err = gateway
            .execute::<(), _>("Ping", || Err(HcnError::with_code(5, "access denied")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Underlying(HcnError::with_code(5, "access denied"))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn times_out_slow_work() {
        let gateway = Gateway::with_timeout(Duration::from_millis(20));
        let err = gateway
            .execute("Ping", || {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Timeout {
                operation: "Ping",
                deadline: Duration::from_millis(20),
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn zero_deadline_still_runs_work() {
        let gateway = Gateway::with_timeout(Duration::ZERO);
        let (tx, rx) = std::sync::mpsc::channel();

        let err = gateway
            .execute("Ping", move || {
                tx.send(()).unwrap();
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panicking_work_is_abandoned() {
        let gateway = Gateway::with_timeout(Duration::from_secs(1));
        let err = gateway
            .execute::<(), _>("Ping", || panic!("backend blew up"))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Abandoned { operation: "Ping" });

        // The ticket is released during unwinding.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(gateway.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn per_operation_override() {
        let gateway = Gateway::new(
            DeadlineConfig::new(Duration::from_millis(10))
                .with_override("Slow", Duration::from_secs(2)),
        );

        let slow = || {
            std::thread::sleep(Duration::from_millis(100));
            Ok(())
        };
        assert!(gateway.execute("Slow", slow).await.is_ok());
        assert!(gateway.execute("Fast", slow).await.unwrap_err().is_timeout());
    }

    #[test]
    fn runtime_drop_does_not_wait_for_timed_out_work() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let gateway = Gateway::with_timeout(Duration::from_millis(50));

        let err = runtime
            .block_on(gateway.execute("DeleteNetwork", || {
                std::thread::sleep(Duration::from_secs(3));
                Ok(())
            }))
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(gateway.in_flight(), 1);

        let dropping = Instant::now();
        drop(runtime);
        assert!(
            dropping.elapsed() < Duration::from_secs(1),
            "runtime drop took {:?}",
            dropping.elapsed()
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn worker_thread_is_named_after_operation() {
        let gateway = Gateway::with_timeout(Duration::from_secs(1));
        let name = gateway
            .execute("CreateNetwork", || {
                Ok(std::thread::current().name().map(str::to_owned))
            })
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("hns-CreateNetwork"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn in_flight_counts_abandoned_work() {
        let gateway = Gateway::with_timeout(Duration::from_millis(10));
        let (release, wait) = std::sync::mpsc::channel::<()>();

        let err = gateway
            .execute("Ping", move || {
                wait.recv().ok();
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(gateway.in_flight(), 1);

        release.send(()).unwrap();
        for _ in 0..100 {
            if gateway.in_flight() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(gateway.in_flight(), 0);
    }
}
