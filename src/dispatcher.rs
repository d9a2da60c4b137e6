//! Concurrent record dispatch.
//!
//! Records arrive from any number of producers (stream readers, pollers).
//! The dispatcher queues them on a bounded channel and a fixed pool of worker
//! threads evaluates each one against a sealed, shared [`TriggerRegistry`]
//! and runs the matched handlers. Unrelated records never wait on each other
//! beyond queue capacity; within one record, handlers run in registration
//! order.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ExecutionError, FilterState, GateError, GateResult};
use crate::record::Record;
use crate::registry::TriggerRegistry;
use crate::trigger::TriggerId;

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum queued records before `try_submit` rejects.
    pub queue_capacity: usize,
    /// Buffered match reports before new ones are dropped.
    pub report_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 1024,
            report_capacity: 1024,
        }
    }
}

/// Outcome of one record that matched at least one trigger.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub report_id: Uuid,
    pub event: String,
    pub matched: Vec<TriggerId>,
    pub timestamp: DateTime<Utc>,
}

/// Counter snapshot.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Records evaluated successfully (matched or not).
    pub processed: u64,
    /// Handler invocations.
    pub matched: u64,
    /// Records whose evaluation or dispatch failed, including handler panics.
    pub failed: u64,
    /// Records refused by `try_submit` because the queue was full.
    pub rejected: u64,
    /// Match reports dropped because nobody drained them.
    pub dropped_reports: u64,
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    matched: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    dropped_reports: AtomicU64,
}

struct Job {
    event: String,
    record: Record,
}

/// Worker pool that evaluates and dispatches records.
#[derive(Debug)]
pub struct Dispatcher {
    tx: Option<Sender<Job>>,
    reports: Receiver<MatchReport>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
    queue_capacity: usize,
}

impl Dispatcher {
    /// Starts the worker pool.
    ///
    /// The registry must be sealed: workers only ever read it.
    pub fn start(registry: Arc<TriggerRegistry>, config: DispatcherConfig) -> GateResult<Self> {
        if !registry.is_sealed() {
            return Err(GateError::sealed_state("trigger registry", "start dispatching", FilterState::Open));
        }

        let workers = config.workers.max(1);
        let queue_capacity = config.queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);
        let (report_tx, reports) = bounded::<MatchReport>(config.report_capacity.max(1));
        let counters = Arc::new(Counters::default());

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx = rx.clone();
            let registry = Arc::clone(&registry);
            let counters = Arc::clone(&counters);
            let report_tx = report_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("eventgate-dispatch-{idx}"))
                .spawn(move || worker_loop(&registry, &counters, &rx, &report_tx))
                .map_err(|e| GateError::internal(format!("failed to spawn dispatch worker: {e}")))?;
            handles.push(handle);
        }

        info!(workers, queue_capacity, "dispatcher started");
        Ok(Self {
            tx: Some(tx),
            reports,
            workers: handles,
            counters,
            queue_capacity,
        })
    }

    /// Queues a record without blocking.
    pub fn try_submit(&self, event: impl Into<String>, record: Record) -> GateResult<()> {
        let tx = self.sender()?;
        let job = Job {
            event: event.into(),
            record,
        };
        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(ExecutionError::QueueFull {
                    capacity: self.queue_capacity,
                }
                .into())
            }
            Err(TrySendError::Disconnected(_)) => Err(disconnected()),
        }
    }

    /// Queues a record, waiting for capacity.
    pub fn submit(&self, event: impl Into<String>, record: Record) -> GateResult<()> {
        self.sender()?
            .send(Job {
                event: event.into(),
                record,
            })
            .map_err(|_| disconnected())
    }

    /// Receiver of match reports. Clones share one queue.
    #[must_use]
    pub fn reports(&self) -> Receiver<MatchReport> {
        self.reports.clone()
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            processed: self.counters.processed.load(Ordering::Relaxed),
            matched: self.counters.matched.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            dropped_reports: self.counters.dropped_reports.load(Ordering::Relaxed),
        }
    }

    /// Stops accepting records, drains the queue and joins the workers.
    pub fn shutdown(mut self) -> DispatchStats {
        self.close();
        self.stats()
    }

    fn close(&mut self) {
        // Workers exit once the queue is drained and the last sender is gone.
        if self.tx.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("dispatch worker exited by panic");
            }
        }
        info!("dispatcher stopped");
    }

    fn sender(&self) -> GateResult<&Sender<Job>> {
        self.tx.as_ref().ok_or_else(disconnected)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.close();
    }
}

fn disconnected() -> GateError {
    ExecutionError::Disconnected {
        path: "dispatch_queue".to_string(),
    }
    .into()
}

fn worker_loop(
    registry: &TriggerRegistry,
    counters: &Counters,
    rx: &Receiver<Job>,
    report_tx: &Sender<MatchReport>,
) {
    while let Ok(Job { event, record }) = rx.recv() {
        // A panicking handler fails its own record; the worker keeps serving.
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| registry.run_event(&event, &record))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(GateError::internal(format!(
                "trigger handler panicked: {}",
                panic_message(payload.as_ref())
            ))),
        };
        match outcome {
            Ok(matched) => {
                counters.processed.fetch_add(1, Ordering::Relaxed);
                if matched.is_empty() {
                    continue;
                }
                counters.matched.fetch_add(matched.len() as u64, Ordering::Relaxed);
                let report = MatchReport {
                    report_id: Uuid::new_v4(),
                    event,
                    matched,
                    timestamp: Utc::now(),
                };
                // Never block a worker on a slow report consumer.
                if report_tx.try_send(report).is_err() {
                    counters.dropped_reports.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(err) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(event = %event, error = %err, "record dispatch failed");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::filter::FilterKind;
    use crate::schema::EventSchema;
    use crate::trigger::{RangeConstraint, TriggerSpec};

    fn registry() -> TriggerRegistry {
        let mut registry = TriggerRegistry::new();
        registry
            .define_event("tick", &EventSchema::new().attribute("price", FilterKind::Range))
            .unwrap();
        registry.define_handler("high", |_| {}).unwrap();
        registry
            .add_trigger("tick", "high", &TriggerSpec::new().range("price", RangeConstraint::Greater(100.0)))
            .unwrap();
        registry
    }

    #[test]
    fn refuses_unsealed_registry() {
        let err = Dispatcher::start(Arc::new(registry()), DispatcherConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            GateError::Execution(ExecutionError::SealedStateViolation { .. })
        ));
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg: DispatcherConfig = serde_json::from_str(r#"{"workers": 8}"#).unwrap();
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.queue_capacity, DispatcherConfig::default().queue_capacity);
    }

    #[test]
    fn counts_processed_matched_and_failed() {
        let mut registry = registry();
        registry.seal().unwrap();
        let dispatcher = Dispatcher::start(
            Arc::new(registry),
            DispatcherConfig {
                workers: 2,
                queue_capacity: 16,
                report_capacity: 16,
            },
        )
        .unwrap();
        let reports = dispatcher.reports();

        dispatcher.submit("tick", Record::new().with("price", 150)).unwrap();
        dispatcher.submit("tick", Record::new().with("price", 50)).unwrap();
        dispatcher.submit("tick", Record::new().with("price", "n/a")).unwrap();
        dispatcher.submit("unknown", Record::new()).unwrap();

        let report = reports.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(report.event, "tick");
        assert_eq!(report.matched, vec!["high"]);

        let stats = dispatcher.shutdown();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.rejected, 0);
    }

    #[test]
    fn panicking_handler_fails_only_its_record() {
        use std::sync::atomic::AtomicUsize;

        let fine_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = TriggerRegistry::new();
        registry
            .define_event("tick", &EventSchema::new().attribute("price", FilterKind::Range))
            .unwrap();
        registry
            .define_handler("boom", |_| panic!("handler exploded"))
            .unwrap();
        let counter = Arc::clone(&fine_calls);
        registry
            .define_handler("fine", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        registry
            .add_trigger("tick", "boom", &TriggerSpec::new().range("price", RangeConstraint::Greater(100.0)))
            .unwrap();
        registry
            .add_trigger("tick", "fine", &TriggerSpec::new().range("price", RangeConstraint::Less(10.0)))
            .unwrap();
        registry.seal().unwrap();

        let dispatcher = Dispatcher::start(
            Arc::new(registry),
            DispatcherConfig {
                workers: 2,
                queue_capacity: 16,
                report_capacity: 16,
            },
        )
        .unwrap();
        let reports = dispatcher.reports();

        dispatcher.submit("tick", Record::new().with("price", 500)).unwrap();
        dispatcher.submit("tick", Record::new().with("price", 500)).unwrap();
        dispatcher.submit("tick", Record::new().with("price", 1)).unwrap();

        let report = reports.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(report.matched, vec!["fine"]);

        // Both workers survived: the pool still accepts and serves records.
        dispatcher.submit("tick", Record::new().with("price", 2)).unwrap();
        let report = reports.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(report.matched, vec!["fine"]);

        let stats = dispatcher.shutdown();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.matched, 2);
        assert_eq!(fine_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn try_submit_reports_full_queue() {
        let mut registry = TriggerRegistry::new();
        registry
            .define_event("tick", &EventSchema::new().attribute("price", FilterKind::Range))
            .unwrap();
        let (gate_tx, gate_rx) = bounded::<()>(0);
        registry
            .define_handler("slow", move |_| {
                let _ = gate_rx.recv();
            })
            .unwrap();
        registry.add_trigger("tick", "slow", &TriggerSpec::new()).unwrap();
        registry.seal().unwrap();

        let dispatcher = Dispatcher::start(
            Arc::new(registry),
            DispatcherConfig {
                workers: 1,
                queue_capacity: 1,
                report_capacity: 4,
            },
        )
        .unwrap();

        // First record occupies the worker, second fills the queue.
        dispatcher.submit("tick", Record::new().with("price", 1)).unwrap();
        let mut full = None;
        for _ in 0..100 {
            match dispatcher.try_submit("tick", Record::new().with("price", 2)) {
                Ok(()) => {}
                Err(err) => {
                    full = Some(err);
                    break;
                }
            }
        }
        let err = full.expect("queue never filled");
        assert!(err.is_retryable());
        assert!(dispatcher.stats().rejected >= 1);

        drop(gate_tx);
        let stats = dispatcher.shutdown();
        assert_eq!(stats.failed, 0);
    }
}
