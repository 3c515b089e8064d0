use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pagewatch_core_types::MonitorId;

use crate::model::ScheduleInfo;

/// Executed on every tick. Implemented by the engine's check pipeline;
/// the runner itself decides whether the monitor is still checkable.
///
/// Returning `false` ends the periodic task (the monitor was auto-paused
/// or reached a terminal state).
#[async_trait]
pub trait CheckRunner: Send + Sync {
    async fn run_check(&self, monitor: MonitorId, epoch: u64) -> bool;
}

struct ScheduleHandle {
    interval: Duration,
    epoch: u64,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

/// Owns the periodic tasks and the per-monitor serialization guards.
pub struct ScheduleRuntime {
    runner: Arc<dyn CheckRunner>,
    tasks: DashMap<MonitorId, ScheduleHandle>,
    guards: DashMap<MonitorId, Arc<Mutex<()>>>,
}

impl ScheduleRuntime {
    pub fn new(runner: Arc<dyn CheckRunner>) -> Self {
        Self {
            runner,
            tasks: DashMap::new(),
            guards: DashMap::new(),
        }
    }

    /// The non-reentrant guard serializing checks for one monitor. Manual
    /// checks lock it; scheduled ticks `try_lock` it and skip on contention.
    pub fn guard(&self, monitor: &MonitorId) -> Arc<Mutex<()>> {
        self.guards
            .entry(monitor.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Start (or atomically replace) the periodic task for a monitor.
    /// A zero interval only cancels whatever was scheduled.
    pub fn schedule(&self, monitor: MonitorId, interval: Duration, epoch: u64) {
        self.cancel(&monitor);
        if interval.is_zero() {
            debug!(%monitor, "manual-only monitor, nothing scheduled");
            return;
        }

        let runner = Arc::clone(&self.runner);
        let guard = self.guard(&monitor);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task_monitor = monitor.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval() fires immediately; the first check happens one
            // interval after scheduling.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        debug!(monitor = %task_monitor, "schedule cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Ok(_permit) = guard.try_lock() else {
                            warn!(monitor = %task_monitor, "previous check still in flight, skipping tick");
                            continue;
                        };
                        tokio::select! {
                            // Cancellation drops the in-flight check; any
                            // late capture response is never applied.
                            _ = task_cancel.cancelled() => break,
                            keep_going = runner.run_check(task_monitor.clone(), epoch) => {
                                if !keep_going {
                                    debug!(monitor = %task_monitor, "runner ended the schedule");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });

        self.tasks.insert(
            monitor,
            ScheduleHandle {
                interval,
                epoch,
                started_at: Utc::now(),
                cancel,
                task,
            },
        );
    }

    /// Cancel the periodic task without touching the guard, so an in-flight
    /// manual check finishes on its own terms.
    pub fn cancel(&self, monitor: &MonitorId) {
        if let Some((_, handle)) = self.tasks.remove(monitor) {
            debug!(%monitor, "cancelling schedule");
            drop(handle);
        }
    }

    /// Drop all bookkeeping for a monitor that reached a terminal state.
    pub fn forget(&self, monitor: &MonitorId) {
        self.cancel(monitor);
        self.guards.remove(monitor);
    }

    pub fn is_scheduled(&self, monitor: &MonitorId) -> bool {
        self.reap(monitor);
        self.tasks.contains_key(monitor)
    }

    pub fn info(&self, monitor: &MonitorId) -> Option<ScheduleInfo> {
        self.reap(monitor);
        self.tasks.get(monitor).map(|handle| {
            let interval_ms = handle.interval.as_millis() as i64;
            let next_fire_at = (interval_ms > 0).then(|| {
                let elapsed_ms = (Utc::now() - handle.started_at).num_milliseconds().max(0);
                let ticks = elapsed_ms / interval_ms + 1;
                handle.started_at + chrono::Duration::milliseconds(interval_ms * ticks)
            });
            ScheduleInfo {
                monitor: monitor.clone(),
                interval: handle.interval,
                running: true,
                started_at: handle.started_at,
                next_fire_at,
            }
        })
    }

    pub fn epoch_of(&self, monitor: &MonitorId) -> Option<u64> {
        self.reap(monitor);
        self.tasks.get(monitor).map(|handle| handle.epoch)
    }

    pub fn scheduled_count(&self) -> usize {
        self.tasks.retain(|_, handle| !handle.task.is_finished());
        self.tasks.len()
    }

    /// Drop the bookkeeping entry for a task that ended on its own, so a
    /// schedule the runner terminated does not linger as scheduled.
    fn reap(&self, monitor: &MonitorId) {
        let finished = self
            .tasks
            .get(monitor)
            .map(|handle| handle.task.is_finished())
            .unwrap_or(false);
        if finished {
            debug!(%monitor, "reaping finished schedule");
            self.tasks.remove(monitor);
        }
    }
}
