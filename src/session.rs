use super::config::VizConfig;
use super::error::Result;
use super::grid::{self, GridProjection};
use super::metrics::{self, Comparison};
use super::model::{Algorithm, BlockId, CycleRecord, HeapConfig, HeapSnapshot, WorkloadKind};
use super::monitor::{AutoRun, AutoRunState, Drive};
use super::service::{
    AllocationRequest, CollectRequest, HeapService, ReferenceRequest, WorkloadRequest,
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Failure,
}

/// A short, transient message for the user about the outcome of a command.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// The canonical state of a session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub snapshot: HeapSnapshot,
    pub heap: HeapConfig,
    /// The record returned by the most recent collect.
    pub last_cycle: Option<CycleRecord>,
    pub history: Vec<CycleRecord>,
    /// Bumped every time a command applies its result.
    pub revision: u64,
}

impl SessionState {
    pub fn grid(&self) -> GridProjection<'_> {
        grid::project(
            &self.snapshot.blocks,
            self.snapshot.stats.total_size,
            self.heap.block_size,
        )
    }

    pub fn comparison(&self) -> Comparison {
        metrics::aggregate(&self.history)
    }
}

// Issues commands to the service and applies their results to the canonical
// state. Remote calls never run under the state lock; each command applies
// everything it learned in one critical section.
pub struct Dispatcher<S: HeapService> {
    service: S,
    state: Mutex<SessionState>,
    notices: Sender<Notice>,
    workload_root_prob: f64,
    workload_ref_density: f64,
}

impl<S: HeapService> Dispatcher<S> {
    fn new(service: S, config: &VizConfig, notices: Sender<Notice>) -> Self {
        let state = SessionState {
            heap: HeapConfig {
                total_size: config.heap_total_size,
                block_size: config.heap_block_size,
            },
            ..SessionState::default()
        };

        Self {
            service,
            state: Mutex::new(state),
            notices,
            workload_root_prob: config.workload_root_prob,
            workload_ref_density: config.workload_ref_density,
        }
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        // nobody listening is fine
        let _ = self.notices.send(Notice {
            level,
            message: message.into(),
        });
    }

    // Reports the outcome of a command. Failures leave the state untouched,
    // so all that is left to do is tell the user.
    fn report<T>(
        &self,
        result: Result<T>,
        success: impl FnOnce(&T) -> String,
        failure: &str,
    ) -> Result<T> {
        match &result {
            Ok(value) => self.notify(NoticeLevel::Success, success(value)),
            Err(err) => {
                warn!("{}: {}", failure, err);
                self.notify(NoticeLevel::Failure, failure);
            }
        }

        result
    }

    fn apply<F: FnOnce(&mut SessionState)>(&self, update: F) {
        let mut state = self.state.lock();

        update(&mut state);
        state.revision += 1;
        debug!("applied session revision {}", state.revision);
    }

    fn apply_snapshot(&self, snapshot: HeapSnapshot) {
        self.apply(|state| state.snapshot = snapshot);
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    pub fn initialize(&self, total_size: u64, block_size: u64) -> Result<()> {
        let heap = HeapConfig {
            total_size,
            block_size,
        };
        let result = self.service.init_heap(&heap).and_then(|_| self.service.heap_state());

        let result = result.map(|snapshot| {
            self.apply(|state| {
                state.heap = heap;
                state.snapshot = snapshot;
            })
        });

        self.report(
            result,
            |_| "Heap initialized successfully".into(),
            "Failed to initialize heap",
        )
    }

    pub fn allocate(&self, size: u32, root: bool) -> Result<BlockId> {
        let request = AllocationRequest { size, root };
        let result = self.service.allocate(&request).and_then(|id| {
            let snapshot = self.service.heap_state()?;
            self.apply_snapshot(snapshot);
            Ok(id)
        });

        self.report(
            result,
            |_| format!("Allocated {}object", if root { "root " } else { "" }),
            "Allocation failed",
        )
    }

    pub fn deallocate(&self, id: &BlockId) -> Result<()> {
        let result = self.service.deallocate(id).and_then(|_| {
            let snapshot = self.service.heap_state()?;
            self.apply_snapshot(snapshot);
            Ok(())
        });

        self.report(result, |_| format!("Freed {}", id), "Deallocation failed")
    }

    pub fn add_reference(&self, from: &BlockId, to: &BlockId) -> Result<()> {
        let request = ReferenceRequest {
            from_id: from.clone(),
            to_id: to.clone(),
        };
        let result = self.service.add_reference(&request).and_then(|_| {
            let snapshot = self.service.heap_state()?;
            self.apply_snapshot(snapshot);
            Ok(())
        });

        self.report(
            result,
            |_| format!("Linked {} -> {}", from, to),
            "Adding reference failed",
        )
    }

    pub fn remove_reference(&self, from: &BlockId, to: &BlockId) -> Result<()> {
        let request = ReferenceRequest {
            from_id: from.clone(),
            to_id: to.clone(),
        };
        let result = self.service.remove_reference(&request).and_then(|_| {
            let snapshot = self.service.heap_state()?;
            self.apply_snapshot(snapshot);
            Ok(())
        });

        self.report(
            result,
            |_| format!("Unlinked {} -> {}", from, to),
            "Removing reference failed",
        )
    }

    pub fn collect(&self, algorithm: Algorithm, minor_only: bool) -> Result<CycleRecord> {
        let request = CollectRequest {
            algorithm,
            minor_only,
        };
        let result = self.service.collect(&request).map(|reply| {
            // The service numbers and orders cycles, so prefer its history
            // over appending locally.
            let history = match self.service.cycles() {
                Ok(history) => Some(history),
                Err(err) => {
                    warn!("could not fetch cycle history, appending locally: {}", err);
                    None
                }
            };
            let snapshot = HeapSnapshot::from_blocks(reply.heap, reply.blocks);
            let mut record = reply.metrics;

            self.apply(|state| {
                match history {
                    Some(history) => {
                        if let Some(latest) = history.last() {
                            record.cycle_id = latest.cycle_id;
                        }
                        state.history = history;
                    }
                    None => {
                        if record.cycle_id == 0 {
                            let previous = state.history.last().map_or(0, |last| last.cycle_id);
                            record.cycle_id = previous + 1;
                        }
                        state.history.push(record.clone());
                    }
                }
                state.snapshot = snapshot;
                state.last_cycle = Some(record.clone());
            });

            record
        });

        self.report(
            result,
            |record| format!("GC completed: {} objects freed", record.objects_freed),
            "GC failed",
        )
    }

    pub fn generate_workload(&self, kind: WorkloadKind, count: u32) -> Result<()> {
        let request = WorkloadRequest {
            kind,
            count,
            root_prob: self.workload_root_prob,
            ref_density: self.workload_ref_density,
        };
        let result = self.service.generate_workload(&request).and_then(|_| {
            let snapshot = self.service.heap_state()?;
            self.apply_snapshot(snapshot);
            Ok(())
        });

        self.report(
            result,
            |_| format!("Generated {} workload", kind),
            "Workload generation failed",
        )
    }

    pub fn reset(&self) -> Result<()> {
        let result = self.service.reset_heap().and_then(|_| self.service.heap_state());
        let result = result.map(|snapshot| {
            self.apply(|state| {
                state.snapshot = snapshot;
                state.last_cycle = None;
                state.history.clear();
            })
        });

        self.report(result, |_| "Simulation reset".into(), "Reset failed")
    }

    pub fn refresh(&self) -> Result<()> {
        let result = self.service.heap_state().and_then(|snapshot| {
            let history = self.service.cycles()?;
            self.apply(|state| {
                state.snapshot = snapshot;
                state.history = history;
            });
            Ok(())
        });

        match &result {
            Ok(_) => {}
            Err(err) => {
                warn!("refresh failed: {}", err);
                self.notify(NoticeLevel::Failure, "Failed to fetch heap state");
            }
        }

        result
    }
}

impl<S: HeapService> Drive for Dispatcher<S> {
    fn drive_workload(&self, kind: WorkloadKind, count: u32) {
        // already reported
        let _ = self.generate_workload(kind, count);
    }

    fn drive_collect(&self, algorithm: Algorithm) {
        let _ = self.collect(algorithm, true);
    }
}

/// A visualizer session: the canonical state of one simulated heap, the
/// commands that change it, and the auto-run driver.
///
/// Dropping the session stops auto-run before the state goes away.
pub struct Session<S: HeapService> {
    dispatcher: Arc<Dispatcher<S>>,
    auto_run: AutoRun<Dispatcher<S>>,
    notices: Receiver<Notice>,
    config: VizConfig,
}

impl<S: HeapService> Session<S> {
    pub fn new(service: S, config: VizConfig) -> Self {
        let (sender, notices) = unbounded();
        let dispatcher = Arc::new(Dispatcher::new(service, &config, sender));
        let auto_run = AutoRun::new(dispatcher.clone(), &config);

        Self {
            dispatcher,
            auto_run,
            notices,
            config,
        }
    }

    /// The service this session talks to.
    pub fn service(&self) -> &S {
        &self.dispatcher.service
    }

    pub fn config(&self) -> &VizConfig {
        &self.config
    }

    /// A copy of the current canonical state.
    pub fn state(&self) -> SessionState {
        self.dispatcher.state()
    }

    pub fn revision(&self) -> u64 {
        self.dispatcher.state.lock().revision
    }

    pub fn comparison(&self) -> Comparison {
        metrics::aggregate(&self.dispatcher.state.lock().history)
    }

    /// Every notice published since the last call.
    pub fn drain_notices(&self) -> Vec<Notice> {
        self.notices.try_iter().collect()
    }

    /// Initializes the service's heap with the configured geometry.
    pub fn start(&self) -> Result<()> {
        self.initialize(self.config.heap_total_size, self.config.heap_block_size)
    }

    pub fn initialize(&self, total_size: u64, block_size: u64) -> Result<()> {
        self.dispatcher.initialize(total_size, block_size)
    }

    pub fn allocate(&self, size: u32, root: bool) -> Result<BlockId> {
        self.dispatcher.allocate(size, root)
    }

    pub fn deallocate(&self, id: &BlockId) -> Result<()> {
        self.dispatcher.deallocate(id)
    }

    pub fn add_reference(&self, from: &BlockId, to: &BlockId) -> Result<()> {
        self.dispatcher.add_reference(from, to)
    }

    pub fn remove_reference(&self, from: &BlockId, to: &BlockId) -> Result<()> {
        self.dispatcher.remove_reference(from, to)
    }

    pub fn collect(&self, algorithm: Algorithm, minor_only: bool) -> Result<CycleRecord> {
        self.dispatcher.collect(algorithm, minor_only)
    }

    pub fn generate_workload(&self, kind: WorkloadKind, count: u32) -> Result<()> {
        self.dispatcher.generate_workload(kind, count)
    }

    pub fn reset(&self) -> Result<()> {
        self.dispatcher.reset()
    }

    pub fn refresh(&self) -> Result<()> {
        self.dispatcher.refresh()
    }

    pub fn toggle_auto_run(&self) -> AutoRunState {
        let state = self.auto_run.toggle();
        let message = match state {
            AutoRunState::Running => "Auto-run started",
            AutoRunState::Idle => "Auto-run stopped",
        };

        self.dispatcher.notify(NoticeLevel::Info, message);
        state
    }

    pub fn auto_run_state(&self) -> AutoRunState {
        self.auto_run.state()
    }

    pub fn next_auto_run_algorithm(&self) -> Algorithm {
        self.auto_run.next_algorithm()
    }
}

impl<S: HeapService> Drop for Session<S> {
    fn drop(&mut self) {
        self.auto_run.stop();
    }
}
