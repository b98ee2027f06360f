use crate::service::{
    AllocationRequest, CollectReply, CollectRequest, HeapService, ReferenceRequest,
    WorkloadRequest,
};
use crate::{
    Algorithm, AutoRunState, Block, BlockId, CellState, CycleRecord, HeapConfig, HeapSnapshot,
    HeapStats, NoticeLevel, Result, Session, VizConfig, VizError, WorkloadKind,
};
use parking_lot::Mutex;

// Answers with canned data. Any operation whose name is in `failing` answers
// with a 500 instead.
#[derive(Default)]
struct Stub {
    snapshot: Mutex<HeapSnapshot>,
    cycles: Mutex<Vec<CycleRecord>>,
    failing: Mutex<Vec<&'static str>>,
    calls: Mutex<Vec<String>>,
    workload: Mutex<Option<WorkloadRequest>>,
}

impl Stub {
    fn with_blocks(blocks: Vec<Block>) -> Self {
        let stub = Stub::default();
        *stub.snapshot.lock() = HeapSnapshot::from_blocks(
            HeapStats {
                total_size: 1024,
                ..HeapStats::default()
            },
            blocks,
        );
        stub
    }

    fn fail(&self, op: &'static str) {
        self.failing.lock().push(op);
    }

    fn call(&self, op: &'static str) -> Result<()> {
        self.calls.lock().push(op.to_string());

        if self.failing.lock().contains(&op) {
            return Err(VizError::Status {
                status: 500,
                body: format!("{} is broken", op),
            });
        }

        Ok(())
    }
}

impl HeapService for Stub {
    fn init_heap(&self, config: &HeapConfig) -> Result<()> {
        self.call("init")?;
        self.snapshot.lock().stats.total_size = config.total_size;
        Ok(())
    }

    fn heap_state(&self) -> Result<HeapSnapshot> {
        self.call("state")?;
        Ok(self.snapshot.lock().clone())
    }

    fn allocate(&self, request: &AllocationRequest) -> Result<BlockId> {
        self.call("allocate")?;
        let mut snapshot = self.snapshot.lock();
        let id = format!("blk{:05}", snapshot.blocks.len());
        let mut block = Block::new(id.clone(), request.size);
        block.root = request.root;
        snapshot.blocks.push(block);
        Ok(BlockId::new(id))
    }

    fn deallocate(&self, id: &BlockId) -> Result<()> {
        self.call("deallocate")?;
        self.snapshot.lock().blocks.retain(|block| &block.id != id);
        Ok(())
    }

    fn add_reference(&self, _: &ReferenceRequest) -> Result<()> {
        self.call("add_reference")
    }

    fn remove_reference(&self, _: &ReferenceRequest) -> Result<()> {
        self.call("remove_reference")
    }

    fn collect(&self, request: &CollectRequest) -> Result<CollectReply> {
        self.call("collect")?;
        let mut snapshot = self.snapshot.lock();
        let before = snapshot.blocks.len() as u64;
        snapshot.blocks.retain(|block| block.root);
        let freed = before - snapshot.blocks.len() as u64;

        let record = CycleRecord {
            cycle_id: 0,
            algorithm: request.algorithm,
            timestamp: "2024-05-01T10:00:00".into(),
            objects_scanned: before,
            objects_freed: freed,
            bytes_reclaimed: freed * 16,
            pause_duration: 0.5,
            collection_type: None,
            extra: Default::default(),
        };

        let mut cycles = self.cycles.lock();
        let cycle_id = cycles.len() as u64 + 1;
        cycles.push(CycleRecord {
            cycle_id,
            ..record.clone()
        });

        Ok(CollectReply {
            metrics: record,
            heap: snapshot.stats.clone(),
            blocks: snapshot.blocks.clone(),
        })
    }

    fn generate_workload(&self, request: &WorkloadRequest) -> Result<()> {
        self.call("workload")?;
        *self.workload.lock() = Some(request.clone());
        let mut snapshot = self.snapshot.lock();
        for _ in 0..request.count {
            let id = format!("wl{:06}", snapshot.blocks.len());
            snapshot.blocks.push(Block::new(id, 1));
        }
        Ok(())
    }

    fn cycles(&self) -> Result<Vec<CycleRecord>> {
        self.call("cycles")?;
        Ok(self.cycles.lock().clone())
    }

    fn reset_heap(&self) -> Result<()> {
        self.call("reset")?;
        self.snapshot.lock().blocks.clear();
        self.cycles.lock().clear();
        Ok(())
    }
}

fn session(stub: Stub) -> Session<Stub> {
    Session::new(stub, VizConfig::default())
}

#[test]
fn initialize_replaces_snapshot() {
    let session = session(Stub::default());

    session.initialize(1024, 16).unwrap();
    let state = session.state();

    assert_eq!(state.heap, HeapConfig { total_size: 1024, block_size: 16 });
    assert_eq!(state.grid().len(), 64);
    assert_eq!(state.grid().count(CellState::Free), 64);
    assert_eq!(state.revision, 1);
}

#[test]
fn failed_command_leaves_state_untouched() {
    let session = session(Stub::with_blocks(vec![Block::new("a", 2)]));
    session.start().unwrap();
    let before = session.state();

    session.service().fail("allocate");
    let err = session.allocate(1, true).unwrap_err();

    assert!(err.is_remote());
    assert_eq!(session.state(), before);
}

#[test]
fn failed_refetch_leaves_state_untouched() {
    let session = session(Stub::default());
    session.start().unwrap();
    let before = session.state();

    session.service().fail("state");

    assert!(session.allocate(1, false).is_err());
    assert_eq!(session.state(), before);
}

#[test]
fn every_command_publishes_a_notice() {
    let session = session(Stub::default());

    session.start().unwrap();
    session.service().fail("collect");
    assert!(session.collect(Algorithm::Copying, false).is_err());

    let notices = session.drain_notices();
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].level, NoticeLevel::Success);
    assert_eq!(notices[1].level, NoticeLevel::Failure);
    assert_eq!(notices[1].message, "GC failed");
    assert!(session.drain_notices().is_empty());
}

#[test]
fn collect_applies_snapshot_record_and_history_together() {
    let session = session(Stub::default());
    session.start().unwrap();
    session.allocate(1, true).unwrap();
    session.allocate(1, false).unwrap();
    let revision = session.revision();

    let record = session.collect(Algorithm::MarkSweep, false).unwrap();
    let state = session.state();

    assert_eq!(record.objects_freed, 1);
    assert_eq!(state.revision, revision + 1);
    assert_eq!(state.snapshot.blocks.len(), 1);
    assert_eq!(state.snapshot.roots, vec![state.snapshot.blocks[0].id.clone()]);
    assert_eq!(state.last_cycle, Some(record.clone()));
    // the service's history carries the cycle id
    assert_eq!(state.history.len(), 1);
    assert_eq!(state.history[0].cycle_id, 1);
    assert_eq!(record.cycle_id, 1);
}

#[test]
fn last_cycle_takes_its_id_from_the_history() {
    let session = session(Stub::default());
    session.start().unwrap();

    session.collect(Algorithm::MarkSweep, false).unwrap();
    session.collect(Algorithm::Copying, false).unwrap();
    session.service().fail("cycles");
    session.collect(Algorithm::Generational, true).unwrap();

    let state = session.state();
    let last = state.last_cycle.unwrap();
    assert_eq!(last.cycle_id, 3);
    assert_eq!(state.history.last(), Some(&last));
}

#[test]
fn collect_appends_locally_when_history_is_unavailable() {
    let session = session(Stub::default());
    session.start().unwrap();
    session.collect(Algorithm::MarkSweep, false).unwrap();

    session.service().fail("cycles");
    session.collect(Algorithm::Copying, false).unwrap();
    let history = session.state().history;

    assert_eq!(history.len(), 2);
    assert_eq!(history[1].algorithm, Algorithm::Copying);
    assert_eq!(history[1].cycle_id, 2);
}

#[test]
fn reset_clears_history_and_last_cycle() {
    let session = session(Stub::default());
    session.start().unwrap();
    session.collect(Algorithm::Generational, true).unwrap();

    session.reset().unwrap();
    let state = session.state();

    assert!(state.history.is_empty());
    assert!(state.last_cycle.is_none());
    assert!(session.comparison().is_empty());
}

#[test]
fn initialize_keeps_history() {
    let session = session(Stub::default());
    session.start().unwrap();
    session.collect(Algorithm::MarkSweep, false).unwrap();

    session.initialize(2048, 32).unwrap();

    assert_eq!(session.state().history.len(), 1);
    assert_eq!(session.state().heap.block_size, 32);
}

#[test]
fn refresh_pulls_history_without_mutating() {
    let stub = Stub::default();
    stub.cycles.lock().push(CycleRecord {
        cycle_id: 7,
        algorithm: Algorithm::ReferenceCounting,
        timestamp: String::new(),
        objects_scanned: 0,
        objects_freed: 0,
        bytes_reclaimed: 0,
        pause_duration: 0.1,
        collection_type: None,
        extra: Default::default(),
    });
    let session = session(stub);

    session.refresh().unwrap();

    assert_eq!(session.state().history[0].cycle_id, 7);
    assert_eq!(
        *session.service().calls.lock(),
        vec!["state".to_string(), "cycles".to_string()]
    );
}

#[test]
fn deallocate_and_references_refetch() {
    let session = session(Stub::default());
    session.start().unwrap();
    let a = session.allocate(1, true).unwrap();
    let b = session.allocate(1, false).unwrap();

    session.add_reference(&a, &b).unwrap();
    session.remove_reference(&a, &b).unwrap();
    session.deallocate(&b).unwrap();

    assert_eq!(session.state().snapshot.blocks.len(), 1);

    let calls = session.service().calls.lock().clone();
    let tail: Vec<&str> = calls.iter().rev().take(6).rev().map(String::as_str).collect();
    assert_eq!(
        tail,
        vec!["add_reference", "state", "remove_reference", "state", "deallocate", "state"]
    );
}

#[test]
fn workload_uses_configured_probabilities() {
    let session = session(Stub::default());
    session.start().unwrap();

    session.generate_workload(WorkloadKind::Mixed, 5).unwrap();

    let request = session.service().workload.lock().clone().unwrap();
    assert_eq!(request.kind, WorkloadKind::Mixed);
    assert_eq!(request.count, 5);
    assert_eq!(request.root_prob, 0.3);
    assert_eq!(request.ref_density, 0.3);
    assert_eq!(session.state().snapshot.blocks.len(), 5);
}

#[test]
fn workload_follows_config_overrides() {
    let config = VizConfig {
        workload_root_prob: 0.9,
        workload_ref_density: 0.1,
        ..VizConfig::default()
    };
    let session = Session::new(Stub::default(), config);

    session.generate_workload(WorkloadKind::Circular, 3).unwrap();

    let request = session.service().workload.lock().clone().unwrap();
    assert_eq!((request.root_prob, request.ref_density), (0.9, 0.1));
}

#[test]
fn auto_run_keeps_going_through_failures() {
    let config = VizConfig {
        auto_run_period: 80,
        auto_run_step_delay: 10,
        ..VizConfig::default()
    };
    let session = Session::new(Stub::default(), config);
    session.start().unwrap();
    session.service().fail("workload");

    assert_eq!(session.toggle_auto_run(), AutoRunState::Running);
    std::thread::sleep(std::time::Duration::from_millis(80 * 2 + 40));
    assert_eq!(session.toggle_auto_run(), AutoRunState::Idle);

    // failed workloads do not stop the collect that follows
    assert!(session.state().history.len() >= 2);
    let cycles = session.state().history.len();
    assert_eq!(session.next_auto_run_algorithm(), Algorithm::ALL[cycles % 4]);

    let notices = session.drain_notices();
    assert_eq!(notices.last().unwrap().message, "Auto-run stopped");
}
