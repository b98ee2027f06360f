#![allow(dead_code)]

use heapview::{
    AllocationRequest, Algorithm, Block, BlockId, CollectReply, CollectRequest, CycleRecord,
    HeapConfig, HeapService, HeapSnapshot, HeapStats, ReferenceRequest, Result, VizError,
    WorkloadKind, WorkloadRequest,
};
use parking_lot::Mutex;
use rand::prelude::*;
use std::collections::HashSet;

#[derive(Default)]
struct Heap {
    config: HeapConfig,
    blocks: Vec<Block>,
    cycles: Vec<CycleRecord>,
    next_id: u32,
}

/// A simulation service that keeps its heap in memory. Every algorithm frees
/// exactly the blocks unreachable from the roots.
pub struct FakeService {
    heap: Mutex<Heap>,
    rng: Mutex<StdRng>,
    pub offline: Mutex<bool>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(Heap::default()),
            rng: Mutex::new(StdRng::seed_from_u64(7)),
            offline: Mutex::new(false),
            requests: Mutex::new(vec![]),
        }
    }

    pub fn go_offline(&self) {
        *self.offline.lock() = true;
    }

    pub fn go_online(&self) {
        *self.offline.lock() = false;
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn request(&self, what: String) -> Result<()> {
        if *self.offline.lock() {
            return Err(VizError::Status {
                status: 503,
                body: "service unavailable".into(),
            });
        }

        self.requests.lock().push(what);
        Ok(())
    }
}

impl Heap {
    fn stats(&self) -> HeapStats {
        let used: u64 = self.blocks.iter().map(|block| block.size as u64).sum();
        let cells = self.config.total_size / self.config.block_size.max(1);

        HeapStats {
            total_size: self.config.total_size,
            free_blocks: cells.saturating_sub(used),
            allocated_blocks: used,
            total_objects: self.blocks.len() as u64,
            fragmentation: 0.0,
            root_objects: self.blocks.iter().filter(|block| block.root).count() as u64,
        }
    }

    fn snapshot(&self) -> HeapSnapshot {
        HeapSnapshot::from_blocks(self.stats(), self.blocks.clone())
    }

    fn push(&mut self, size: u32, root: bool) -> BlockId {
        self.next_id += 1;
        let id = format!("{:08x}", self.next_id.wrapping_mul(2_654_435_761));
        let mut block = Block::new(id.clone(), size);
        block.root = root;
        self.blocks.push(block);
        BlockId::new(id)
    }

    fn block_mut(&mut self, id: &BlockId) -> Result<&mut Block> {
        self.blocks
            .iter_mut()
            .find(|block| &block.id == id)
            .ok_or_else(|| VizError::Status {
                status: 404,
                body: format!("block {} not found", id),
            })
    }

    fn reachable(&self) -> HashSet<BlockId> {
        let mut seen: HashSet<BlockId> = HashSet::new();
        let mut stack: Vec<&Block> = self.blocks.iter().filter(|block| block.root).collect();

        while let Some(block) = stack.pop() {
            if !seen.insert(block.id.clone()) {
                continue;
            }
            for reference in &block.references {
                if let Some(target) = self.blocks.iter().find(|block| &block.id == reference) {
                    stack.push(target);
                }
            }
        }

        seen
    }
}

impl HeapService for FakeService {
    fn init_heap(&self, config: &HeapConfig) -> Result<()> {
        self.request(format!("init {} {}", config.total_size, config.block_size))?;
        let mut heap = self.heap.lock();
        heap.config = *config;
        heap.blocks.clear();
        Ok(())
    }

    fn heap_state(&self) -> Result<HeapSnapshot> {
        self.request("state".into())?;
        Ok(self.heap.lock().snapshot())
    }

    fn allocate(&self, request: &AllocationRequest) -> Result<BlockId> {
        self.request(format!("allocate {} {}", request.size, request.root))?;
        Ok(self.heap.lock().push(request.size, request.root))
    }

    fn deallocate(&self, id: &BlockId) -> Result<()> {
        self.request(format!("deallocate {}", id))?;
        let mut heap = self.heap.lock();
        heap.block_mut(id)?;
        heap.blocks.retain(|block| &block.id != id);
        Ok(())
    }

    fn add_reference(&self, request: &ReferenceRequest) -> Result<()> {
        self.request(format!("link {} {}", request.from_id, request.to_id))?;
        let mut heap = self.heap.lock();
        heap.block_mut(&request.to_id)?;
        let from = heap.block_mut(&request.from_id)?;
        from.references.push(request.to_id.clone());
        Ok(())
    }

    fn remove_reference(&self, request: &ReferenceRequest) -> Result<()> {
        self.request(format!("unlink {} {}", request.from_id, request.to_id))?;
        let mut heap = self.heap.lock();
        let from = heap.block_mut(&request.from_id)?;
        from.references.retain(|id| id != &request.to_id);
        Ok(())
    }

    fn collect(&self, request: &CollectRequest) -> Result<CollectReply> {
        self.request(format!("collect {}", request.algorithm))?;
        let mut heap = self.heap.lock();

        let live = heap.reachable();
        let scanned = heap.blocks.len() as u64;
        let freed: Vec<Block> = heap
            .blocks
            .iter()
            .filter(|block| !live.contains(&block.id))
            .cloned()
            .collect();
        heap.blocks.retain(|block| live.contains(&block.id));
        for block in &mut heap.blocks {
            block.marked = true;
            block.age += 1;
        }

        let block_size = heap.config.block_size;
        let mut record = CycleRecord {
            cycle_id: 0,
            algorithm: request.algorithm,
            timestamp: "2024-05-01T10:00:00".into(),
            objects_scanned: scanned,
            objects_freed: freed.len() as u64,
            bytes_reclaimed: freed.iter().map(|block| block.size as u64 * block_size).sum(),
            pause_duration: 0.1 * (scanned + 1) as f64,
            collection_type: (request.algorithm == Algorithm::Generational)
                .then(|| String::from(if request.minor_only { "minor" } else { "major" })),
            extra: Default::default(),
        };
        if request.algorithm == Algorithm::Generational {
            let promoted = scanned - freed.len() as u64;
            record.extra.insert("objects_promoted".into(), promoted.into());
        }

        let cycle_id = heap.cycles.len() as u64 + 1;
        heap.cycles.push(CycleRecord {
            cycle_id,
            ..record.clone()
        });

        Ok(CollectReply {
            metrics: record,
            heap: heap.stats(),
            blocks: heap.blocks.clone(),
        })
    }

    fn generate_workload(&self, request: &WorkloadRequest) -> Result<()> {
        self.request(format!("workload {} {}", request.kind, request.count))?;
        let mut heap = self.heap.lock();
        let mut rng = self.rng.lock();

        let ids: Vec<BlockId> = (0..request.count)
            .map(|_| {
                let root = rng.gen_bool(request.root_prob);
                heap.push(rng.gen_range(1..=3), root)
            })
            .collect();

        for (i, id) in ids.iter().enumerate() {
            let target = match request.kind {
                WorkloadKind::Circular => Some(&ids[(i + 1) % ids.len()]),
                _ if rng.gen_bool(request.ref_density) => ids.choose(&mut *rng),
                _ => None,
            };

            if let Some(target) = target.cloned() {
                heap.block_mut(id)?.references.push(target);
            }
        }

        Ok(())
    }

    fn cycles(&self) -> Result<Vec<CycleRecord>> {
        self.request("cycles".into())?;
        Ok(self.heap.lock().cycles.clone())
    }

    fn reset_heap(&self) -> Result<()> {
        self.request("reset".into())?;
        let mut heap = self.heap.lock();
        heap.blocks.clear();
        heap.cycles.clear();
        Ok(())
    }
}
