mod http;

pub use http::HttpService;

use super::error::Result;
use super::model::{Algorithm, Block, BlockId, CycleRecord, HeapConfig, HeapStats, WorkloadKind};
use super::model::HeapSnapshot;

use serde::{Deserialize, Serialize};

// The simulation service owns the heap and runs the collectors. A session only
// ever talks to it through this trait, which lets tests swap in an in-memory
// heap.
pub trait HeapService: Send + Sync + 'static {
    fn init_heap(&self, config: &HeapConfig) -> Result<()>;
    fn heap_state(&self) -> Result<HeapSnapshot>;
    fn allocate(&self, request: &AllocationRequest) -> Result<BlockId>;
    fn deallocate(&self, id: &BlockId) -> Result<()>;
    fn add_reference(&self, request: &ReferenceRequest) -> Result<()>;
    fn remove_reference(&self, request: &ReferenceRequest) -> Result<()>;
    fn collect(&self, request: &CollectRequest) -> Result<CollectReply>;
    fn generate_workload(&self, request: &WorkloadRequest) -> Result<()>;
    fn cycles(&self) -> Result<Vec<CycleRecord>>;
    fn reset_heap(&self) -> Result<()>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub size: u32,
    pub root: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AllocationReply {
    pub block_id: BlockId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRequest {
    pub from_id: BlockId,
    pub to_id: BlockId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectRequest {
    pub algorithm: Algorithm,
    pub minor_only: bool,
}

/// Everything a collection changes, returned in one response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectReply {
    pub metrics: CycleRecord,
    pub heap: HeapStats,
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRequest {
    #[serde(rename = "type")]
    pub kind: WorkloadKind,
    pub count: u32,
    pub root_prob: f64,
    pub ref_density: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CyclesReply {
    #[serde(default)]
    pub cycles: Vec<CycleRecord>,
}
