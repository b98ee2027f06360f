//! Wire types shared with the simulation service.
//!
//! Field names follow the service's JSON exactly, so every type here can be
//! deserialized straight from a response body.

use super::error::VizError;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of a heap block, assigned by the service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first four characters of the id, used to label graph nodes.
    pub fn label(&self) -> &str {
        match self.0.char_indices().nth(4) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A single allocation in the simulated heap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    /// Size in grid units.
    pub size: u32,
    #[serde(default)]
    pub allocated: bool,
    #[serde(default)]
    pub marked: bool,
    #[serde(default)]
    pub root: bool,
    /// Number of collections this block has survived.
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub generation: u32,
    #[serde(default)]
    pub references: Vec<BlockId>,
}

impl Block {
    pub fn new(id: impl Into<String>, size: u32) -> Self {
        Self {
            id: BlockId::new(id),
            size,
            allocated: true,
            marked: false,
            root: false,
            age: 0,
            generation: 0,
            references: vec![],
        }
    }

    pub fn rooted(mut self) -> Self {
        self.root = true;
        self
    }

    pub fn marked(mut self) -> Self {
        self.marked = true;
        self
    }

    pub fn referencing(mut self, id: impl Into<String>) -> Self {
        self.references.push(BlockId::new(id));
        self
    }
}

/// Heap statistics as computed by the service. Treated as display data only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapStats {
    pub total_size: u64,
    pub free_blocks: u64,
    pub allocated_blocks: u64,
    pub total_objects: u64,
    /// Percentage in the range 0 to 100.
    pub fragmentation: f64,
    pub root_objects: u64,
}

/// The full heap as last reported by the service. The order of `blocks` is
/// the linear layout of the heap.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapSnapshot {
    pub stats: HeapStats,
    pub blocks: Vec<Block>,
    pub roots: Vec<BlockId>,
}

impl HeapSnapshot {
    /// Builds a snapshot from a collect response, which carries no root list.
    pub fn from_blocks(stats: HeapStats, blocks: Vec<Block>) -> Self {
        let roots = blocks
            .iter()
            .filter(|block| block.root)
            .map(|block| block.id.clone())
            .collect();

        Self { stats, blocks, roots }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Geometry of the simulated heap.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapConfig {
    pub total_size: u64,
    pub block_size: u64,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            total_size: crate::config::VIZ_CONFIG_DEFAULT_HEAP_TOTAL_SIZE,
            block_size: crate::config::VIZ_CONFIG_DEFAULT_HEAP_BLOCK_SIZE,
        }
    }
}

/// The collection algorithms the service implements.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    MarkSweep,
    ReferenceCounting,
    Generational,
    Copying,
}

impl Algorithm {
    /// Every algorithm, in the order auto-run cycles through them.
    pub const ALL: [Algorithm; 4] = [
        Algorithm::MarkSweep,
        Algorithm::ReferenceCounting,
        Algorithm::Generational,
        Algorithm::Copying,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::MarkSweep => "mark-sweep",
            Algorithm::ReferenceCounting => "reference-counting",
            Algorithm::Generational => "generational",
            Algorithm::Copying => "copying",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = VizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.as_str() == s)
            .ok_or_else(|| VizError::UnknownAlgorithm(s.to_string()))
    }
}

/// Allocation patterns the service knows how to generate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkloadKind {
    Random,
    Circular,
    LongLived,
    ShortLived,
    Mixed,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 5] = [
        WorkloadKind::Random,
        WorkloadKind::Circular,
        WorkloadKind::LongLived,
        WorkloadKind::ShortLived,
        WorkloadKind::Mixed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Random => "random",
            WorkloadKind::Circular => "circular",
            WorkloadKind::LongLived => "long-lived",
            WorkloadKind::ShortLived => "short-lived",
            WorkloadKind::Mixed => "mixed",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadKind {
    type Err = VizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkloadKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| VizError::UnknownWorkload(s.to_string()))
    }
}

/// One recorded collection and its measured effects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Assigned by the service when it records the cycle. The record returned
    /// directly by a collect call does not carry one yet.
    #[serde(default)]
    pub cycle_id: u64,
    pub algorithm: Algorithm,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub objects_scanned: u64,
    #[serde(default)]
    pub objects_freed: u64,
    #[serde(default)]
    pub bytes_reclaimed: u64,
    /// Milliseconds.
    #[serde(default)]
    pub pause_duration: f64,
    /// `minor` or `major` for generational collections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_type: Option<String>,
    /// Algorithm specific counters such as `objects_promoted` or
    /// `cycles_detected`, kept as the service sent them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
