mod layout;
mod render;
mod view;

pub use layout::ForceLayout;
pub use render::{render, Palette};
pub use view::{GraphView, LayoutHandle};

use super::model::{Block, BlockId};

use log::debug;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct GraphNode {
    pub id: BlockId,
    pub root: bool,
    pub marked: bool,
    pub size: u32,
    pub age: u32,

    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

impl GraphNode {
    fn new(block: &Block) -> Self {
        Self {
            id: block.id.clone(),
            root: block.root,
            marked: block.marked,
            size: block.size,
            age: block.age,
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
        }
    }

    /// Radius the node is drawn with.
    pub fn radius(&self) -> f64 {
        15.0 + self.size as f64 * 2.0
    }
}

/// A directed reference between two nodes, stored as indices into
/// [`Graph::nodes`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GraphLink {
    pub source: usize,
    pub target: usize,
}

/// The object reference graph of one heap snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl Graph {
    /// Builds one node per block and one link per reference that resolves to
    /// a block in the same list.
    ///
    /// References to blocks that are not in the list are left out. The
    /// snapshot is only an eventually consistent view of the service's heap,
    /// so a collected target is expected and merely logged.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let index: HashMap<&BlockId, usize> = blocks
            .iter()
            .enumerate()
            .map(|(i, block)| (&block.id, i))
            .collect();

        let nodes = blocks.iter().map(GraphNode::new).collect();
        let mut links = vec![];

        for (source, block) in blocks.iter().enumerate() {
            for reference in &block.references {
                match index.get(reference) {
                    Some(&target) => links.push(GraphLink { source, target }),
                    None => debug!("dropping dangling reference {} -> {}", block.id, reference),
                }
            }
        }

        Self { nodes, links }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &BlockId) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    /// Sum of `v^2 / 2` over all nodes.
    pub fn kinetic_energy(&self) -> f64 {
        self.nodes
            .iter()
            .map(|node| (node.vx * node.vx + node.vy * node.vy) / 2.0)
            .sum()
    }
}
