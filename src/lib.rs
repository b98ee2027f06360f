//! A client for a garbage collection simulation service that keeps a local,
//! renderable picture of the simulated heap.
//!
//! A [`Session`] owns the canonical state of one heap: the latest snapshot of
//! its blocks, the heap geometry, and the history of every collection run so
//! far. Each command asks the service to do something and then brings the
//! state up to date, so the views derived from it never drift from the
//! service.
//!
//! ```no_run
//! use heapview::{Algorithm, HttpService, Session, VizConfig};
//!
//! let config = VizConfig::default();
//! let session = Session::new(HttpService::new(&config)?, config);
//!
//! session.start()?;
//! session.allocate(1, true)?;
//! session.collect(Algorithm::MarkSweep, false)?;
//!
//! println!("{}", session.state().grid());
//! println!("{}", session.comparison());
//! # Ok::<(), heapview::VizError>(())
//! ```
//!
//! The views are plain functions of that state:
//! - [`grid::project`] lays the blocks out as cells of a square grid.
//! - [`Graph`] turns blocks and their references into nodes and links, which
//!   a [`ForceLayout`] places and [`render`] draws onto a [`Canvas`].
//! - [`metrics::aggregate`] compares the algorithms over the whole history.
//!
//! Auto-run drives the session on its own, alternating random workloads and
//! collections with each algorithm in turn, until it is toggled off or the
//! session is dropped.
//!
//! ```no_run
//! use heapview::{AutoRunState, HttpService, Session, VizConfig};
//!
//! let config = VizConfig::default();
//! let session = Session::new(HttpService::new(&config)?, config);
//!
//! assert_eq!(session.toggle_auto_run(), AutoRunState::Running);
//! std::thread::sleep(std::time::Duration::from_secs(12));
//! assert_eq!(session.toggle_auto_run(), AutoRunState::Idle);
//!
//! for notice in session.drain_notices() {
//!     println!("{}", notice.message);
//! }
//! # Ok::<(), heapview::VizError>(())
//! ```
mod canvas;
pub mod config;
mod error;
pub mod export;
mod graph;
pub mod grid;
pub mod metrics;
mod model;
mod monitor;
mod service;
mod session;

pub use canvas::{hex, Canvas, Color, Point, RasterCanvas};
pub use config::{LayoutConfig, VizConfig};
pub use error::{Result, VizError};
pub use graph::{
    render, ForceLayout, Graph, GraphLink, GraphNode, GraphView, LayoutHandle, Palette,
};
pub use grid::{CellState, GridCell, GridProjection};
pub use metrics::{AlgorithmSummary, Comparison, HistorySummary, TimelinePoint};
pub use model::{
    Algorithm, Block, BlockId, CycleRecord, HeapConfig, HeapSnapshot, HeapStats, WorkloadKind,
};
pub use monitor::{AutoRun, AutoRunState, Drive};
pub use service::{
    AllocationReply, AllocationRequest, CollectReply, CollectRequest, CyclesReply, HeapService,
    HttpService, ReferenceRequest, WorkloadRequest,
};
pub use session::{Dispatcher, Notice, NoticeLevel, Session, SessionState};

#[cfg(test)]
mod test;
