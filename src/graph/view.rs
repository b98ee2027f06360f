use super::{render, ForceLayout, Graph, Palette};
use crate::canvas::{self, Canvas, RasterCanvas};
use crate::config::LayoutConfig;
use crate::error::Result;
use crate::model::Block;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use image::RgbaImage;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// The raster surface the reference graph is drawn on.
type Surface = Arc<Mutex<RasterCanvas>>;

/// A running layout loop.
///
/// The loop steps a [`ForceLayout`] on its own thread once per frame and
/// calls the redraw callback after every step, until the layout converges or
/// the handle is stopped. Stopping is idempotent and also happens on drop, so
/// a loop never outlives its handle.
pub struct LayoutHandle {
    running: Arc<AtomicBool>,
    graph: Arc<Mutex<Graph>>,
    stop_signal: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl LayoutHandle {
    pub fn start<F>(
        blocks: &[Block],
        config: LayoutConfig,
        width: f64,
        height: f64,
        mut redraw: F,
    ) -> Self
    where
        F: FnMut(&Graph) + Send + 'static,
    {
        let mut graph = Graph::from_blocks(blocks);
        let mut layout = ForceLayout::new(&mut graph, config, width, height);
        let graph = Arc::new(Mutex::new(graph));
        let running = Arc::new(AtomicBool::new(true));
        // nothing is ever sent, dropping the sender is the stop signal
        let (stop_signal, stopped) = bounded::<()>(0);
        let frame = config.frame_interval();

        debug!("starting layout of {} blocks", blocks.len());

        let thread = {
            let graph = graph.clone();
            let running = running.clone();

            thread::spawn(move || {
                loop {
                    {
                        let mut graph = graph.lock();
                        if layout.is_converged(&graph) {
                            debug!("layout converged after {} steps", layout.steps());
                            break;
                        }

                        layout.step(&mut graph);
                        redraw(&graph);
                    }

                    match stopped.recv_timeout(frame) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        _ => break,
                    }
                }

                running.store(false, Ordering::SeqCst);
            })
        };

        Self {
            running,
            graph,
            stop_signal: Some(stop_signal),
            thread: Some(thread),
        }
    }

    /// True while the loop is still stepping.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// A copy of the graph with its current positions.
    pub fn graph(&self) -> Graph {
        self.graph.lock().clone()
    }

    /// Blocks until the layout converges on its own.
    pub fn wait(&mut self) {
        self.join();
    }

    /// Stops the loop and waits for its thread. Safe to call any number of
    /// times.
    pub fn stop(&mut self) {
        if self.stop_signal.take().is_some() {
            debug!("stopping layout");
        }

        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("layout thread panicked");
            }
        }
    }
}

impl Drop for LayoutHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Owns the graph surface and the single layout loop allowed to draw on it.
pub struct GraphView {
    surface: Surface,
    size: (f64, f64),
    palette: Palette,
    config: LayoutConfig,
    blocks: Vec<Block>,
    layout: Option<LayoutHandle>,
    drawn: Arc<AtomicBool>,
}

impl GraphView {
    pub fn new(width: u32, height: u32, config: LayoutConfig) -> Self {
        let palette = Palette::default();
        let mut canvas = RasterCanvas::new(width, height);
        canvas.clear(palette.background);

        Self {
            surface: Arc::new(Mutex::new(canvas)),
            size: (width as f64, height as f64),
            palette,
            config,
            blocks: vec![],
            layout: None,
            drawn: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Labels nodes with the font at `path` from the next frame on.
    pub fn load_font(&mut self, path: &Path) -> Result<()> {
        let font = canvas::load_font(path)?;
        self.surface.lock().set_font(font);
        Ok(())
    }

    /// Shows `blocks`, restarting the layout if they differ from the blocks
    /// currently shown. Returns true if a new layout was started.
    ///
    /// The previous loop is stopped and joined before the new one starts.
    pub fn show(&mut self, blocks: &[Block]) -> bool {
        let unchanged = blocks == self.blocks.as_slice();
        if unchanged && (self.layout.is_some() || blocks.is_empty()) {
            return false;
        }

        if let Some(mut old) = self.layout.take() {
            old.stop();
        }
        self.blocks = blocks.to_vec();

        // the last frame shows the old blocks
        self.drawn.store(false, Ordering::SeqCst);

        if blocks.is_empty() {
            self.surface.lock().clear(self.palette.background);
            return false;
        }

        let surface = self.surface.clone();
        let palette = self.palette;
        let drawn = self.drawn.clone();
        let (width, height) = self.size;

        self.layout = Some(LayoutHandle::start(
            blocks,
            self.config,
            width,
            height,
            move |graph| {
                render(graph, &mut *surface.lock(), &palette);
                drawn.store(true, Ordering::SeqCst);
            },
        ));

        true
    }

    /// Blocks until the current layout has converged.
    pub fn wait(&mut self) {
        if let Some(layout) = self.layout.as_mut() {
            layout.wait();
        }
    }

    /// Stops the current layout, leaving the last frame on the surface.
    pub fn stop(&mut self) {
        if let Some(layout) = self.layout.as_mut() {
            layout.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.layout.as_ref().is_some_and(|layout| layout.is_running())
    }

    pub fn graph(&self) -> Option<Graph> {
        self.layout.as_ref().map(|layout| layout.graph())
    }

    /// A copy of the last rendered frame, or None if nothing has been drawn
    /// for the current blocks.
    pub fn frame(&self) -> Option<RgbaImage> {
        if !self.drawn.load(Ordering::SeqCst) {
            return None;
        }

        Some(self.surface.lock().image().clone())
    }
}
