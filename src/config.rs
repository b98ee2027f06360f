use std::path::PathBuf;
use std::time::Duration;

/// This structure contains the configuration settings for a visualizer session.
#[derive(Clone, Debug)]
pub struct VizConfig {
    /// Base url of the simulation service. Requests are sent to `{api_url}/api/...`.
    pub api_url: String,
    /// The amount of milliseconds a single request may take before it is
    /// reported as a failure.
    pub request_timeout: u64,

    /// Total heap size the session initializes the service with.
    pub heap_total_size: u64,
    /// Size of one grid unit. The heap grid has `heap_total_size / heap_block_size` cells.
    pub heap_block_size: u64,

    /// Milliseconds between two auto-run ticks.
    pub auto_run_period: u64,
    /// Milliseconds between the workload step and the collect step of a
    /// single auto-run tick. Must be shorter than the period.
    pub auto_run_step_delay: u64,
    /// How many objects the auto-run workload step asks for.
    pub auto_run_workload_count: u32,

    /// Probability that a generated workload object is a root.
    pub workload_root_prob: f64,
    /// Probability that two generated workload objects reference each other.
    pub workload_ref_density: f64,

    pub canvas_width: u32,
    pub canvas_height: u32,
    /// TrueType font used for node labels. Without one the graph is drawn
    /// unlabelled.
    pub label_font: Option<PathBuf>,

    pub layout: LayoutConfig,
}

/// Tuning of the force directed reference graph layout.
#[derive(Copy, Clone, Debug)]
pub struct LayoutConfig {
    /// Distance the link force pulls connected nodes towards.
    pub link_distance: f64,
    /// Strength of the pairwise charge force. Negative values repel.
    pub charge_strength: f64,
    /// Minimum separation radius the collision force enforces for each node.
    pub collide_radius: f64,
    /// Once alpha drops below this value the layout is considered converged.
    pub alpha_min: f64,
    /// Fraction of the remaining velocity that is lost every step.
    pub velocity_decay: f64,
    /// Once the kinetic energy of all nodes drops below this value the layout
    /// is considered converged.
    pub energy_threshold: f64,
    /// Hard cap on the number of steps a single layout will take.
    pub max_steps: usize,
    /// Milliseconds between two steps of a running layout loop.
    pub frame_interval: u64,
}

pub const VIZ_CONFIG_DEFAULT_API_URL: &str = "http://127.0.0.1:8001";
pub const VIZ_CONFIG_DEFAULT_REQUEST_TIMEOUT: u64 = 10_000;
pub const VIZ_CONFIG_DEFAULT_HEAP_TOTAL_SIZE: u64 = 1024;
pub const VIZ_CONFIG_DEFAULT_HEAP_BLOCK_SIZE: u64 = 16;
pub const VIZ_CONFIG_DEFAULT_AUTO_RUN_PERIOD: u64 = 5_000;
pub const VIZ_CONFIG_DEFAULT_AUTO_RUN_STEP_DELAY: u64 = 1_000;
pub const VIZ_CONFIG_DEFAULT_AUTO_RUN_WORKLOAD_COUNT: u32 = 8;
pub const VIZ_CONFIG_DEFAULT_LABEL_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

// The layout constants mirror the usual d3-force defaults, apart from the
// link distance, charge and collision radius which are sized for nodes with a
// radius of 15 + 2 * size pixels.
impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            link_distance: 80.0,
            charge_strength: -200.0,
            collide_radius: 25.0,
            alpha_min: 0.001,
            velocity_decay: 0.4,
            energy_threshold: 1e-4,
            max_steps: 300,
            frame_interval: 16,
        }
    }
}

impl LayoutConfig {
    /// Alpha decay that brings alpha from 1 down to `alpha_min` in 300 steps.
    pub fn alpha_decay(&self) -> f64 {
        1.0 - self.alpha_min.powf(1.0 / 300.0)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval)
    }
}

impl Default for VizConfig {
    /// Creates a default VizConfig which talks to a service on localhost.
    fn default() -> Self {
        VizConfig {
            api_url: VIZ_CONFIG_DEFAULT_API_URL.to_string(),
            request_timeout: VIZ_CONFIG_DEFAULT_REQUEST_TIMEOUT,

            heap_total_size: VIZ_CONFIG_DEFAULT_HEAP_TOTAL_SIZE,
            heap_block_size: VIZ_CONFIG_DEFAULT_HEAP_BLOCK_SIZE,

            auto_run_period: VIZ_CONFIG_DEFAULT_AUTO_RUN_PERIOD,
            auto_run_step_delay: VIZ_CONFIG_DEFAULT_AUTO_RUN_STEP_DELAY,
            auto_run_workload_count: VIZ_CONFIG_DEFAULT_AUTO_RUN_WORKLOAD_COUNT,

            workload_root_prob: 0.3,
            workload_ref_density: 0.3,

            canvas_width: 800,
            canvas_height: 400,
            label_font: Some(PathBuf::from(VIZ_CONFIG_DEFAULT_LABEL_FONT)),

            layout: LayoutConfig::default(),
        }
    }
}

impl VizConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    pub fn auto_run_period(&self) -> Duration {
        Duration::from_millis(self.auto_run_period)
    }

    pub fn auto_run_step_delay(&self) -> Duration {
        Duration::from_millis(self.auto_run_step_delay)
    }
}
