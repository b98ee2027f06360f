use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::{debug, error, warn};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use heapview::config::{
    VIZ_CONFIG_DEFAULT_API_URL, VIZ_CONFIG_DEFAULT_AUTO_RUN_PERIOD,
    VIZ_CONFIG_DEFAULT_AUTO_RUN_STEP_DELAY, VIZ_CONFIG_DEFAULT_AUTO_RUN_WORKLOAD_COUNT,
    VIZ_CONFIG_DEFAULT_HEAP_BLOCK_SIZE, VIZ_CONFIG_DEFAULT_HEAP_TOTAL_SIZE,
    VIZ_CONFIG_DEFAULT_LABEL_FONT, VIZ_CONFIG_DEFAULT_REQUEST_TIMEOUT,
};
use heapview::{
    export, Algorithm, BlockId, CycleRecord, GraphView, HttpService, LayoutConfig, NoticeLevel,
    Session, VizConfig, WorkloadKind,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Interactive client for the GC simulation service",
    long_about = None
)]
struct Cli {
    /// Base url of the simulation service
    #[arg(long, env = "HEAPVIEW_API_URL", default_value = VIZ_CONFIG_DEFAULT_API_URL)]
    api_url: String,

    /// Milliseconds a request may take before it fails
    #[arg(
        long,
        env = "HEAPVIEW_REQUEST_TIMEOUT",
        default_value_t = VIZ_CONFIG_DEFAULT_REQUEST_TIMEOUT,
    )]
    request_timeout: u64,

    /// Total heap size to initialize the service with
    #[arg(long, env = "HEAPVIEW_HEAP_SIZE", default_value_t = VIZ_CONFIG_DEFAULT_HEAP_TOTAL_SIZE)]
    heap_size: u64,

    /// Size of one heap grid cell
    #[arg(long, env = "HEAPVIEW_BLOCK_SIZE", default_value_t = VIZ_CONFIG_DEFAULT_HEAP_BLOCK_SIZE)]
    block_size: u64,

    /// Milliseconds between two auto-run ticks
    #[arg(
        long,
        env = "HEAPVIEW_AUTO_RUN_PERIOD",
        default_value_t = VIZ_CONFIG_DEFAULT_AUTO_RUN_PERIOD,
    )]
    auto_run_period: u64,

    /// Milliseconds between the workload and the collect of one auto-run tick
    #[arg(
        long,
        env = "HEAPVIEW_AUTO_RUN_DELAY",
        default_value_t = VIZ_CONFIG_DEFAULT_AUTO_RUN_STEP_DELAY,
    )]
    auto_run_delay: u64,

    /// Objects generated by each auto-run workload
    #[arg(
        long,
        env = "HEAPVIEW_AUTO_RUN_COUNT",
        default_value_t = VIZ_CONFIG_DEFAULT_AUTO_RUN_WORKLOAD_COUNT,
    )]
    auto_run_count: u32,

    /// Width of the graph surface in pixels
    #[arg(long, env = "HEAPVIEW_CANVAS_WIDTH", default_value_t = 800)]
    canvas_width: u32,

    /// Height of the graph surface in pixels
    #[arg(long, env = "HEAPVIEW_CANVAS_HEIGHT", default_value_t = 400)]
    canvas_height: u32,

    /// TrueType font for graph node labels
    #[arg(long, env = "HEAPVIEW_LABEL_FONT", default_value = VIZ_CONFIG_DEFAULT_LABEL_FONT)]
    label_font: PathBuf,

    /// Directory exports are written to
    #[arg(long, env = "HEAPVIEW_EXPORT_DIR", default_value = ".")]
    export_dir: PathBuf,
}

impl Cli {
    fn config(&self) -> VizConfig {
        VizConfig {
            api_url: self.api_url.clone(),
            request_timeout: self.request_timeout,
            heap_total_size: self.heap_size,
            heap_block_size: self.block_size,
            auto_run_period: self.auto_run_period,
            auto_run_step_delay: self.auto_run_delay,
            auto_run_workload_count: self.auto_run_count,
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
            label_font: Some(self.label_font.clone()),
            ..VizConfig::default()
        }
    }
}

// One line of REPL input.
#[derive(Parser, Debug)]
#[command(multicall = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a fresh heap
    Init {
        total_size: Option<u64>,
        block_size: Option<u64>,
    },
    /// Allocate one block
    Alloc {
        #[arg(default_value_t = 1)]
        size: u32,
        /// Add the block to the root set
        #[arg(long)]
        root: bool,
    },
    /// Deallocate a block by id
    Free { id: String },
    /// Add a reference between two blocks
    Link { from: String, to: String },
    /// Remove a reference between two blocks
    Unlink { from: String, to: String },
    /// Run one collection
    Collect {
        #[arg(default_value = "mark-sweep")]
        algorithm: Algorithm,
        /// Only collect the young generation, `--minor false` for a full collection
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        minor: bool,
    },
    /// Generate a batch of objects
    Workload {
        #[arg(default_value = "random")]
        kind: WorkloadKind,
        #[arg(default_value_t = 10)]
        count: u32,
    },
    /// Reset the heap and clear the cycle history
    Reset,
    /// Toggle auto-run
    Auto,
    /// Fetch heap state and history again
    Refresh,
    /// Print heap statistics and the last cycle
    State,
    /// Print the heap grid
    Grid,
    /// Wait for the graph layout and print node positions
    Graph,
    /// Print the algorithm comparison
    Compare,
    /// Export the history or the graph
    Export { format: ExportFormat },
    /// Leave
    #[command(alias = "exit")]
    Quit,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
    Png,
}

fn describe_cycle(cycle: &CycleRecord) -> String {
    let kind = match &cycle.collection_type {
        Some(kind) => format!(" ({})", kind),
        None => String::new(),
    };

    format!(
        "#{}: {}{} scanned {} freed {} ({} bytes) in {:.3} ms",
        cycle.cycle_id,
        cycle.algorithm,
        kind,
        cycle.objects_scanned,
        cycle.objects_freed,
        cycle.bytes_reclaimed,
        cycle.pause_duration
    )
}

struct Repl {
    session: Session<HttpService>,
    view: GraphView,
    export_dir: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.config();

    let service = match HttpService::new(&config) {
        Ok(service) => service,
        Err(err) => {
            error!("could not set up the service client: {}", err);
            process::exit(1);
        }
    };

    let layout: LayoutConfig = config.layout;
    let mut view = GraphView::new(config.canvas_width, config.canvas_height, layout);
    if let Some(path) = &config.label_font {
        if let Err(err) = view.load_font(path) {
            warn!("graph labels disabled, {}: {}", path.display(), err);
        }
    }
    let session = Session::new(service, config);

    // a failed start is reported as a notice like any other command
    let _ = session.start();

    let mut repl = Repl {
        session,
        view,
        export_dir: cli.export_dir,
    };

    repl.sync();
    repl.run();
}

impl Repl {
    fn run(&mut self) {
        println!("heapview, connected to {}", self.session.config().api_url);
        println!("Type 'help' for commands, 'quit' to leave.");

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut input_buffer = String::new();

        loop {
            print!("> ");
            if let Err(err) = stdout.flush() {
                eprintln!("Error flushing stdout: {}", err);
                break;
            }

            input_buffer.clear();
            match stdin.read_line(&mut input_buffer) {
                Ok(0) => break,
                Ok(_) => {
                    let words: Vec<&str> = input_buffer.split_whitespace().collect();
                    if words.is_empty() {
                        continue;
                    }

                    match Line::try_parse_from(words) {
                        Ok(Line {
                            command: Command::Quit,
                        }) => break,
                        Ok(line) => self.execute(line.command),
                        Err(err) => {
                            let _ = err.print();
                        }
                    }
                }
                Err(err) => {
                    eprintln!("Error reading input: {}", err);
                    break;
                }
            }
        }

        // the session stops auto-run when it is dropped
        self.view.stop();
    }

    fn execute(&mut self, command: Command) {
        debug!("executing {:?}", command);

        // failures are reported through notices
        match command {
            Command::Init {
                total_size,
                block_size,
            } => {
                let config = self.session.config();
                let total_size = total_size.unwrap_or(config.heap_total_size);
                let block_size = block_size.unwrap_or(config.heap_block_size);
                let _ = self.session.initialize(total_size, block_size);
            }
            Command::Alloc { size, root } => {
                if let Ok(id) = self.session.allocate(size, root) {
                    println!("{}", id);
                }
            }
            Command::Free { id } => {
                let _ = self.session.deallocate(&BlockId::new(id));
            }
            Command::Link { from, to } => {
                let _ = self.session.add_reference(&BlockId::new(from), &BlockId::new(to));
            }
            Command::Unlink { from, to } => {
                let _ = self
                    .session
                    .remove_reference(&BlockId::new(from), &BlockId::new(to));
            }
            Command::Collect { algorithm, minor } => {
                let _ = self.session.collect(algorithm, minor);
            }
            Command::Workload { kind, count } => {
                let _ = self.session.generate_workload(kind, count);
            }
            Command::Reset => {
                let _ = self.session.reset();
            }
            Command::Auto => {
                self.session.toggle_auto_run();
                println!("next algorithm: {}", self.session.next_auto_run_algorithm());
            }
            Command::Refresh => {
                let _ = self.session.refresh();
            }
            Command::State => self.print_state(),
            Command::Grid => println!("{}", self.session.state().grid()),
            Command::Graph => self.print_graph(),
            Command::Compare => println!("{}", self.session.comparison()),
            Command::Export { format } => self.export(format),
            Command::Quit => {}
        }

        self.sync();
    }

    // Prints pending notices and points the graph view at the latest blocks.
    fn sync(&mut self) {
        for notice in self.session.drain_notices() {
            match notice.level {
                NoticeLevel::Failure => eprintln!("[error] {}", notice.message),
                NoticeLevel::Success => println!("[ok] {}", notice.message),
                NoticeLevel::Info => println!("[info] {}", notice.message),
            }
        }

        self.view.show(&self.session.state().snapshot.blocks);
    }

    fn print_state(&self) {
        let state = self.session.state();
        let stats = &state.snapshot.stats;

        println!(
            "heap {} bytes, {} objects ({} roots), {} free / {} allocated blocks, \
             {:.1}% fragmented",
            stats.total_size,
            stats.total_objects,
            stats.root_objects,
            stats.free_blocks,
            stats.allocated_blocks,
            stats.fragmentation
        );

        if let Some(cycle) = &state.last_cycle {
            println!("last cycle {}", describe_cycle(cycle));
        }

        println!(
            "{} cycles recorded, auto-run {:?}",
            state.history.len(),
            self.session.auto_run_state()
        );
    }

    fn print_graph(&mut self) {
        self.view.wait();

        let Some(graph) = self.view.graph() else {
            println!("(no objects)");
            return;
        };

        for node in &graph.nodes {
            let targets: Vec<&str> = graph
                .links
                .iter()
                .filter(|link| graph.nodes[link.source].id == node.id)
                .map(|link| graph.nodes[link.target].id.label())
                .collect();

            println!(
                "{:<4} ({:>6.1}, {:>6.1}){}{} -> [{}]",
                node.id.label(),
                node.x,
                node.y,
                if node.root { " root" } else { "" },
                if node.marked { " marked" } else { "" },
                targets.join(", ")
            );
        }
    }

    fn export(&mut self, format: ExportFormat) {
        let state = self.session.state();
        let dir = self.export_dir.as_path();

        let written = match format {
            ExportFormat::Csv => export::write_csv(dir, &state.history),
            ExportFormat::Json => export::write_json(dir, &state.history, &state.snapshot.stats),
            ExportFormat::Png => {
                self.view.wait();
                export::write_png(dir, self.view.frame().as_ref())
            }
        };

        match written {
            Ok(path) => println!("wrote {}", path.display()),
            Err(err) => eprintln!("export failed: {}", err),
        }
    }
}
