use super::config::VizConfig;
use super::model::{Algorithm, WorkloadKind};

use crossbeam_channel::{after, bounded, never, select, tick, Receiver, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// What the auto-run driver needs from a session. Failures are the
/// implementor's to report; the driver only sequences the calls.
pub trait Drive: Send + Sync + 'static {
    fn drive_workload(&self, kind: WorkloadKind, count: u32);
    fn drive_collect(&self, algorithm: Algorithm);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AutoRunState {
    Idle,
    Running,
}

// Validity of one driver run. Captured by the driver thread when it starts and
// checked before every step, so a step that wakes up after cancellation does
// nothing.
#[derive(Clone)]
struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    fn is_live(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Driver {
    token: CancelToken,
    // nothing is ever sent, dropping it wakes the driver up
    cancel: Sender<()>,
    thread: JoinHandle<()>,
}

// The auto-run driver periodically generates a workload and then, after a
// short delay, runs a collection. Collections cycle round robin through every
// algorithm; the position in the cycle survives stopping and restarting.
pub struct AutoRun<T: Drive> {
    target: Arc<T>,
    driver: Mutex<Option<Driver>>,
    next_algorithm: Arc<AtomicUsize>,

    // config vars
    period: Duration,
    step_delay: Duration,
    workload_count: u32,
}

impl<T: Drive> AutoRun<T> {
    pub fn new(target: Arc<T>, config: &VizConfig) -> Self {
        Self {
            target,
            driver: Mutex::new(None),
            next_algorithm: Arc::new(AtomicUsize::new(0)),
            period: config.auto_run_period(),
            step_delay: config.auto_run_step_delay(),
            workload_count: config.auto_run_workload_count,
        }
    }

    pub fn state(&self) -> AutoRunState {
        if self.driver.lock().is_some() {
            AutoRunState::Running
        } else {
            AutoRunState::Idle
        }
    }

    /// The algorithm the next collect step will use.
    pub fn next_algorithm(&self) -> Algorithm {
        Algorithm::ALL[self.next_algorithm.load(Ordering::SeqCst) % Algorithm::ALL.len()]
    }

    pub fn toggle(&self) -> AutoRunState {
        let mut driver = self.driver.lock();

        match driver.take() {
            Some(running) => {
                Self::shutdown(running);
                info!("auto-run stopped");
                AutoRunState::Idle
            }
            None => {
                *driver = Some(self.spawn());
                info!("auto-run started");
                AutoRunState::Running
            }
        }
    }

    pub fn start(&self) {
        let mut driver = self.driver.lock();

        if driver.is_none() {
            *driver = Some(self.spawn());
            info!("auto-run started");
        }
    }

    /// Cancels the timer and any pending delayed step, and blocks until the
    /// driver thread is gone.
    pub fn stop(&self) {
        if let Some(running) = self.driver.lock().take() {
            Self::shutdown(running);
            info!("auto-run stopped");
        }
    }

    fn shutdown(driver: Driver) {
        driver.token.cancel();
        drop(driver.cancel);

        if driver.thread.join().is_err() {
            warn!("auto-run thread panicked");
        }
    }

    fn spawn(&self) -> Driver {
        let token = CancelToken::new();
        let (cancel, cancelled) = bounded::<()>(0);
        let worker = Worker {
            target: self.target.clone(),
            token: token.clone(),
            cancelled,
            next_algorithm: self.next_algorithm.clone(),
            period: self.period,
            step_delay: self.step_delay,
            workload_count: self.workload_count,
        };

        let thread = thread::spawn(move || worker.run());

        Driver {
            token,
            cancel,
            thread,
        }
    }
}

impl<T: Drive> Drop for AutoRun<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker<T: Drive> {
    target: Arc<T>,
    token: CancelToken,
    cancelled: Receiver<()>,
    next_algorithm: Arc<AtomicUsize>,
    period: Duration,
    step_delay: Duration,
    workload_count: u32,
}

enum Step {
    Cancelled,
    Workload,
    Collect,
}

impl<T: Drive> Worker<T> {
    fn run(self) {
        let ticker = tick(self.period);
        // armed after each workload step, disarmed once the collect step ran
        let mut pending: Receiver<Instant> = never();

        loop {
            let step = select! {
                recv(self.cancelled) -> _ => Step::Cancelled,
                recv(ticker) -> _ => Step::Workload,
                recv(pending) -> _ => Step::Collect,
            };

            if !self.token.is_live() {
                break;
            }

            match step {
                Step::Cancelled => break,
                Step::Workload => {
                    debug!("auto-run tick: generating workload");
                    self.target.drive_workload(WorkloadKind::Random, self.workload_count);
                    pending = after(self.step_delay);
                }
                Step::Collect => {
                    pending = never();

                    let index = self.next_algorithm.load(Ordering::SeqCst);
                    let algorithm = Algorithm::ALL[index % Algorithm::ALL.len()];

                    debug!("auto-run tick: collecting with {}", algorithm);
                    self.target.drive_collect(algorithm);
                    self.next_algorithm.store(index + 1, Ordering::SeqCst);
                }
            }
        }
    }
}
