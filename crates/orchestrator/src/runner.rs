//! Simulation runner with lifecycle management
//!
//! The runner owns a [`FluidSolver`] and drives it frame by frame in a
//! background thread, exposing start, pause, resume, perturbation and
//! snapshot access to the controlling thread.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use solver::{BoundaryMode, Diagnostics, FluidSolver, Injection, Particle, RunMode};

/// Runner state enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Simulation created but not yet started
    Created,
    /// Simulation actively stepping
    Running,
    /// Simulation paused; the spatial index keeps refreshing but particle
    /// state is frozen
    Paused,
    /// Simulation finished (reached the frame limit or was shut down)
    Finished,
}

/// Shared state between the runner thread and control interface
struct SharedState {
    state: RunnerState,
    solver: FluidSolver,
}

/// Handle for controlling and querying a running simulation
pub struct SimulationRunner {
    shared: Arc<Mutex<SharedState>>,
    thread_handle: Option<thread::JoinHandle<()>>,
    max_frames: Option<u64>,
}

impl SimulationRunner {
    /// Wrap a solver and spawn its background loop. The loop idles until
    /// [`start`](Self::start) is called.
    pub fn new(solver: FluidSolver, max_frames: Option<u64>) -> Self {
        let shared = Arc::new(Mutex::new(SharedState {
            state: RunnerState::Created,
            solver,
        }));

        let shared_clone = Arc::clone(&shared);
        let thread_handle = thread::spawn(move || {
            run_simulation_loop(shared_clone, max_frames);
        });

        Self {
            shared,
            thread_handle: Some(thread_handle),
            max_frames,
        }
    }

    /// Get current runner state
    pub fn state(&self) -> RunnerState {
        self.shared.lock().unwrap().state
    }

    /// Frames advanced so far (paused frames included)
    pub fn frame_count(&self) -> u64 {
        self.shared.lock().unwrap().solver.diagnostics().frame
    }

    /// Configured frame limit, if any
    pub fn max_frames(&self) -> Option<u64> {
        self.max_frames
    }

    /// Health counters from the most recent frame
    pub fn diagnostics(&self) -> Diagnostics {
        self.shared.lock().unwrap().solver.diagnostics()
    }

    /// Copy of the canonical particle buffer at the current frame
    pub fn snapshot(&self) -> Vec<Particle> {
        self.shared.lock().unwrap().solver.particles().to_vec()
    }

    /// Start the simulation (transition from Created to Running)
    pub fn start(&self) {
        let mut guard = self.shared.lock().unwrap();
        if guard.state == RunnerState::Created {
            guard.state = RunnerState::Running;
        }
    }

    /// Pause the simulation; frames keep running in index-only mode
    pub fn pause(&self) {
        let mut guard = self.shared.lock().unwrap();
        if guard.state == RunnerState::Running {
            guard.state = RunnerState::Paused;
        }
    }

    /// Resume a paused simulation
    pub fn resume(&self) {
        let mut guard = self.shared.lock().unwrap();
        if guard.state == RunnerState::Paused {
            guard.state = RunnerState::Running;
        }
    }

    /// Queue a motion injection near `center` for the next frame
    pub fn inject_motion(&self, injection: Injection) {
        self.shared.lock().unwrap().solver.inject_motion(injection);
    }

    /// Swap the active boundary plane set
    pub fn set_boundary_mode(&self, mode: BoundaryMode) {
        self.shared.lock().unwrap().solver.set_boundary_mode(mode);
    }

    /// Wait for the simulation thread to complete
    pub fn join(mut self) -> Result<(), String> {
        if let Some(handle) = self.thread_handle.take() {
            handle.join().map_err(|_| "Thread panicked".to_string())?;
        }
        Ok(())
    }
}

impl Drop for SimulationRunner {
    fn drop(&mut self) {
        // Signal the thread to exit
        if let Ok(mut guard) = self.shared.lock() {
            if guard.state != RunnerState::Finished {
                guard.state = RunnerState::Finished;
            }
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Main simulation loop executed in the background thread
fn run_simulation_loop(shared: Arc<Mutex<SharedState>>, max_frames: Option<u64>) {
    // Wait for the start signal
    loop {
        let state = shared.lock().unwrap().state;
        match state {
            RunnerState::Created => {
                thread::sleep(std::time::Duration::from_millis(10));
            }
            RunnerState::Running | RunnerState::Paused => break,
            RunnerState::Finished => return,
        }
    }

    let start_wall_time = Instant::now();

    loop {
        let (frame, paused) = {
            let mut guard = shared.lock().unwrap();
            match guard.state {
                RunnerState::Running => {
                    guard.solver.set_mode(RunMode::Stepping);
                    guard.solver.advance();
                }
                // Paused frames rebuild the spatial index only, so the
                // diagnostics and any snapshot stay consistent.
                RunnerState::Paused => {
                    guard.solver.set_mode(RunMode::Paused);
                    guard.solver.advance();
                }
                RunnerState::Finished => break,
                RunnerState::Created => break,
            }
            (
                guard.solver.diagnostics().frame,
                guard.state == RunnerState::Paused,
            )
        };

        // The lock is released between frames; give control callers
        // (snapshot, pause, inject) a chance to take it.
        thread::yield_now();
        if paused {
            // No physics while paused; index-only frames can run at a
            // relaxed rate.
            thread::sleep(std::time::Duration::from_millis(5));
        }

        if let Some(max) = max_frames {
            if frame >= max {
                tracing::info!("Simulation finished: reached max_frames = {}", max);
                shared.lock().unwrap().state = RunnerState::Finished;
                break;
            }
        }

        if frame % 100 == 0 {
            let wall_time = start_wall_time.elapsed().as_secs_f64();
            tracing::debug!(frame, wall_time, "simulation progress");
        }
    }

    let frames = shared.lock().unwrap().solver.diagnostics().frame;
    tracing::info!(
        "Simulation thread exiting: {} frames in {:.2}s wall time",
        frames,
        start_wall_time.elapsed().as_secs_f64()
    );
}
