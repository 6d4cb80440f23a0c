// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for capture loops
//!
//! Capture and polling loops run on dedicated threads so that a blocking
//! device read never stalls the async runtime. The controller owns the thread
//! and stops and joins it on drop, which is what makes resource release
//! deterministic: whatever state the loop owns is dropped before `stop()`
//! returns.

use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Stop flag that loops can also sleep on
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    pub fn is_set(&self) -> bool {
        *self.stopped.lock().unwrap()
    }

    pub fn set(&self) {
        *self.stopped.lock().unwrap() = true;
        self.cond.notify_all();
    }

    /// Sleep for `timeout` or until the signal is set.
    ///
    /// Returns `true` when the signal is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.stopped.lock().unwrap();
        let (guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap();
        *guard
    }
}

/// Controller for a capture loop running in a separate thread
pub struct CaptureLoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<StopSignal>,
    /// Name for logging
    name: String,
}

impl CaptureLoopController {
    /// Start a loop that calls `loop_fn` until it returns [`LoopAction::Stop`]
    /// or the controller is stopped.
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut(&StopSignal) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(StopSignal::default());
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Capture loop thread started");
            run_loop(&name_clone, &stop_signal_clone, || loop_fn(&stop_signal_clone));
            info!(name = %name_clone, "Capture loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Start a loop whose state is created on the loop thread itself.
    ///
    /// `init_fn` runs first on the new thread; this call blocks until it
    /// finishes and returns its error if it fails, so setup failures surface
    /// synchronously to the caller. The state never crosses threads and is
    /// dropped on the loop thread when the loop ends.
    pub fn start_with_init<S, E, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> Result<Self, E>
    where
        S: 'static,
        E: From<String> + Send + 'static,
        I: FnOnce() -> Result<S, E> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(StopSignal::default());
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), E>>(1);

        info!(name = %name, "Starting capture loop with initialization");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Capture loop thread started, initializing...");

            let mut state = match init_fn() {
                Ok(s) => {
                    debug!(name = %name_clone, "Initialization successful");
                    let _ = ready_tx.send(Ok(()));
                    s
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            run_loop(&name_clone, &stop_signal_clone, || loop_fn(&mut state));
            drop(state);
            info!(name = %name_clone, "Capture loop thread exiting");
        });

        let mut controller = Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(controller),
            Ok(Err(e)) => {
                warn!(name = %name, "Initialization failed");
                controller.join();
                Err(e)
            }
            Err(_) => {
                controller.join();
                Err(E::from(format!("{} thread exited during initialization", name)))
            }
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.set();
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for capture loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

fn run_loop(name: &str, stop_signal: &StopSignal, mut step: impl FnMut() -> LoopAction) {
    loop {
        if stop_signal.is_set() {
            debug!(name = %name, "Stop signal received");
            break;
        }

        if step() == LoopAction::Stop {
            debug!(name = %name, "Loop requested stop");
            break;
        }
    }
}
