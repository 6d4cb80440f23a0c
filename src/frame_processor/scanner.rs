// SPDX-License-Identifier: GPL-3.0-only

//! Frame source to pipeline bridge
//!
//! The frame callback runs on the capture thread and only does two cheap
//! things: ask the [`FrameSampler`] whether the frame is due and hand it to a
//! single-slot channel. When the decoder is still busy the slot is full and
//! the frame is dropped, so a slow decode never builds a backlog.
//!
//! Each frame is stamped with the session generation it was captured in. A
//! Tokio task drains the slot, runs the decode on the blocking pool and only
//! emits when the source is still active on that generation. A frame left in
//! the slot across a stop/start, or a stop during a decode, therefore never
//! produces a result.

use super::pipeline::{CodeRecognitionPipeline, detect};
use super::sampler::FrameSampler;
use super::types::{DecodedCode, ScanMode};
use crate::backends::camera::types::CameraFrame;
use crate::backends::camera::{FrameSource, FrameSubscription};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// A pipeline attached to a running frame source
pub struct Scanner {
    pipeline: Arc<Mutex<CodeRecognitionPipeline>>,
    subscription: FrameSubscription,
    task: JoinHandle<()>,
}

impl Scanner {
    /// Subscribe `pipeline` to `source`, sampling at most `max_rate` frames
    /// per second, and deliver every new code to `consumer`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn attach<S, C>(
        source: &S,
        pipeline: CodeRecognitionPipeline,
        max_rate: u32,
        mut consumer: C,
    ) -> Self
    where
        S: FrameSource + ?Sized,
        C: FnMut(DecodedCode) + Send + 'static,
    {
        info!(mode = %pipeline.mode(), max_rate, "Attaching code scanner");

        let (frame_tx, mut frame_rx) = mpsc::channel::<(u64, Arc<CameraFrame>)>(1);
        let sampler = Mutex::new(FrameSampler::new(max_rate));
        let capture_status = source.status_changes();
        let subscription = source.subscribe_frames(Box::new(move |frame| {
            if !sampler.lock().unwrap().should_sample(frame.captured_at) {
                return;
            }
            let generation = capture_status.borrow().generation;
            if frame_tx.try_send((generation, Arc::clone(frame))).is_err() {
                trace!(sequence = frame.sequence, "Decoder busy, dropping frame");
            }
        }));

        let pipeline = Arc::new(Mutex::new(pipeline));
        let task_pipeline = Arc::clone(&pipeline);
        let status = source.status_changes();

        let task = tokio::spawn(async move {
            let mut seen_generation = status.borrow().generation;

            while let Some((generation, frame)) = frame_rx.recv().await {
                if status.borrow().generation != generation {
                    trace!(generation, "Skipping frame from a previous session");
                    continue;
                }
                let decoder = {
                    let mut pipeline = task_pipeline.lock().unwrap();
                    if generation != seen_generation {
                        debug!(generation, "Camera restarted, clearing duplicate filter");
                        pipeline.reset();
                        seen_generation = generation;
                    }
                    pipeline.decoder()
                };

                let decoded =
                    match tokio::task::spawn_blocking(move || detect(decoder.as_ref(), &frame))
                        .await
                    {
                        Ok(decoded) => decoded,
                        Err(e) => {
                            warn!(error = %e, "Decode task failed");
                            continue;
                        }
                    };
                let Some(code) = decoded else {
                    continue;
                };

                let still_current = {
                    let current = status.borrow();
                    current.is_active() && current.generation == generation
                };
                if !still_current {
                    debug!(payload = %code.payload, "Discarding decode finished after stop");
                    continue;
                }

                let accepted = task_pipeline.lock().unwrap().accept(code);
                if let Some(code) = accepted {
                    info!(symbology = %code.symbology, payload = %code.payload, "Code decoded");
                    consumer(code);
                }
            }

            debug!("Scanner task finished");
        });

        Self {
            pipeline,
            subscription,
            task,
        }
    }

    pub fn mode(&self) -> ScanMode {
        self.pipeline.lock().unwrap().mode()
    }

    /// Switch the decoding strategy; clears duplicate suppression
    pub fn set_mode(&self, mode: ScanMode) {
        self.pipeline.lock().unwrap().set_mode(mode);
    }

    /// Last emitted payload, if duplicate suppression holds one
    pub fn last_payload(&self) -> Option<String> {
        self.pipeline
            .lock()
            .unwrap()
            .last_payload()
            .map(str::to_owned)
    }

    /// Unsubscribe from the source and stop the decode task
    pub fn detach(self) {
        info!("Code scanner detached");
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
        self.task.abort();
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("pipeline", &*self.pipeline.lock().unwrap())
            .field("subscription", &self.subscription)
            .finish()
    }
}
