// SPDX-License-Identifier: GPL-3.0-only

//! Camera session lifecycle
//!
//! The session owns at most one open [`FrameStream`](super::FrameStream) at a
//! time. The stream lives on the capture thread managed by a
//! [`CaptureLoopController`]; the session owns that controller, so stopping
//! the controller is what releases the device.
//!
//! State machine:
//!
//! ```text
//!            start()              open ok
//!   Idle ──────────────► Requesting ────────► Active
//!    ▲ ▲                     │                  │ │
//!    │ │                     │ open failed      │ │ stream error
//!    │ │                     ▼                  │ ▼
//!    │ └──── permission ── Denied   Failed ◄────┘ Failed
//!    │       restored                  ▲
//!    └──────────── stop() ─────────────┼───── (from Active)
//!                                      │
//!                  start() allowed from Idle, Denied, Failed
//! ```
//!
//! Frame delivery goes through a gate: the capture thread delivers under a
//! read lock and `stop()` closes the gate under the write lock, so once
//! `stop()` returns no callback is running and none will run until the next
//! successful `start()`.

use super::frame_loop::{CaptureLoopController, LoopAction};
use super::permission::{PermissionProvider, PermissionState, PermissionSubscription};
use super::types::{BackendError, CameraDevice, CameraFrame, CaptureConfig};
use super::{CameraBackend, FrameCallback, FrameSource, FrameStream};
use crate::constants::PERMISSION_POLL_INTERVAL;
use crate::errors::SessionError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Lifecycle state of a camera session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Requesting,
    Active,
    Denied,
    Failed,
}

impl SessionState {
    /// States from which `start()` may acquire a device
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Denied | SessionState::Failed
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Requesting => "requesting",
            SessionState::Active => "active",
            SessionState::Denied => "denied",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Snapshot published to status observers
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Incremented on every successful start
    pub generation: u64,
    /// Reason of the last failure while `state == Failed`
    pub error: Option<SessionError>,
    /// Device held while `state == Active`
    pub device: Option<CameraDevice>,
}

impl SessionStatus {
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            generation: 0,
            error: None,
            device: None,
        }
    }
}

/// Identifies one registered frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSubscriptionId(u64);

impl FrameSubscriptionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

type ReleaseFn = Box<dyn FnOnce(FrameSubscriptionId) + Send + Sync>;

/// Owned registration of a frame callback
///
/// The callback stays registered for as long as this value lives; dropping
/// it (or calling [`unsubscribe`](Self::unsubscribe)) removes it.
#[must_use = "dropping the subscription removes the callback"]
pub struct FrameSubscription {
    id: FrameSubscriptionId,
    release: Option<ReleaseFn>,
}

impl FrameSubscription {
    pub fn new<F>(id: FrameSubscriptionId, release: F) -> Self
    where
        F: FnOnce(FrameSubscriptionId) + Send + Sync + 'static,
    {
        Self {
            id,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> FrameSubscriptionId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Remove the callback. A delivery already in progress may still finish.
    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.id);
        }
    }
}

impl Drop for FrameSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for FrameSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSubscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

type SharedCallback = Arc<dyn Fn(&Arc<CameraFrame>) + Send + Sync>;

/// Subscriber list plus the delivery gate, shared with the capture thread
#[derive(Default)]
struct FrameBus {
    gate: RwLock<bool>,
    subscribers: Mutex<Vec<(FrameSubscriptionId, SharedCallback)>>,
    next_id: AtomicU64,
}

impl FrameBus {
    fn subscribe(&self, callback: FrameCallback) -> FrameSubscriptionId {
        let id = FrameSubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap()
            .push((id, Arc::from(callback)));
        id
    }

    fn unsubscribe(&self, id: FrameSubscriptionId) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|(existing, _)| *existing != id);
    }

    fn len(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    fn set_open(&self, open: bool) {
        // Taking the write lock waits for any delivery in progress
        *self.gate.write().unwrap() = open;
    }

    /// Hand a frame to every subscriber. Returns false when the gate is closed.
    fn deliver(&self, frame: &Arc<CameraFrame>) -> bool {
        let gate = self.gate.read().unwrap();
        if !*gate {
            return false;
        }

        // Snapshot so callbacks may (un)subscribe without deadlocking
        let callbacks: Vec<SharedCallback> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(frame);
        }
        true
    }
}

/// State owned by the capture thread
struct CaptureState {
    stream: Option<Box<dyn FrameStream>>,
    bus: Arc<FrameBus>,
    status: Arc<watch::Sender<SessionStatus>>,
    generation: u64,
    sequence: u64,
}

impl CaptureState {
    fn step(&mut self) -> LoopAction {
        let Some(stream) = self.stream.as_mut() else {
            return LoopAction::Stop;
        };

        match stream.next_frame() {
            Ok(mut frame) => {
                frame.sequence = self.sequence;
                self.sequence += 1;
                if self.sequence % 300 == 0 {
                    debug!(sequence = self.sequence, "Capture running");
                }
                self.bus.deliver(&Arc::new(frame));
                LoopAction::Continue
            }
            Err(e) => {
                warn!(error = %e, "Capture stream failed");
                self.bus.set_open(false);
                // Release the device before anyone can observe Failed
                self.stream = None;

                let generation = self.generation;
                let error = SessionError::from(e);
                self.status.send_modify(|status| {
                    if status.generation == generation && status.state == SessionState::Active {
                        status.state = SessionState::Failed;
                        status.error = Some(error);
                        status.device = None;
                    }
                });
                LoopAction::Stop
            }
        }
    }
}

/// Exclusive owner of one camera capture stream
pub struct CameraSession {
    backend: Arc<dyn CameraBackend>,
    bus: Arc<FrameBus>,
    status: Arc<watch::Sender<SessionStatus>>,
    permission: Arc<watch::Sender<PermissionState>>,
    capture: Option<CaptureLoopController>,
    permission_subscription: Option<PermissionSubscription>,
    permission_poll: Duration,
}

impl CameraSession {
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        info!(backend = %backend.backend_type(), "Creating camera session");

        let (status, _) = watch::channel(SessionStatus::default());
        let (permission, _) = watch::channel(PermissionState::Prompt);

        Self {
            backend,
            bus: Arc::new(FrameBus::default()),
            status: Arc::new(status),
            permission: Arc::new(permission),
            capture: None,
            permission_subscription: None,
            permission_poll: PERMISSION_POLL_INTERVAL,
        }
    }

    /// Override how often the platform permission is re-read
    pub fn with_permission_poll(mut self, interval: Duration) -> Self {
        self.permission_poll = interval;
        self
    }

    pub fn backend(&self) -> &Arc<dyn CameraBackend> {
        &self.backend
    }

    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn permission(&self) -> PermissionState {
        *self.permission.borrow()
    }

    /// Observe status changes (state, generation, error, device)
    pub fn status_changes(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Number of registered frame callbacks
    pub fn frame_subscriber_count(&self) -> usize {
        self.bus.len()
    }

    pub fn permission_changes(&self) -> watch::Receiver<PermissionState> {
        self.permission.subscribe()
    }

    pub fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        self.backend.enumerate_cameras()
    }

    /// Read the platform permission and keep tracking it
    ///
    /// The session keeps its own handle to the watcher and drops it on
    /// teardown; calling this again replaces the previous watcher.
    pub fn check_permission(&mut self, config: &CaptureConfig) -> PermissionState {
        if let Some(mut previous) = self.permission_subscription.take() {
            previous.unsubscribe();
        }

        let provider: Arc<dyn PermissionProvider> = self.backend.permission_provider(config);
        let current = provider.query();
        debug!(permission = %current, "Read camera permission");
        apply_permission(&self.permission, &self.status, current);

        let permission = Arc::clone(&self.permission);
        let status = Arc::clone(&self.status);
        self.permission_subscription = Some(PermissionSubscription::watch(
            provider,
            current,
            self.permission_poll,
            move |state| apply_permission(&permission, &status, state),
        ));

        current
    }

    /// Stop tracking permission changes
    pub fn unsubscribe_permission(&mut self) {
        if let Some(mut subscription) = self.permission_subscription.take() {
            subscription.unsubscribe();
        }
    }

    /// Acquire a device and begin delivering frames
    ///
    /// Starting an already active session is a no-op. A failure moves the
    /// session to `Failed`, is returned here once and is never retried.
    pub fn start(&mut self, config: &CaptureConfig) -> Result<(), SessionError> {
        let state = self.state();
        if state == SessionState::Active {
            debug!("Camera session already active, ignoring start");
            return Ok(());
        }
        if !state.can_start() {
            return Ok(());
        }

        // Reap a capture thread that ended on its own (stream failure)
        if let Some(mut finished) = self.capture.take() {
            finished.stop();
        }

        info!(facing = %config.facing, width = config.ideal_width, height = config.ideal_height, "Starting camera session");
        self.status.send_modify(|status| {
            status.state = SessionState::Requesting;
            status.error = None;
        });

        let generation = self.status.borrow().generation + 1;
        let backend = Arc::clone(&self.backend);
        let bus = Arc::clone(&self.bus);
        let status = Arc::clone(&self.status);
        let open_config = config.clone();

        let result = CaptureLoopController::start_with_init(
            "camera-capture",
            move || {
                let stream = backend.open(&open_config)?;
                let device = stream.device().clone();
                info!(device = %device.name, path = %device.path, "Camera stream opened");

                status.send_modify(|s| {
                    s.state = SessionState::Active;
                    s.generation = generation;
                    s.error = None;
                    s.device = Some(device);
                });
                bus.set_open(true);

                Ok::<_, BackendError>(CaptureState {
                    stream: Some(stream),
                    bus,
                    status,
                    generation,
                    sequence: 0,
                })
            },
            CaptureState::step,
        );

        match result {
            Ok(controller) => {
                self.capture = Some(controller);
                Ok(())
            }
            Err(e) => {
                let error = SessionError::from(e);
                warn!(reason = error.kind(), error = %error, "Camera acquisition failed");
                if error.is_permission() {
                    self.permission.send_replace(PermissionState::Denied);
                }
                self.status.send_modify(|status| {
                    status.state = SessionState::Failed;
                    status.error = Some(error.clone());
                    status.device = None;
                });
                Err(error)
            }
        }
    }

    /// Release the device. Idempotent, never fails.
    pub fn stop(&mut self) {
        let was_active = self.state() == SessionState::Active;

        if let Some(mut capture) = self.capture.take() {
            self.bus.set_open(false);
            capture.stop();
        }

        if was_active || self.state() == SessionState::Active {
            self.status.send_modify(|status| {
                status.state = SessionState::Idle;
                status.error = None;
                status.device = None;
            });
            info!("Camera session stopped");
        }
    }

    /// Whether a capture thread (and so possibly a stream) is alive
    pub fn is_capturing(&self) -> bool {
        self.capture
            .as_ref()
            .map(CaptureLoopController::is_running)
            .unwrap_or(false)
    }
}

impl FrameSource for CameraSession {
    fn subscribe_frames(&self, callback: FrameCallback) -> FrameSubscription {
        let id = self.bus.subscribe(callback);
        let bus = Arc::downgrade(&self.bus);
        FrameSubscription::new(id, move |id| {
            if let Some(bus) = bus.upgrade() {
                bus.unsubscribe(id);
            }
        })
    }

    fn status_changes(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop();
        self.unsubscribe_permission();
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("backend_type", &self.backend.backend_type())
            .field("status", &*self.status.borrow())
            .field("permission", &*self.permission.borrow())
            .finish()
    }
}

/// Publish a permission reading and derive the `Denied` session state from it
fn apply_permission(
    permission: &watch::Sender<PermissionState>,
    status: &watch::Sender<SessionStatus>,
    current: PermissionState,
) {
    permission.send_replace(current);
    status.send_if_modified(|s| match (s.state, current) {
        (SessionState::Idle, PermissionState::Denied) => {
            s.state = SessionState::Denied;
            true
        }
        (SessionState::Denied, PermissionState::Granted | PermissionState::Prompt) => {
            s.state = SessionState::Idle;
            true
        }
        _ => false,
    });
}
