// SPDX-License-Identifier: GPL-3.0-only

//! Camera permission tracking
//!
//! The platform grant is read through a [`PermissionProvider`]. Change
//! notifications come from a watcher thread that re-queries the provider and
//! reports only transitions. The watcher is owned by the
//! [`PermissionSubscription`] returned to the caller; dropping it (or calling
//! [`PermissionSubscription::unsubscribe`]) ends the watch.

use super::frame_loop::{CaptureLoopController, LoopAction};
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Tri-state platform grant for camera access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// Not decided yet (or nothing to decide about, e.g. no device present)
    #[default]
    Prompt,
    Granted,
    Denied,
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionState::Prompt => write!(f, "prompt"),
            PermissionState::Granted => write!(f, "granted"),
            PermissionState::Denied => write!(f, "denied"),
        }
    }
}

/// Source of the current platform permission
pub trait PermissionProvider: Send + Sync {
    /// Read the current grant. Must be cheap, it is polled.
    fn query(&self) -> PermissionState;
}

/// Provider for sources that need no grant
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

impl PermissionProvider for AlwaysGranted {
    fn query(&self) -> PermissionState {
        PermissionState::Granted
    }
}

/// Permission derived from the access mode of a device node
///
/// On Linux camera access is governed by the permissions of `/dev/videoN`
/// (usually the `video` group or a logind ACL), so read+write access means
/// granted, `EACCES` means denied and a missing node is still undecided.
#[derive(Debug, Clone)]
pub struct DeviceNodePermission {
    path: String,
}

impl DeviceNodePermission {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl PermissionProvider for DeviceNodePermission {
    fn query(&self) -> PermissionState {
        let Ok(c_path) = CString::new(self.path.as_str()) else {
            return PermissionState::Prompt;
        };

        let result = unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) };
        if result == 0 {
            return PermissionState::Granted;
        }

        match std::io::Error::last_os_error().raw_os_error() {
            Some(libc::EACCES) | Some(libc::EPERM) | Some(libc::EROFS) => PermissionState::Denied,
            _ => PermissionState::Prompt,
        }
    }
}

/// Owned permission-change subscription
///
/// Lives as long as the caller keeps it; there is no global listener.
pub struct PermissionSubscription {
    watcher: Option<CaptureLoopController>,
}

impl PermissionSubscription {
    /// Start watching `provider`, starting from the already observed `initial`
    /// state. `on_change` runs on the watcher thread for every transition.
    pub fn watch<F>(
        provider: Arc<dyn PermissionProvider>,
        initial: PermissionState,
        poll_interval: Duration,
        mut on_change: F,
    ) -> Self
    where
        F: FnMut(PermissionState) + Send + 'static,
    {
        let mut last = initial;
        let watcher = CaptureLoopController::start("permission-watch", move |stop| {
            if stop.wait_timeout(poll_interval) {
                return LoopAction::Stop;
            }

            let current = provider.query();
            if current != last {
                info!(from = %last, to = %current, "Camera permission changed");
                last = current;
                on_change(current);
            }
            LoopAction::Continue
        });

        Self {
            watcher: Some(watcher),
        }
    }

    pub fn is_active(&self) -> bool {
        self.watcher
            .as_ref()
            .map(CaptureLoopController::is_running)
            .unwrap_or(false)
    }

    /// Stop receiving notifications. Blocks until the watcher has exited, so
    /// no callback runs after this returns.
    pub fn unsubscribe(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            debug!("Unsubscribing from permission changes");
            watcher.stop();
        }
    }
}

impl Drop for PermissionSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for PermissionSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc;

    struct Switchable(Mutex<PermissionState>);

    impl PermissionProvider for Switchable {
        fn query(&self) -> PermissionState {
            *self.0.lock().unwrap()
        }
    }

    #[test]
    fn watcher_reports_transitions_only() {
        let provider = Arc::new(Switchable(Mutex::new(PermissionState::Prompt)));
        let (tx, rx) = mpsc::channel();

        let mut subscription = PermissionSubscription::watch(
            provider.clone(),
            PermissionState::Prompt,
            Duration::from_millis(5),
            move |state| {
                let _ = tx.send(state);
            },
        );

        *provider.0.lock().unwrap() = PermissionState::Granted;
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)),
            Ok(PermissionState::Granted)
        );

        *provider.0.lock().unwrap() = PermissionState::Denied;
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)),
            Ok(PermissionState::Denied)
        );

        // Unchanged state produces nothing
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        subscription.unsubscribe();
        assert!(!subscription.is_active());
    }

    #[test]
    fn no_callbacks_after_unsubscribe() {
        let provider = Arc::new(Switchable(Mutex::new(PermissionState::Granted)));
        let (tx, rx) = mpsc::channel();

        let subscription = PermissionSubscription::watch(
            provider.clone(),
            PermissionState::Granted,
            Duration::from_millis(5),
            move |state| {
                let _ = tx.send(state);
            },
        );
        drop(subscription);

        *provider.0.lock().unwrap() = PermissionState::Denied;
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn missing_device_node_is_undecided() {
        let provider = DeviceNodePermission::new("/dev/definitely-not-a-camera-node");
        assert_eq!(provider.query(), PermissionState::Prompt);
    }
}
