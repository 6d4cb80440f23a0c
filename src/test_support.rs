// SPDX-License-Identifier: GPL-3.0-only

//! Test doubles and synthetic frames shared by unit tests

use crate::backends::camera::permission::{PermissionProvider, PermissionState};
use crate::backends::camera::types::{
    BackendError, BackendResult, CameraBackendType, CameraDevice, CameraFrame, CaptureConfig,
    PixelFormat,
};
use crate::backends::camera::{CameraBackend, FrameStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

struct SharedPermission(Arc<Mutex<PermissionState>>);

impl PermissionProvider for SharedPermission {
    fn query(&self) -> PermissionState {
        *self.0.lock().unwrap()
    }
}

/// Backend producing copies of a swappable scene frame
pub struct MockBackend {
    scene: Arc<Mutex<CameraFrame>>,
    frame_interval: Duration,
    fail_after: Option<usize>,
    next_error: Mutex<Option<BackendError>>,
    permission: Arc<Mutex<PermissionState>>,
    live: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
    delivered: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            scene: Arc::new(Mutex::new(blank_frame(320, 240))),
            frame_interval: Duration::from_millis(10),
            fail_after: None,
            next_error: Mutex::new(None),
            permission: Arc::new(Mutex::new(PermissionState::Granted)),
            live: Arc::new(AtomicUsize::new(0)),
            opens: Arc::new(AtomicUsize::new(0)),
            delivered: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_scene(self, frame: CameraFrame) -> Self {
        *self.scene.lock().unwrap() = frame;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Streams end with a disconnect after `frames` frames
    pub fn failing_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Make the next `open` fail with `error`
    pub fn fail_next_open(&self, error: BackendError) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    pub fn scene_handle(&self) -> Arc<Mutex<CameraFrame>> {
        Arc::clone(&self.scene)
    }

    pub fn permission_handle(&self) -> Arc<Mutex<PermissionState>> {
        Arc::clone(&self.permission)
    }

    /// Number of streams currently open
    pub fn live_streams(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live)
    }

    pub fn open_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opens)
    }

    pub fn frames_delivered(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.delivered)
    }

    fn device() -> CameraDevice {
        CameraDevice {
            name: "Mock Camera".to_string(),
            path: "/dev/video-mock".to_string(),
            driver: Some("mock".to_string()),
            camera_location: Some("back".to_string()),
        }
    }
}

impl CameraBackend for MockBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn is_available(&self) -> bool {
        true
    }

    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        vec![Self::device()]
    }

    fn permission_provider(&self, _config: &CaptureConfig) -> Arc<dyn PermissionProvider> {
        Arc::new(SharedPermission(Arc::clone(&self.permission)))
    }

    fn open(&self, _config: &CaptureConfig) -> BackendResult<Box<dyn FrameStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Err(error);
        }

        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            device: Self::device(),
            scene: Arc::clone(&self.scene),
            interval: self.frame_interval,
            remaining: self.fail_after,
            live: Arc::clone(&self.live),
            delivered: Arc::clone(&self.delivered),
        }))
    }
}

struct MockStream {
    device: CameraDevice,
    scene: Arc<Mutex<CameraFrame>>,
    interval: Duration,
    remaining: Option<usize>,
    live: Arc<AtomicUsize>,
    delivered: Arc<AtomicUsize>,
}

impl FrameStream for MockStream {
    fn next_frame(&mut self) -> BackendResult<CameraFrame> {
        std::thread::sleep(self.interval);

        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Err(BackendError::Disconnected("mock camera unplugged".into()));
            }
            *remaining -= 1;
        }

        let mut frame = self.scene.lock().unwrap().clone();
        frame.captured_at = Instant::now();
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(frame)
    }

    fn device(&self) -> &CameraDevice {
        &self.device
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Uniform light gray RGBA frame
pub fn blank_frame(width: u32, height: u32) -> CameraFrame {
    CameraFrame::packed(
        width,
        height,
        PixelFormat::Rgba,
        vec![200; (width * height * 4) as usize],
    )
}

/// 320x240 RGBA frame with a QR code of `payload` in the middle
pub fn qr_frame(payload: &str) -> CameraFrame {
    const WIDTH: u32 = 320;
    const HEIGHT: u32 = 240;
    const SCALE: u32 = 6;

    let code = qrcode::QrCode::new(payload.as_bytes()).unwrap();
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let size = modules * SCALE;
    assert!(size + 8 * SCALE <= HEIGHT, "payload too long for test frame");

    let left = (WIDTH - size) / 2;
    let top = (HEIGHT - size) / 2;
    let mut data = vec![255u8; (WIDTH * HEIGHT * 4) as usize];
    for y in 0..size {
        for x in 0..size {
            let module = ((y / SCALE) * modules + x / SCALE) as usize;
            if colors[module] == qrcode::Color::Dark {
                let offset = (((top + y) * WIDTH + left + x) * 4) as usize;
                data[offset..offset + 3].fill(0);
            }
        }
    }

    CameraFrame::packed(WIDTH, HEIGHT, PixelFormat::Rgba, data)
}

const L_WIDTHS: [[usize; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// G positions in the left half for each EAN-13 leading digit
const EAN13_G_MASK: [[bool; 6]; 10] = {
    const L: bool = false;
    const G: bool = true;
    [
        [L, L, L, L, L, L],
        [L, L, G, L, G, G],
        [L, L, G, G, L, G],
        [L, L, G, G, G, L],
        [L, G, L, L, G, G],
        [L, G, G, L, L, G],
        [L, G, G, G, L, L],
        [L, G, L, G, L, G],
        [L, G, L, G, G, L],
        [L, G, G, L, G, L],
    ]
};

fn push_runs(modules: &mut Vec<bool>, widths: impl Iterator<Item = usize>, bar_first: bool) {
    for (i, width) in widths.enumerate() {
        let bar = (i % 2 == 0) == bar_first;
        modules.extend(std::iter::repeat_n(bar, width));
    }
}

/// Module sequence (true = bar) of an EAN-13 or EAN-8 number, check digit
/// included
pub fn ean_modules(digits: &str) -> Vec<bool> {
    let digits: Vec<usize> = digits
        .bytes()
        .map(|b| (b - b'0') as usize)
        .collect();
    let (left, right, mask) = match digits.len() {
        13 => (&digits[1..7], &digits[7..], EAN13_G_MASK[digits[0]].to_vec()),
        8 => (&digits[..4], &digits[4..], vec![false; 4]),
        n => panic!("EAN needs 8 or 13 digits, got {}", n),
    };

    let mut modules = vec![true, false, true];
    for (digit, g) in left.iter().zip(mask) {
        let widths = L_WIDTHS[*digit];
        if g {
            push_runs(&mut modules, widths.into_iter().rev(), false);
        } else {
            push_runs(&mut modules, widths.into_iter(), false);
        }
    }
    modules.extend([false, true, false, true, false]);
    for digit in right {
        push_runs(&mut modules, L_WIDTHS[*digit].into_iter(), true);
    }
    modules.extend([true, false, true]);
    modules
}

/// Gray8 frame with the barcode for `digits`, 3 px per module and a
/// 10 module quiet zone
pub fn ean_frame(digits: &str) -> CameraFrame {
    const SCALE: usize = 3;
    const QUIET: usize = 10;
    const HEIGHT: usize = 120;

    let modules = ean_modules(digits);
    let width = (modules.len() + 2 * QUIET) * SCALE;

    let mut row = vec![255u8; width];
    for (i, bar) in modules.iter().enumerate() {
        if *bar {
            let start = (QUIET + i) * SCALE;
            row[start..start + SCALE].fill(0);
        }
    }

    let data = row.repeat(HEIGHT);
    CameraFrame::packed(width as u32, HEIGHT as u32, PixelFormat::Gray8, data)
}

#[test]
fn ean_modules_have_standard_widths() {
    assert_eq!(ean_modules("5901234123457").len(), 95);
    assert_eq!(ean_modules("96385074").len(), 67);
}
