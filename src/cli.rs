// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for code scanning
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Scanning codes from a live camera (or an image replayed as one)
//! - Decoding a single image file
//!
//! Decoded codes go to stdout as JSON lines, everything meant for humans
//! goes to stderr.

use code_scanner::backends::camera::still_image::load_image_as_frame;
use code_scanner::backends::camera::{
    CameraBackendType, CameraSession, FacingMode, PermissionState, SessionState,
    get_backend_for_type,
};
use code_scanner::frame_processor::{ScanMode, Scanner};
use code_scanner::submit::{JsonLinesSubmitter, Submitter};
use code_scanner::{AppError, AppResult, Config};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Command-line overrides for a scan
#[derive(Debug, Default)]
pub struct ScanOptions {
    pub mode: Option<ScanMode>,
    pub device: Option<String>,
    pub facing: Option<FacingMode>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub rate: Option<u32>,
    pub once: bool,
    pub image: Option<PathBuf>,
}

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let backend = get_backend_for_type(config.backend, None)?;

    let cameras = backend.enumerate_cameras();
    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!("      Path: {}", camera.path);
        if let Some(driver) = &camera.driver {
            println!("      Driver: {}", driver);
        }
        println!(
            "      Facing: {}",
            camera.camera_location.as_deref().unwrap_or("unknown")
        );
        println!();
    }

    Ok(())
}

/// Scan codes until interrupted (or until the first code with `once`)
pub fn scan(options: ScanOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let mode = options.mode.unwrap_or(config.mode);
    let rate = options.rate.unwrap_or(config.max_decode_rate);
    let mut capture = config.capture_config();
    if let Some(device) = options.device {
        capture.device = Some(device);
    }
    if let Some(facing) = options.facing {
        capture.facing = facing;
    }
    if let Some(width) = options.width {
        capture.ideal_width = width;
    }
    if let Some(height) = options.height {
        capture.ideal_height = height;
    }

    let backend_type = if options.image.is_some() {
        CameraBackendType::StillImage
    } else {
        config.backend
    };
    let backend = get_backend_for_type(backend_type, options.image)?;

    // Create async runtime for the scanner task
    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    let mut session =
        CameraSession::new(backend).with_permission_poll(config.permission_poll_interval());
    if session.check_permission(&capture) == PermissionState::Denied {
        eprintln!("Camera access is denied; check the permissions of the video device.");
    }

    let (code_tx, mut code_rx) = tokio::sync::mpsc::unbounded_channel();
    let pipeline = config.recognition_pipeline(mode);
    let scanner = Scanner::attach(&session, pipeline, rate, move |code| {
        let _ = code_tx.send(code);
    });

    // Subscribe before starting so a failure right after start is seen
    let mut status = session.status_changes();
    if let Err(e) = session.start(&capture) {
        scanner.detach();
        return Err(AppError::from(e).into());
    }

    if let Some(device) = session.status().device {
        eprintln!("Scanning for {} codes with {}", mode, device.name);
    }
    eprintln!("Press Ctrl+C to stop");

    // Set up Ctrl+C handler
    let (stop_tx, mut stop_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    let mut submitter = JsonLinesSubmitter::stdout();
    let result: AppResult<()> = runtime.block_on(async {
        loop {
            tokio::select! {
                Some(code) = code_rx.recv() => {
                    submitter.submit(&code)?;
                    if options.once {
                        break;
                    }
                }
                _ = stop_rx.recv() => {
                    info!("Interrupted, stopping scan");
                    break;
                }
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = status.borrow_and_update().clone();
                    debug!(state = %current.state, generation = current.generation, "Session status changed");
                    if current.state == SessionState::Failed {
                        return Err(current
                            .error
                            .map(AppError::from)
                            .unwrap_or_else(|| AppError::from("camera failed")));
                    }
                }
            }
        }
        Ok::<(), AppError>(())
    });

    scanner.detach();
    session.stop();
    result.map_err(Into::into)
}

/// Decode a single image file. Returns whether a code was found.
pub fn decode_file(path: &Path, mode: ScanMode) -> Result<bool, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let frame = load_image_as_frame(path).map_err(AppError::from)?;
    let mut pipeline = config.recognition_pipeline(mode);

    match pipeline.process_frame(&frame) {
        Some(code) => {
            JsonLinesSubmitter::stdout().submit(&code)?;
            Ok(true)
        }
        None => {
            eprintln!("No {} code found in {}", mode, path.display());
            Ok(false)
        }
    }
}
