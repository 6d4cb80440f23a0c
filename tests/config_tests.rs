// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use code_scanner::Config;
use code_scanner::backends::camera::{CameraBackendType, FacingMode};
use code_scanner::frame_processor::ScanMode;
use code_scanner::constants::{DEFAULT_HEIGHT, DEFAULT_MAX_DECODE_RATE, DEFAULT_WIDTH};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.backend, CameraBackendType::V4l2);
    assert_eq!(config.facing, FacingMode::Environment, "Rear camera by default");
    assert_eq!(config.mode, ScanMode::Qr);
    assert_eq!((config.width, config.height), (DEFAULT_WIDTH, DEFAULT_HEIGHT));
    assert_eq!(config.max_decode_rate, DEFAULT_MAX_DECODE_RATE);
    assert!(config.device_path.is_none());
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "mode": "barcode", "facing": "user", "max_decode_rate": 4 }"#)
        .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.mode, ScanMode::Barcode);
    assert_eq!(config.facing, FacingMode::User);
    assert_eq!(config.max_decode_rate, 4);
    assert_eq!(config.width, DEFAULT_WIDTH);
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        backend: CameraBackendType::StillImage,
        device_path: Some("/dev/video2".to_string()),
        qr_max_dimension: 480,
        ..Default::default()
    };
    config.save_to(&path).unwrap();

    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));
}
