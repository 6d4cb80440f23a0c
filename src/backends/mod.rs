// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! The backend layer abstracts hardware access, providing a consistent API
//! regardless of the underlying capture method:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          Scanner / CLI front end            │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌──────────────────────────────────────┐   │
//! │  │  CameraSession (lifecycle, fan-out)  │   │
//! │  └──────────────────┬───────────────────┘   │
//! │         ┌───────────┴──────────┐            │
//! │   ┌─────┴─────┐         ┌──────┴──────┐     │
//! │   │   V4L2    │         │ Still image │     │
//! │   └───────────┘         └─────────────┘     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Camera backends, permission tracking and the capture session

pub mod camera;
