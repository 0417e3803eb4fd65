//! # Scoliscreen
//!
//! Core logic for a scoliosis screening app.
//!
//! This library provides:
//! - Cobb-angle geometry between two endplate lines
//! - State for the Cobb measurement tool and the scoliometer
//! - A persisted, best-effort background upload queue for saved images
//!
//! ## Features
//!
//! - **`http`** - Multipart HTTP upload transport (default)
//! - **`persistence`** - SQLite key/value store for the queue (default)
//! - **`ffi`** - UniFFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use scoliscreen::{angle_between, classify_severity, LineSegment, MeasurementKind, Point};
//!
//! let superior = LineSegment::new(Point::new(60.0, 120.0), Point::new(220.0, 100.0));
//! let inferior = LineSegment::new(Point::new(60.0, 280.0), Point::new(220.0, 300.0));
//!
//! let angle = angle_between(&superior, &inferior);
//! let severity = classify_severity(angle, MeasurementKind::Cobb);
//! println!("Cobb angle {:.1}° ({})", angle, severity.label(MeasurementKind::Cobb));
//! ```

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, ScreeningError};

// Upload and capture tunables
pub mod config;
pub use config::UploadConfig;

// Two-line angle math
pub mod geometry;
pub use geometry::{angle_between, LineSegment, Point};

// Severity thresholds
pub mod severity;
pub use severity::{classify_severity, MeasurementKind, SeverityClass};

// Fixed-default endplate overlay
pub mod endplates;
pub use endplates::{analyze_spine_image, to_line_positions, LinePositions, SpineAnalysis};

// Cobb measurement tool state
pub mod cobb;
pub use cobb::{
    CaptureHost, CobbMeasurement, DisplayAdjustments, Endpoint, Handle, LineId,
    MeasurementSession, SaveOutcome, ViewDimensions,
};

// Scoliometer state
pub mod inclinometer;
pub use inclinometer::{InclinometerSession, MotionSample, Rotation, SensorState, SharedInclinometer};

// Persisted upload queue
pub mod upload;
pub use upload::{
    AppState, Connectivity, ForegroundTrigger, FsImageLoader, ImageLoader, KeyValueStore,
    MemoryStore, NetworkState, ProcessOutcome, UploadItem, UploadMetadata, UploadQueue,
    UploadRequest, UploadStatus, UploadTransport,
};
#[cfg(feature = "persistence")]
pub use upload::SqliteStore;

// HTTP transport for the upload endpoint
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::HttpTransport;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android
#[cfg(target_os = "android")]
pub fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("scoliscreen"),
    );
}

#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    // No-op on non-Android platforms; hosts install their own `log` backend
}
