//! # Inclinometer Session
//!
//! Scoliometer state fed by device-motion readings. The trunk-rotation angle
//! is the magnitude of the roll (`beta`) reported by the sensor.
//!
//! The sensor stream is supplied by the host and driven through a
//! [`SharedInclinometer`], so the UI can pause, resume or reset while samples
//! keep arriving. When the platform has no motion sensor the session is built
//! [`unavailable`](InclinometerSession::unavailable) and reports no angle at
//! all rather than a stuck 0°.

use std::sync::{Arc, Mutex};

use futures::{Stream, StreamExt};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScreeningError};
use crate::severity::{classify_severity, MeasurementKind, SeverityClass, ROTATION_MILD_DEGREES};

const BUBBLE_MIN_PERCENT: f64 = 10.0;
const BUBBLE_MAX_PERCENT: f64 = 90.0;
const BUBBLE_DEGREES_TO_PERCENT: f64 = 2.0;

/// Device rotation in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Rotation {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// One device-motion reading; platforms may omit the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct MotionSample {
    pub rotation: Option<Rotation>,
}

impl MotionSample {
    pub fn with_beta(beta: f64) -> Self {
        Self {
            rotation: Some(Rotation {
                beta,
                ..Default::default()
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SensorState {
    Live,
    Paused,
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct InclinometerSession {
    current_angle: f64,
    frozen_angle: f64,
    paused: bool,
    available: bool,
}

impl Default for InclinometerSession {
    fn default() -> Self {
        Self::new()
    }
}

impl InclinometerSession {
    pub fn new() -> Self {
        Self {
            current_angle: 0.0,
            frozen_angle: 0.0,
            paused: false,
            available: true,
        }
    }

    /// Session for a platform without a motion sensor.
    pub fn unavailable() -> Self {
        info!("[Inclinometer] Motion sensor unavailable");
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn state(&self) -> SensorState {
        if !self.available {
            SensorState::Unavailable
        } else if self.paused {
            SensorState::Paused
        } else {
            SensorState::Live
        }
    }

    /// Feed one reading. Ignored while paused, unavailable, or rotation-less.
    pub fn on_sample(&mut self, sample: &MotionSample) {
        if !self.available || self.paused {
            return;
        }
        if let Some(rotation) = sample.rotation {
            self.current_angle = rotation.beta.to_degrees().abs();
        }
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.frozen_angle = self.current_angle;
            self.paused = true;
        }
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Zero the reading and clear pause.
    pub fn reset(&mut self) {
        self.current_angle = 0.0;
        self.frozen_angle = 0.0;
        self.paused = false;
    }

    /// Angle to show: frozen while paused, live otherwise, `None` if unavailable.
    pub fn display_angle(&self) -> Option<f64> {
        if !self.available {
            return None;
        }
        Some(if self.paused {
            self.frozen_angle
        } else {
            self.current_angle
        })
    }

    pub fn severity(&self) -> Option<SeverityClass> {
        self.display_angle()
            .map(|angle| classify_severity(angle, MeasurementKind::Inclinometer))
    }

    /// Horizontal bubble position on the level indicator, in percent.
    pub fn bubble_position(&self) -> Option<f64> {
        self.display_angle().map(|angle| {
            (50.0 + angle * BUBBLE_DEGREES_TO_PERCENT).clamp(BUBBLE_MIN_PERCENT, BUBBLE_MAX_PERCENT)
        })
    }

    /// Level indicator shows green below the mild threshold.
    pub fn is_level(&self) -> Option<bool> {
        self.display_angle().map(|angle| angle < ROTATION_MILD_DEGREES)
    }
}

/// Session shared between the sensor task and the UI.
///
/// The lock is held only while one sample or one command is applied.
#[derive(Debug, Clone, Default)]
pub struct SharedInclinometer {
    inner: Arc<Mutex<InclinometerSession>>,
}

impl SharedInclinometer {
    pub fn new(session: InclinometerSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Run `f` against the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut InclinometerSession) -> R) -> R {
        match self.inner.lock() {
            Ok(mut session) => f(&mut session),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Feed every sample of `samples` into the session until the stream ends.
    ///
    /// Fails up front when the session has no sensor.
    pub async fn follow<S>(&self, samples: S) -> Result<()>
    where
        S: Stream<Item = MotionSample>,
    {
        if self.with(|s| s.state() == SensorState::Unavailable) {
            return Err(ScreeningError::SensorUnavailable);
        }

        futures::pin_mut!(samples);
        let mut seen = 0u64;
        while let Some(sample) = samples.next().await {
            self.with(|s| s.on_sample(&sample));
            seen += 1;
        }
        debug!("[Inclinometer] Sample stream ended after {} readings", seen);
        Ok(())
    }
}
