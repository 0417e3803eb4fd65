//! Severity buckets for Cobb angles and trunk-rotation angles.

use serde::{Deserialize, Serialize};

/// Cobb-angle thresholds, in degrees.
pub const COBB_MILD_DEGREES: f64 = 10.0;
pub const COBB_MODERATE_DEGREES: f64 = 25.0;
pub const COBB_SEVERE_DEGREES: f64 = 40.0;

/// Trunk-rotation thresholds for the scoliometer, in degrees.
pub const ROTATION_MILD_DEGREES: f64 = 5.0;
pub const ROTATION_SIGNIFICANT_DEGREES: f64 = 7.0;

/// Which instrument produced the angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum MeasurementKind {
    Cobb,
    Inclinometer,
}

/// Qualitative bucket derived from a numeric angle.
///
/// Cobb angles use `Normal | Mild | Moderate | Severe`; trunk rotation uses
/// `Normal | Mild | Significant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SeverityClass {
    Normal,
    Mild,
    Moderate,
    Severe,
    Significant,
}

impl SeverityClass {
    /// Interpretation line shown under the angle readout.
    pub fn label(&self, kind: MeasurementKind) -> &'static str {
        match (kind, self) {
            (MeasurementKind::Cobb, SeverityClass::Normal) => "Normal (0-10°)",
            (MeasurementKind::Cobb, SeverityClass::Mild) => "Mild scoliosis (10-25°)",
            (MeasurementKind::Cobb, SeverityClass::Moderate) => "Moderate scoliosis (25-40°)",
            (MeasurementKind::Cobb, _) => "Severe scoliosis (≥40°)",
            (MeasurementKind::Inclinometer, SeverityClass::Normal) => "Normal (0-5°)",
            (MeasurementKind::Inclinometer, SeverityClass::Mild) => {
                "Mild rotation (5-7°) - Monitor"
            }
            (MeasurementKind::Inclinometer, _) => {
                "Significant rotation (≥7°) - Consider referral"
            }
        }
    }
}

/// Bucket an angle against the fixed thresholds for its instrument.
pub fn classify_severity(angle_degrees: f64, kind: MeasurementKind) -> SeverityClass {
    match kind {
        MeasurementKind::Cobb => {
            if angle_degrees < COBB_MILD_DEGREES {
                SeverityClass::Normal
            } else if angle_degrees < COBB_MODERATE_DEGREES {
                SeverityClass::Mild
            } else if angle_degrees < COBB_SEVERE_DEGREES {
                SeverityClass::Moderate
            } else {
                SeverityClass::Severe
            }
        }
        MeasurementKind::Inclinometer => {
            if angle_degrees < ROTATION_MILD_DEGREES {
                SeverityClass::Normal
            } else if angle_degrees < ROTATION_SIGNIFICANT_DEGREES {
                SeverityClass::Mild
            } else {
                SeverityClass::Significant
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cobb_thresholds() {
        let cobb = |a| classify_severity(a, MeasurementKind::Cobb);
        assert_eq!(cobb(0.0), SeverityClass::Normal);
        assert_eq!(cobb(9.99), SeverityClass::Normal);
        assert_eq!(cobb(10.0), SeverityClass::Mild);
        assert_eq!(cobb(24.9), SeverityClass::Mild);
        assert_eq!(cobb(25.0), SeverityClass::Moderate);
        assert_eq!(cobb(39.9), SeverityClass::Moderate);
        assert_eq!(cobb(40.0), SeverityClass::Severe);
        assert_eq!(cobb(90.0), SeverityClass::Severe);
    }

    #[test]
    fn test_inclinometer_thresholds() {
        let atr = |a| classify_severity(a, MeasurementKind::Inclinometer);
        assert_eq!(atr(0.0), SeverityClass::Normal);
        assert_eq!(atr(4.99), SeverityClass::Normal);
        assert_eq!(atr(5.0), SeverityClass::Mild);
        assert_eq!(atr(6.9), SeverityClass::Mild);
        assert_eq!(atr(7.0), SeverityClass::Significant);
        assert_eq!(atr(30.0), SeverityClass::Significant);
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            SeverityClass::Moderate.label(MeasurementKind::Cobb),
            "Moderate scoliosis (25-40°)"
        );
        assert!(SeverityClass::Significant
            .label(MeasurementKind::Inclinometer)
            .contains("referral"));
    }
}
