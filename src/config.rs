/// Maximum angle between two slice normals for them to count as the same stack
pub const DEFAULT_NORMAL_TOLERANCE_DEGREES: f64 = 1.0;

/// Minimum spread along the normal (mm) for a group to be ordered as a stack
pub const DEFAULT_STACK_SPREAD_THRESHOLD: f64 = 1.0;

/// Decimals kept when rendering a normal as a grouping fingerprint
pub const DEFAULT_FINGERPRINT_PRECISION: usize = 5;

/// Tunables of the stack classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderingConfig {
    pub normal_tolerance_degrees: f64,
    pub stack_spread_threshold: f64,
    pub fingerprint_precision: usize,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            normal_tolerance_degrees: DEFAULT_NORMAL_TOLERANCE_DEGREES,
            stack_spread_threshold: DEFAULT_STACK_SPREAD_THRESHOLD,
            fingerprint_precision: DEFAULT_FINGERPRINT_PRECISION,
        }
    }
}

impl OrderingConfig {
    pub fn with_normal_tolerance(self, degrees: f64) -> Self {
        Self {
            normal_tolerance_degrees: degrees,
            ..self
        }
    }

    pub fn with_stack_spread_threshold(self, millimetres: f64) -> Self {
        Self {
            stack_spread_threshold: millimetres,
            ..self
        }
    }

    pub fn with_fingerprint_precision(self, precision: usize) -> Self {
        Self {
            fingerprint_precision: precision,
            ..self
        }
    }
}
