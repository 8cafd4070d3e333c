//! Vector math shared by attribute extraction and ordering.
use nalgebra::Vector3;

pub mod orientation;
pub use orientation::*;

pub mod patient_orientation;
pub use patient_orientation::*;

/// Vectors shorter than this are treated as unset.
pub const ZERO_LENGTH: f64 = 1e-9;

pub type Vector = Vector3<f64>;

/// True for vectors with no usable direction: too short, or with a NaN or infinite component.
pub fn is_zero(vector: &Vector) -> bool {
    !vector.iter().all(|component| component.is_finite()) || vector.norm() < ZERO_LENGTH
}

/// Unit vector in the direction of `vector`, or the zero vector if it has no direction.
pub fn normalized_or_zero(vector: &Vector) -> Vector {
    if is_zero(vector) {
        Vector::zeros()
    } else {
        vector.normalize()
    }
}

/// Unsigned angle between two vectors in radians, `None` if either has no direction.
pub fn angle_in_radians(a: &Vector, b: &Vector) -> Option<f64> {
    if is_zero(a) || is_zero(b) {
        return None;
    }
    let cosine = a.dot(b) / (a.norm() * b.norm());
    Some(cosine.clamp(-1.0, 1.0).acos())
}

pub fn angle_in_degrees(a: &Vector, b: &Vector) -> Option<f64> {
    angle_in_radians(a, b).map(f64::to_degrees)
}

/// Render a vector with a fixed number of decimals, e.g. `0.00000\0.00000\1.00000`.
pub fn fingerprint(vector: &Vector, precision: usize) -> String {
    // Adding zero folds -0.0 into 0.0
    format!(
        "{:.*}\\{:.*}\\{:.*}",
        precision,
        vector.x + 0.0,
        precision,
        vector.y + 0.0,
        precision,
        vector.z + 0.0
    )
}
