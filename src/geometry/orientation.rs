use std::str::FromStr;

use crate::attributes::parse_float_array;
use crate::errors::DicomError;
use crate::geometry::{is_zero, normalized_or_zero, Vector};

/// Direction cosines of the first row and first column of an image, plus the slice normal.
///
/// The default value is the unset sentinel: all three vectors are zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageOrientation {
    row: Vector,
    column: Vector,
    normal: Vector,
}

impl Default for ImageOrientation {
    fn default() -> Self {
        Self {
            row: Vector::zeros(),
            column: Vector::zeros(),
            normal: Vector::zeros(),
        }
    }
}

impl ImageOrientation {
    const NAME: &'static str = "Image Orientation (Patient)";

    pub fn new(row: Vector, column: Vector) -> Self {
        let row = normalized_or_zero(&row);
        let column = normalized_or_zero(&column);
        let normal = normalized_or_zero(&row.cross(&column));
        Self {
            row,
            column,
            normal,
        }
    }

    pub fn row(&self) -> &Vector {
        &self.row
    }

    pub fn column(&self) -> &Vector {
        &self.column
    }

    /// Unit normal of the image plane (row × column), zero when unset.
    pub fn normal(&self) -> &Vector {
        &self.normal
    }

    pub fn is_set(&self) -> bool {
        !is_zero(&self.normal)
    }
}

impl From<[f64; 6]> for ImageOrientation {
    fn from(values: [f64; 6]) -> Self {
        Self::new(
            Vector::new(values[0], values[1], values[2]),
            Vector::new(values[3], values[4], values[5]),
        )
    }
}

impl FromStr for ImageOrientation {
    type Err = DicomError;

    /// Parse the DICOM representation, six backslash separated decimals.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_float_array::<6>(value, Self::NAME).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1\\0\\0\\0\\1\\0", Vector::new(0.0, 0.0, 1.0))]
    #[case("0\\1\\0\\0\\0\\-1", Vector::new(-1.0, 0.0, 0.0))]
    #[case("1\\0\\0\\0\\0\\-1", Vector::new(0.0, 1.0, 0.0))]
    fn test_normal(#[case] value: &str, #[case] expected: Vector) {
        let orientation: ImageOrientation = value.parse().unwrap();
        assert!((orientation.normal() - expected).norm() < 1e-12);
        assert!((orientation.normal().norm() - 1.0).abs() < 1e-12);
        assert!(orientation.is_set());
    }

    #[test]
    fn test_default_is_unset() {
        let orientation = ImageOrientation::default();
        assert!(!orientation.is_set());
        assert_eq!(*orientation.normal(), Vector::zeros());
    }

    #[test]
    fn test_unnormalized_input() {
        let orientation: ImageOrientation = "2\\0\\0\\0\\3\\0".parse().unwrap();
        assert!((orientation.row().norm() - 1.0).abs() < 1e-12);
        assert!((orientation.normal() - Vector::z()).norm() < 1e-12);
    }

    #[test]
    fn test_parallel_vectors_have_no_normal() {
        let orientation: ImageOrientation = "1\\0\\0\\1\\0\\0".parse().unwrap();
        assert!(!orientation.is_set());
    }

    #[rstest]
    #[case("NaN\\0\\0\\0\\1\\0")]
    #[case("1\\0\\0\\0\\inf\\0")]
    fn test_non_finite_values_are_rejected(#[case] value: &str) {
        let result = value.parse::<ImageOrientation>();
        assert!(matches!(result, Err(DicomError::InvalidValueError { .. })));
    }

    #[test]
    fn test_non_finite_vectors_are_unset() {
        let orientation = ImageOrientation::new(Vector::new(f64::NAN, 0.0, 0.0), Vector::y());
        assert!(!orientation.is_set());
        assert_eq!(*orientation.normal(), Vector::zeros());
        assert_eq!(*orientation.row(), Vector::zeros());
    }

    #[test]
    fn test_wrong_cardinality() {
        let result = "1\\0\\0\\0\\1".parse::<ImageOrientation>();
        assert!(matches!(result, Err(DicomError::CardinalityError { .. })));
    }
}
