use std::fmt;

use crate::geometry::{ImageOrientation, Vector};

/// Components smaller than this do not contribute a label.
const LABEL_THRESHOLD: f64 = 1e-4;

/// Anatomical direction of the image rows and columns, e.g. `L` and `P` for an axial slice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatientOrientation {
    pub row: String,
    pub column: String,
}

impl PatientOrientation {
    pub fn new(row: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            row: row.into(),
            column: column.into(),
        }
    }

    /// Parse the Patient Orientation attribute, `row\column`.
    /// Values with a single component leave the column label empty.
    pub fn from_dicom(value: &str) -> Self {
        let mut parts = value.split('\\').map(str::trim);
        let row = parts.next().unwrap_or_default();
        let column = parts.next().unwrap_or_default();
        Self::new(row, column)
    }

    /// Derive the labels from direction cosines. Never fails: an unset orientation
    /// yields empty labels.
    pub fn from_image_orientation(orientation: &ImageOrientation) -> Self {
        Self::new(
            direction_label(orientation.row()),
            direction_label(orientation.column()),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.row.is_empty() && self.column.is_empty()
    }
}

impl From<&ImageOrientation> for PatientOrientation {
    fn from(orientation: &ImageOrientation) -> Self {
        Self::from_image_orientation(orientation)
    }
}

impl fmt::Display for PatientOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}", self.row, self.column)
    }
}

/// Labels for the patient axes, ordered by decreasing contribution of each axis.
fn direction_label(vector: &Vector) -> String {
    let mut axes = [
        (vector.x, 'L', 'R'),
        (vector.y, 'P', 'A'),
        (vector.z, 'H', 'F'),
    ];
    axes.sort_by(|a, b| b.0.abs().total_cmp(&a.0.abs()));
    axes.iter()
        .filter(|(component, _, _)| component.abs() > LABEL_THRESHOLD)
        .map(|&(component, positive, negative)| {
            if component > 0.0 {
                positive
            } else {
                negative
            }
        })
        .collect()
}
