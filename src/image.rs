use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::attributes::parse_float_array;
use crate::errors::DicomError;
use crate::geometry::{ImageOrientation, PatientOrientation, Vector};

/// Handle of an image inside its [`Series`](crate::series::Series).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(pub(crate) usize);

impl ImageId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Physical distance between pixel centres in millimetres.
/// DICOM stores the row spacing (between rows) first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSpacing {
    pub row: f64,
    pub column: f64,
}

impl PixelSpacing {
    pub fn new(row: f64, column: f64) -> Self {
        Self { row, column }
    }

    pub fn is_valid(&self) -> bool {
        self.row > 0.0 && self.column > 0.0
    }
}

impl FromStr for PixelSpacing {
    type Err = DicomError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let [row, column] = parse_float_array::<2>(value, "Pixel Spacing")?;
        Ok(Self { row, column })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoiLut {
    Window {
        center: f64,
        width: f64,
        explanation: Option<String>,
    },
    Table {
        /// Number of entries, first stored pixel value mapped, bits per entry
        descriptor: [i64; 3],
        explanation: Option<String>,
        data: Vec<i64>,
    },
}

impl VoiLut {
    pub fn window(center: f64, width: f64) -> Self {
        VoiLut::Window {
            center,
            width,
            explanation: None,
        }
    }
}

/// Region of the image to be masked when displayed.
#[derive(Debug, Clone, PartialEq)]
pub enum ShutterShape {
    Rectangular {
        left: i64,
        right: i64,
        upper: i64,
        lower: i64,
    },
    Circular {
        center_row: i64,
        center_column: i64,
        radius: i64,
    },
    Polygonal {
        /// (row, column) vertices
        vertices: Vec<(i64, i64)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayShutter {
    pub shape: ShutterShape,
    pub presentation_value: Option<i64>,
}

/// One 2D frame with the attributes needed to place it in space and time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Image {
    pub sop_instance_uid: String,
    pub sop_class_uid: String,
    /// Index of the frame inside its source file, starting at 0
    pub frame_number: u32,
    pub instance_number: Option<i64>,
    pub modality: String,
    pub source: Option<PathBuf>,

    pub rows: u16,
    pub columns: u16,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub pixel_representation: u16,
    pub samples_per_pixel: u16,
    pub photometric_interpretation: String,
    pub image_type: String,
    pub number_of_overlays: u16,
    pub transfer_syntax_uid: Option<String>,

    pub image_position: Option<Vector>,
    pub image_orientation: ImageOrientation,
    pub patient_orientation: PatientOrientation,
    pub pixel_spacing: Option<PixelSpacing>,
    pub imager_pixel_spacing: Option<PixelSpacing>,
    pub slice_thickness: Option<f64>,
    pub spacing_between_slices: Option<f64>,
    pub slice_location: Option<f64>,
    pub frame_of_reference_uid: Option<String>,
    pub image_laterality: Option<String>,
    pub view_position: Option<String>,

    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    pub voi_luts: Vec<VoiLut>,
    pub display_shutters: Vec<DisplayShutter>,

    pub acquisition_number: Option<String>,
    pub content_time: Option<String>,

    pub(crate) order_number_in_volume: Option<usize>,
    pub(crate) volume_number_in_series: Option<u32>,
}

impl Image {
    pub fn new(sop_instance_uid: impl Into<String>, frame_number: u32) -> Self {
        Self {
            sop_instance_uid: sop_instance_uid.into(),
            frame_number,
            rescale_slope: 1.0,
            ..Default::default()
        }
    }

    /// Key used to reject duplicates within a series.
    pub fn key(&self) -> (&str, u32) {
        (&self.sop_instance_uid, self.frame_number)
    }

    pub fn with_instance_number(self, instance_number: i64) -> Self {
        Self {
            instance_number: Some(instance_number),
            ..self
        }
    }

    pub fn with_position(self, position: Vector) -> Self {
        Self {
            image_position: Some(position),
            ..self
        }
    }

    pub fn with_orientation(mut self, orientation: ImageOrientation) -> Self {
        self.set_orientation(orientation);
        self
    }

    /// Set the direction cosines and the patient orientation labels derived from them.
    pub fn set_orientation(&mut self, orientation: ImageOrientation) {
        self.patient_orientation = PatientOrientation::from(&orientation);
        self.image_orientation = orientation;
    }

    pub fn with_acquisition_number(self, acquisition_number: impl Into<String>) -> Self {
        Self {
            acquisition_number: Some(acquisition_number.into()),
            ..self
        }
    }

    /// Position of the frame projected onto `normal`.
    /// Frames without a position sit at the origin.
    pub fn distance_along(&self, normal: &Vector) -> f64 {
        self.image_position
            .map(|position| position.dot(normal))
            .unwrap_or(0.0)
    }

    /// Position rendered for grouping frames that share a location.
    pub fn position_key(&self) -> String {
        match self.image_position {
            Some(p) => format!("{:.6}\\{:.6}\\{:.6}", p.x + 0.0, p.y + 0.0, p.z + 0.0),
            None => String::new(),
        }
    }

    /// 0-based position of the frame in its volume, set once the series is ordered.
    pub fn order_number_in_volume(&self) -> Option<usize> {
        self.order_number_in_volume
    }

    pub fn volume_number_in_series(&self) -> Option<u32> {
        self.volume_number_in_series
    }

    pub(crate) fn set_order(&mut self, volume_number: u32, order_number: usize) {
        self.volume_number_in_series = Some(volume_number);
        self.order_number_in_volume = Some(order_number);
    }

    pub(crate) fn clear_order(&mut self) {
        self.volume_number_in_series = None;
        self.order_number_in_volume = None;
    }
}
