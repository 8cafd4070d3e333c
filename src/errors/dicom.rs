use dicom::core::value::ConvertValueError;
use dicom::object::ReadError;
pub use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
/// Errors that can occur when extracting attributes from a DICOM data set
pub enum DicomError {
    #[snafu(display("error reading DICOM file: {:?}", source))]
    ReadError {
        #[snafu(source(from(ReadError, Box::new)))]
        source: Box<ReadError>,
    },

    #[snafu(display("missing DICOM property: {}", name))]
    MissingPropertyError { name: &'static str },

    #[snafu(display("unable to convert DICOM property value '{}': {:?}", name, source))]
    ConvertValueError {
        name: &'static str,
        #[snafu(source(from(ConvertValueError, Box::new)))]
        source: Box<ConvertValueError>,
    },

    #[snafu(display("invalid DICOM property value '{}': {}", name, value))]
    InvalidValueError { name: &'static str, value: String },

    #[snafu(display(
        "DICOM property {} has {} values (expected {})",
        name,
        actual,
        expected
    ))]
    CardinalityError {
        name: &'static str,
        actual: usize,
        expected: usize,
    },

    #[snafu(display("error parsing float in '{}': {:?}", name, source))]
    ParseFloatError {
        name: &'static str,
        #[snafu(source(from(std::num::ParseFloatError, Box::new)))]
        source: Box<std::num::ParseFloatError>,
    },
}

impl DicomError {
    /// Whether the error was caused by an attribute that is simply absent.
    pub fn is_missing(&self) -> bool {
        matches!(self, DicomError::MissingPropertyError { .. })
    }
}
