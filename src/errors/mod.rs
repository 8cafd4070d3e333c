pub mod dicom;
pub mod fill;
pub mod import;

pub use dicom::DicomError;
pub use fill::FillError;
pub use import::ImportError;
