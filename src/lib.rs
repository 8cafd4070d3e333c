pub mod attributes;
pub mod config;
pub mod errors;
pub mod file;
pub mod filler;
pub mod geometry;
pub mod image;
pub mod import;
pub mod manifest;
pub mod ordering;
pub mod series;

pub use attributes::DicomAttributes;
pub use config::OrderingConfig;
pub use errors::{DicomError, FillError, ImportError};
pub use filler::{FillContext, ImageFiller};
pub use image::{Image, ImageId};
pub use import::ImportSession;
pub use manifest::{get_manifest, write_manifest, ManifestEntry};
pub use ordering::ImageOrderer;
pub use series::Series;
