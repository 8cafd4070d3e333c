//! Extraction of per-frame image attributes from DICOM data sets.
//!
//! Classic objects yield one image per frame with every attribute read from the top
//! level of the data set. Enhanced multi-frame objects carry their frame geometry in
//! the shared and per-frame functional groups instead, see [`enhanced`].
//!
//! Extraction never fails on malformed input. Missing required attributes are logged as
//! errors, unreadable optional ones at debug level, and the affected field keeps its
//! default value.
use std::path::Path;

use dicom::core::Tag;
use dicom::dictionary_std::tags;
use itertools::Itertools;
use snafu::ensure;
use tracing::{debug, error};

use crate::attributes::DicomAttributes;
use crate::errors::fill::{NoImagesAddedSnafu, NotAnImageSnafu};
use crate::errors::{DicomError, FillError};
use crate::image::{Image, ImageId};
use crate::series::Series;

pub mod display;
pub mod enhanced;
pub mod plane;

pub use enhanced::FunctionalGroupProfile;

/// Groups that may hold an overlay plane, 0x6000 to 0x601E in steps of two.
const OVERLAY_GROUPS: std::ops::RangeInclusive<u16> = 0x6000..=0x601E;
const OVERLAY_ROWS_ELEMENT: u16 = 0x0010;

/// Where the data set being filled belongs and where it came from.
#[derive(Debug)]
pub struct FillContext<'a> {
    pub series: &'a mut Series,
    pub source: Option<&'a Path>,
    /// Transfer syntax from the file meta group, if the data set was read from a file
    pub transfer_syntax_uid: Option<&'a str>,
}

impl<'a> FillContext<'a> {
    pub fn new(series: &'a mut Series) -> Self {
        Self {
            series,
            source: None,
            transfer_syntax_uid: None,
        }
    }

    pub fn with_source(self, source: &'a Path) -> Self {
        Self {
            source: Some(source),
            ..self
        }
    }

    pub fn with_transfer_syntax(self, transfer_syntax_uid: &'a str) -> Self {
        Self {
            transfer_syntax_uid: Some(transfer_syntax_uid),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFiller;

impl ImageFiller {
    pub fn new() -> Self {
        Self
    }

    /// Create the images of one data set and add them to the series of `context`.
    ///
    /// Returns the handles of the images the series accepted, in frame order.
    pub fn fill<D: DicomAttributes>(
        &self,
        dataset: &D,
        context: &mut FillContext<'_>,
    ) -> Result<Vec<ImageId>, FillError> {
        let sop_instance_uid = dataset
            .string_value(tags::SOP_INSTANCE_UID)
            .unwrap_or_default();
        ensure!(
            is_image(dataset),
            NotAnImageSnafu {
                sop_instance_uid: sop_instance_uid.clone()
            }
        );

        let template = common_attributes(dataset, context);
        let images = match FunctionalGroupProfile::for_sop_class(&template.sop_class_uid) {
            Some(profile) => enhanced::images(dataset, &template, profile),
            None => classic_images(dataset, &template),
        };
        let count = images.len();

        let ids = images
            .into_iter()
            .filter_map(|image| context.series.add_image(image))
            .collect_vec();
        ensure!(
            !ids.is_empty(),
            NoImagesAddedSnafu {
                sop_instance_uid,
                series_instance_uid: context.series.instance_uid(),
                count,
            }
        );
        debug!(
            %sop_instance_uid,
            frames = ids.len(),
            "Added images to series {}",
            context.series.instance_uid()
        );
        Ok(ids)
    }
}

/// A data set is an image if it describes a pixel matrix or carries pixel data.
pub fn is_image<D: DicomAttributes>(dataset: &D) -> bool {
    dataset.has_attribute(tags::ROWS) || dataset.has_attribute(tags::PIXEL_DATA)
}

/// Number of frames in the data set, at least one.
pub fn number_of_frames<D: DicomAttributes>(dataset: &D) -> u32 {
    dataset
        .int_value(tags::NUMBER_OF_FRAMES)
        .and_then(|frames| u32::try_from(frames).ok())
        .filter(|&frames| frames > 0)
        .unwrap_or(1)
}

/// One image per frame, each with its own plane and display attributes.
fn classic_images<D: DicomAttributes>(dataset: &D, template: &Image) -> Vec<Image> {
    (0..number_of_frames(dataset))
        .map(|frame_number| {
            let mut image = Image {
                frame_number,
                ..template.clone()
            };
            plane::fill(dataset, &mut image);
            display::fill(dataset, &mut image);
            image
        })
        .collect()
}

/// Attributes shared by every frame of the data set.
fn common_attributes<D: DicomAttributes>(dataset: &D, context: &FillContext<'_>) -> Image {
    let sop_instance_uid = required(
        dataset.required_string(tags::SOP_INSTANCE_UID, "SOP Instance UID"),
        "",
    )
    .unwrap_or_default();
    let uid = sop_instance_uid.as_str();

    let mut image = Image::new(sop_instance_uid.clone(), 0);
    image.sop_class_uid = dataset.string_value(tags::SOP_CLASS_UID).unwrap_or_default();
    image.modality = dataset.string_value(tags::MODALITY).unwrap_or_default();
    image.source = context.source.map(Path::to_path_buf);
    image.instance_number = optional(
        dataset.required_int(tags::INSTANCE_NUMBER, "Instance Number"),
        uid,
    );

    image.rows = required(u16_value(dataset, tags::ROWS, "Rows"), uid).unwrap_or_default();
    image.columns =
        required(u16_value(dataset, tags::COLUMNS, "Columns"), uid).unwrap_or_default();
    image.bits_allocated =
        optional(u16_value(dataset, tags::BITS_ALLOCATED, "Bits Allocated"), uid)
            .unwrap_or_default();
    image.bits_stored =
        optional(u16_value(dataset, tags::BITS_STORED, "Bits Stored"), uid).unwrap_or_default();
    image.pixel_representation = optional(
        u16_value(dataset, tags::PIXEL_REPRESENTATION, "Pixel Representation"),
        uid,
    )
    .unwrap_or_default();
    image.samples_per_pixel = optional(
        u16_value(dataset, tags::SAMPLES_PER_PIXEL, "Samples per Pixel"),
        uid,
    )
    .unwrap_or(1);
    image.photometric_interpretation = dataset
        .string_value(tags::PHOTOMETRIC_INTERPRETATION)
        .unwrap_or_default();
    image.image_type = dataset.string_value(tags::IMAGE_TYPE).unwrap_or_default();
    image.number_of_overlays = number_of_overlays(dataset);
    image.transfer_syntax_uid = context
        .transfer_syntax_uid
        .map(|syntax| syntax.trim_end_matches('\0').to_string())
        .or_else(|| dataset.string_value(tags::TRANSFER_SYNTAX_UID));

    image.frame_of_reference_uid = dataset.string_value(tags::FRAME_OF_REFERENCE_UID);
    image.slice_location = optional(
        dataset.required_float(tags::SLICE_LOCATION, "Slice Location"),
        uid,
    );
    image.image_laterality = dataset
        .string_value(tags::IMAGE_LATERALITY)
        .or_else(|| dataset.string_value(tags::LATERALITY));
    image.view_position = dataset.string_value(tags::VIEW_POSITION);
    image.acquisition_number = dataset.string_value(tags::ACQUISITION_NUMBER);
    image.content_time = dataset.string_value(tags::CONTENT_TIME);
    image
}

fn number_of_overlays<D: DicomAttributes>(dataset: &D) -> u16 {
    let count = OVERLAY_GROUPS
        .step_by(2)
        .filter(|&group| dataset.has_attribute(Tag(group, OVERLAY_ROWS_ELEMENT)))
        .count();
    count as u16
}

pub(crate) fn u16_value<D: DicomAttributes>(
    dataset: &D,
    tag: Tag,
    name: &'static str,
) -> Result<u16, DicomError> {
    let value = dataset.required_int(tag, name)?;
    u16::try_from(value).map_err(|_| DicomError::InvalidValueError {
        name,
        value: value.to_string(),
    })
}

/// Log a failure to read a required attribute and carry on without it.
pub(crate) fn required<T>(result: Result<T, DicomError>, sop_instance_uid: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            error!(sop_instance_uid, "{}", e);
            None
        }
    }
}

/// Absent optional attributes are skipped silently; malformed ones are logged at debug level.
pub(crate) fn optional<T>(result: Result<T, DicomError>, sop_instance_uid: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_missing() => None,
        Err(e) => {
            debug!(sop_instance_uid, "{}", e);
            None
        }
    }
}
