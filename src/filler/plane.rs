//! Image plane attributes: position, orientation, spacing and thickness.
use dicom::dictionary_std::tags;
use tracing::error;

use crate::attributes::DicomAttributes;
use crate::errors::DicomError;
use crate::filler::{optional, required};
use crate::geometry::{ImageOrientation, PatientOrientation, Vector};
use crate::image::{Image, PixelSpacing};

/// 3D Rotational X-Ray Angiography, whose imager spacing comes from its contributing sources
pub const XA_3D_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.13.1.1";

/// Physical Units value for centimetres in an ultrasound region
const ULTRASOUND_UNITS_CM: i64 = 3;
const MM_PER_CM: f64 = 10.0;

const IMAGE_POSITION: &str = "Image Position (Patient)";
const IMAGE_ORIENTATION: &str = "Image Orientation (Patient)";

/// Fill the plane attributes of one frame of a classic data set.
pub fn fill<D: DicomAttributes>(dataset: &D, image: &mut Image) {
    let sop_instance_uid = image.sop_instance_uid.clone();
    let uid = sop_instance_uid.as_str();

    match image.modality.as_str() {
        "US" => {
            image.pixel_spacing = ultrasound_spacing(dataset, uid)
                .or_else(|| optional(pixel_spacing(dataset), uid));
        }
        "CR" | "DX" | "RF" | "XA" | "MG" | "IO" => {
            image.pixel_spacing = optional(pixel_spacing(dataset), uid);
            image.imager_pixel_spacing = if image.sop_class_uid == XA_3D_IMAGE_STORAGE {
                dataset
                    .first_item(tags::CONTRIBUTING_SOURCES_SEQUENCE)
                    .and_then(|item| optional(imager_pixel_spacing(item), uid))
            } else {
                optional(imager_pixel_spacing(dataset), uid)
            };
        }
        _ => {
            image.pixel_spacing = optional(pixel_spacing(dataset), uid);
        }
    }

    image.slice_thickness = optional(
        dataset.required_float(tags::SLICE_THICKNESS, "Slice Thickness"),
        uid,
    );
    image.spacing_between_slices = optional(
        dataset.required_float(tags::SPACING_BETWEEN_SLICES, "Spacing Between Slices"),
        uid,
    );

    if is_nuclear_tomography(dataset, image) {
        fill_from_detector(dataset, image, uid);
        return;
    }

    image.image_position = optional(image_position(dataset), uid);
    match optional(image_orientation(dataset), uid) {
        Some(orientation) => image.set_orientation(orientation),
        None => {
            if let Some(value) = dataset.string_value(tags::PATIENT_ORIENTATION) {
                image.patient_orientation = PatientOrientation::from_dicom(&value);
            }
        }
    }
}

/// Reconstructed NM tomography with detector information places its frames relative to
/// the first detector instead of carrying a position per frame.
fn is_nuclear_tomography<D: DicomAttributes>(dataset: &D, image: &Image) -> bool {
    image.modality == "NM"
        && (image.image_type.contains("RECON TOMO") || image.image_type.contains("RECON GATED TOMO"))
        && dataset.has_attribute(tags::DETECTOR_INFORMATION_SEQUENCE)
}

/// Position of frame `n` is the detector position plus `n` slice spacings along the normal.
fn fill_from_detector<D: DicomAttributes>(dataset: &D, image: &mut Image, uid: &str) {
    let Some(detector) = dataset.first_item(tags::DETECTOR_INFORMATION_SEQUENCE) else {
        error!(sop_instance_uid = uid, "Detector Information Sequence has no items");
        return;
    };
    let Some(orientation) = required(image_orientation(detector), uid) else {
        return;
    };
    image.set_orientation(orientation);

    let Some(origin) = required(image_position(detector), uid) else {
        return;
    };
    let spacing = image
        .spacing_between_slices
        .or(image.slice_thickness)
        .unwrap_or_else(|| {
            error!(
                sop_instance_uid = uid,
                "No slice spacing for NM tomography, frames share one position"
            );
            0.0
        });
    let offset = *orientation.normal() * (image.frame_number as f64 * spacing);
    image.image_position = Some(origin + offset);
}

/// Spacing from the first ultrasound region, if its physical units are centimetres.
fn ultrasound_spacing<D: DicomAttributes>(dataset: &D, uid: &str) -> Option<PixelSpacing> {
    let region = dataset.first_item(tags::SEQUENCE_OF_ULTRASOUND_REGIONS)?;
    let units_x = region.int_value(tags::PHYSICAL_UNITS_X_DIRECTION);
    let units_y = region.int_value(tags::PHYSICAL_UNITS_Y_DIRECTION);
    if units_x != Some(ULTRASOUND_UNITS_CM) || units_y != Some(ULTRASOUND_UNITS_CM) {
        return None;
    }
    let delta_x = required(region.required_float(tags::PHYSICAL_DELTA_X, "Physical Delta X"), uid)?;
    let delta_y = required(region.required_float(tags::PHYSICAL_DELTA_Y, "Physical Delta Y"), uid)?;
    Some(PixelSpacing::new(delta_y * MM_PER_CM, delta_x * MM_PER_CM))
}

pub(crate) fn pixel_spacing<D: DicomAttributes>(dataset: &D) -> Result<PixelSpacing, DicomError> {
    let [row, column] = dataset.float_array::<2>(tags::PIXEL_SPACING, "Pixel Spacing")?;
    Ok(PixelSpacing::new(row, column))
}

pub(crate) fn imager_pixel_spacing<D: DicomAttributes>(
    dataset: &D,
) -> Result<PixelSpacing, DicomError> {
    let [row, column] =
        dataset.float_array::<2>(tags::IMAGER_PIXEL_SPACING, "Imager Pixel Spacing")?;
    Ok(PixelSpacing::new(row, column))
}

pub(crate) fn image_position<D: DicomAttributes>(dataset: &D) -> Result<Vector, DicomError> {
    let [x, y, z] = dataset.float_array::<3>(tags::IMAGE_POSITION_PATIENT, IMAGE_POSITION)?;
    Ok(Vector::new(x, y, z))
}

pub(crate) fn image_orientation<D: DicomAttributes>(
    dataset: &D,
) -> Result<ImageOrientation, DicomError> {
    dataset
        .float_array::<6>(tags::IMAGE_ORIENTATION_PATIENT, IMAGE_ORIENTATION)
        .map(ImageOrientation::from)
}
