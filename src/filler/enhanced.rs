//! Enhanced multi-frame objects.
//!
//! All frames are created up front from the common attributes. The Shared Functional
//! Groups Sequence is applied to every frame, then item `n` of the Per-Frame Functional
//! Groups Sequence to frame `n`, so per-frame values win.
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use tracing::error;

use crate::attributes::DicomAttributes;
use crate::filler::plane::{image_orientation, image_position, imager_pixel_spacing, pixel_spacing};
use crate::filler::{display, number_of_frames, optional, required};
use crate::image::Image;

/// X-Ray Frame Pixel Data Properties Sequence, holding the per-frame imager pixel spacing
const X_RAY_FRAME_PIXEL_DATA_PROPERTIES_SEQUENCE: Tag = Tag(0x0028, 0x9443);

/// Which functional group macros are read for a SOP class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionalGroupProfile {
    /// Cross-sectional frames: CT, MR, PET, US volume and breast tomosynthesis
    Volumetric,
    /// Projection frames: X-ray angiography and radiofluoroscopy
    XRay,
}

const ENHANCED_SOP_CLASSES: [(&str, FunctionalGroupProfile); 11] = [
    // Enhanced CT, Legacy Converted Enhanced CT
    ("1.2.840.10008.5.1.4.1.1.2.1", FunctionalGroupProfile::Volumetric),
    ("1.2.840.10008.5.1.4.1.1.2.2", FunctionalGroupProfile::Volumetric),
    // Enhanced MR, Enhanced MR Color, Legacy Converted Enhanced MR
    ("1.2.840.10008.5.1.4.1.1.4.1", FunctionalGroupProfile::Volumetric),
    ("1.2.840.10008.5.1.4.1.1.4.3", FunctionalGroupProfile::Volumetric),
    ("1.2.840.10008.5.1.4.1.1.4.4", FunctionalGroupProfile::Volumetric),
    // Enhanced PET, Legacy Converted Enhanced PET
    ("1.2.840.10008.5.1.4.1.1.130", FunctionalGroupProfile::Volumetric),
    ("1.2.840.10008.5.1.4.1.1.128.1", FunctionalGroupProfile::Volumetric),
    // Enhanced US Volume
    ("1.2.840.10008.5.1.4.1.1.6.2", FunctionalGroupProfile::Volumetric),
    // Enhanced XA, Enhanced XRF
    ("1.2.840.10008.5.1.4.1.1.12.1.1", FunctionalGroupProfile::XRay),
    ("1.2.840.10008.5.1.4.1.1.12.2.1", FunctionalGroupProfile::XRay),
    // Breast Tomosynthesis
    ("1.2.840.10008.5.1.4.1.1.13.1.3", FunctionalGroupProfile::Volumetric),
];

impl FunctionalGroupProfile {
    /// The profile of an enhanced SOP class, `None` for classic objects.
    pub fn for_sop_class(sop_class_uid: &str) -> Option<Self> {
        ENHANCED_SOP_CLASSES
            .iter()
            .find(|(uid, _)| *uid == sop_class_uid)
            .map(|(_, profile)| *profile)
    }
}

pub fn images<D: DicomAttributes>(
    dataset: &D,
    template: &Image,
    profile: FunctionalGroupProfile,
) -> Vec<Image> {
    let uid = template.sop_instance_uid.as_str();
    let mut images = (0..number_of_frames(dataset))
        .map(|frame_number| Image {
            frame_number,
            ..template.clone()
        })
        .collect::<Vec<_>>();

    match dataset.first_item(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE) {
        Some(shared) => {
            for image in images.iter_mut() {
                apply_functional_groups(shared, image, profile);
            }
        }
        None => error!(
            sop_instance_uid = uid,
            "Missing Shared Functional Groups Sequence"
        ),
    }

    match dataset.sequence_items(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE) {
        Some(items) => {
            if items.len() < images.len() {
                error!(
                    sop_instance_uid = uid,
                    "Per-Frame Functional Groups Sequence has {} items for {} frames",
                    items.len(),
                    images.len()
                );
            }
            for (image, item) in images.iter_mut().zip(items) {
                apply_functional_groups(item, image, profile);
            }
        }
        None => error!(
            sop_instance_uid = uid,
            "Missing Per-Frame Functional Groups Sequence"
        ),
    }
    images
}

/// Read the macros of one functional groups item into `image`. Absent macros leave the
/// image untouched.
fn apply_functional_groups<D: DicomAttributes>(
    group: &D,
    image: &mut Image,
    profile: FunctionalGroupProfile,
) {
    let sop_instance_uid = image.sop_instance_uid.clone();
    let uid = sop_instance_uid.as_str();

    if let Some(measures) = group.first_item(tags::PIXEL_MEASURES_SEQUENCE) {
        if let Some(spacing) = required(pixel_spacing(measures), uid) {
            image.pixel_spacing = Some(spacing);
        }
        if let Some(thickness) = optional(
            measures.required_float(tags::SLICE_THICKNESS, "Slice Thickness"),
            uid,
        ) {
            image.slice_thickness = Some(thickness);
        }
        if let Some(spacing) = optional(
            measures.required_float(tags::SPACING_BETWEEN_SLICES, "Spacing Between Slices"),
            uid,
        ) {
            image.spacing_between_slices = Some(spacing);
        }
    }
    if let Some(transformation) = group.first_item(tags::PIXEL_VALUE_TRANSFORMATION_SEQUENCE) {
        display::fill_rescale(transformation, image);
    }
    if let Some(voi) = group.first_item(tags::FRAME_VOILUT_SEQUENCE) {
        image.voi_luts = display::voi_luts(voi, uid);
    }
    if let Some(anatomy) = group.first_item(tags::FRAME_ANATOMY_SEQUENCE) {
        if let Some(laterality) = anatomy.string_value(tags::FRAME_LATERALITY) {
            image.image_laterality = Some(laterality);
        }
    }

    match profile {
        FunctionalGroupProfile::Volumetric => {
            if let Some(orientation) = group.first_item(tags::PLANE_ORIENTATION_SEQUENCE) {
                if let Some(orientation) = required(image_orientation(orientation), uid) {
                    image.set_orientation(orientation);
                }
            }
            if let Some(position) = group.first_item(tags::PLANE_POSITION_SEQUENCE) {
                if let Some(position) = required(image_position(position), uid) {
                    image.image_position = Some(position);
                }
            }
        }
        FunctionalGroupProfile::XRay => {
            if let Some(shutter) = group.first_item(tags::FRAME_DISPLAY_SHUTTER_SEQUENCE) {
                image.display_shutters = display::display_shutters(shutter, uid);
            }
            if let Some(properties) = group.first_item(X_RAY_FRAME_PIXEL_DATA_PROPERTIES_SEQUENCE)
            {
                if let Some(spacing) = optional(imager_pixel_spacing(properties), uid) {
                    image.imager_pixel_spacing = Some(spacing);
                }
            }
        }
    }
}
