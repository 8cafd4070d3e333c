//! Display related attributes: rescale, VOI LUTs and display shutters.
use dicom::dictionary_std::tags;
use itertools::Itertools;
use tracing::error;

use crate::attributes::{parse_floats, DicomAttributes};
use crate::errors::DicomError;
use crate::filler::{optional, required};
use crate::image::{DisplayShutter, Image, ShutterShape, VoiLut};

pub fn fill<D: DicomAttributes>(dataset: &D, image: &mut Image) {
    let sop_instance_uid = image.sop_instance_uid.clone();
    let uid = sop_instance_uid.as_str();
    fill_rescale(dataset, image);
    image.voi_luts = voi_luts(dataset, uid);
    image.display_shutters = display_shutters(dataset, uid);
}

/// Rescale Slope falls back to 1 when absent or zero, Rescale Intercept to 0.
pub fn fill_rescale<D: DicomAttributes>(dataset: &D, image: &mut Image) {
    let uid = image.sop_instance_uid.as_str();
    let slope = optional(
        dataset.required_float(tags::RESCALE_SLOPE, "Rescale Slope"),
        uid,
    );
    let intercept = optional(
        dataset.required_float(tags::RESCALE_INTERCEPT, "Rescale Intercept"),
        uid,
    );
    image.rescale_slope = slope.filter(|&slope| slope != 0.0).unwrap_or(1.0);
    image.rescale_intercept = intercept.unwrap_or_default();
}

/// Windows from Window Center / Width followed by the tables of the VOI LUT Sequence.
pub fn voi_luts<D: DicomAttributes>(dataset: &D, uid: &str) -> Vec<VoiLut> {
    let mut luts = optional(windows(dataset), uid).unwrap_or_default();
    if let Some(items) = dataset.sequence_items(tags::VOILUT_SEQUENCE) {
        luts.extend(items.iter().filter_map(|item| required(lut_table(item), uid)));
    }
    luts
}

fn windows<D: DicomAttributes>(dataset: &D) -> Result<Vec<VoiLut>, DicomError> {
    let center = dataset.required_string(tags::WINDOW_CENTER, "Window Center")?;
    let width = dataset.required_string(tags::WINDOW_WIDTH, "Window Width")?;
    let centers = parse_floats(&center, "Window Center")?;
    let widths = parse_floats(&width, "Window Width")?;
    if centers.len() != widths.len() {
        return Err(DicomError::CardinalityError {
            name: "Window Width",
            actual: widths.len(),
            expected: centers.len(),
        });
    }
    let explanations = dataset
        .string_value(tags::WINDOW_CENTER_WIDTH_EXPLANATION)
        .map(|value| value.split('\\').map(|part| part.trim().to_string()).collect_vec())
        .unwrap_or_default();

    Ok(centers
        .into_iter()
        .zip(widths)
        .enumerate()
        .map(|(index, (center, width))| VoiLut::Window {
            center,
            width,
            explanation: explanations.get(index).filter(|e| !e.is_empty()).cloned(),
        })
        .collect())
}

fn lut_table<D: DicomAttributes>(item: &D) -> Result<VoiLut, DicomError> {
    let descriptor = item
        .int_values(tags::LUT_DESCRIPTOR)
        .ok_or(DicomError::MissingPropertyError {
            name: "LUT Descriptor",
        })?;
    let actual = descriptor.len();
    let descriptor: [i64; 3] =
        descriptor
            .try_into()
            .map_err(|_| DicomError::CardinalityError {
                name: "LUT Descriptor",
                actual,
                expected: 3,
            })?;
    let data = item
        .int_values(tags::LUT_DATA)
        .ok_or(DicomError::MissingPropertyError { name: "LUT Data" })?;
    Ok(VoiLut::Table {
        descriptor,
        explanation: item.string_value(tags::LUT_EXPLANATION),
        data,
    })
}

/// Shutters named by Shutter Shape. A shape whose geometry is incomplete is logged and skipped.
pub fn display_shutters<D: DicomAttributes>(dataset: &D, uid: &str) -> Vec<DisplayShutter> {
    let Some(shapes) = dataset.string_value(tags::SHUTTER_SHAPE) else {
        return Vec::new();
    };
    let presentation_value = dataset.int_value(tags::SHUTTER_PRESENTATION_VALUE);
    shapes
        .split('\\')
        .map(str::trim)
        .filter_map(|shape| {
            let shape = match shape {
                "RECTANGULAR" => required(rectangular(dataset), uid),
                "CIRCULAR" => required(circular(dataset), uid),
                "POLYGONAL" => required(polygonal(dataset), uid),
                other => {
                    error!(sop_instance_uid = uid, "Unknown shutter shape {}", other);
                    None
                }
            }?;
            Some(DisplayShutter {
                shape,
                presentation_value,
            })
        })
        .collect()
}

fn rectangular<D: DicomAttributes>(dataset: &D) -> Result<ShutterShape, DicomError> {
    Ok(ShutterShape::Rectangular {
        left: dataset.required_int(tags::SHUTTER_LEFT_VERTICAL_EDGE, "Shutter Left Vertical Edge")?,
        right: dataset
            .required_int(tags::SHUTTER_RIGHT_VERTICAL_EDGE, "Shutter Right Vertical Edge")?,
        upper: dataset
            .required_int(tags::SHUTTER_UPPER_HORIZONTAL_EDGE, "Shutter Upper Horizontal Edge")?,
        lower: dataset
            .required_int(tags::SHUTTER_LOWER_HORIZONTAL_EDGE, "Shutter Lower Horizontal Edge")?,
    })
}

fn circular<D: DicomAttributes>(dataset: &D) -> Result<ShutterShape, DicomError> {
    let name = "Center of Circular Shutter";
    let center = dataset
        .int_values(tags::CENTER_OF_CIRCULAR_SHUTTER)
        .ok_or(DicomError::MissingPropertyError { name })?;
    let [center_row, center_column] = center[..] else {
        return Err(DicomError::CardinalityError {
            name,
            actual: center.len(),
            expected: 2,
        });
    };
    Ok(ShutterShape::Circular {
        center_row,
        center_column,
        radius: dataset
            .required_int(tags::RADIUS_OF_CIRCULAR_SHUTTER, "Radius of Circular Shutter")?,
    })
}

fn polygonal<D: DicomAttributes>(dataset: &D) -> Result<ShutterShape, DicomError> {
    let name = "Vertices of the Polygonal Shutter";
    let values = dataset
        .int_values(tags::VERTICES_OF_THE_POLYGONAL_SHUTTER)
        .ok_or(DicomError::MissingPropertyError { name })?;
    if values.len() % 2 != 0 || values.is_empty() {
        return Err(DicomError::CardinalityError {
            name,
            actual: values.len(),
            expected: values.len() + values.len() % 2,
        });
    }
    let vertices = values
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect();
    Ok(ShutterShape::Polygonal { vertices })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::tests::{dataset, sequence, text};
    use dicom::core::{DataElement, PrimitiveValue, VR};
    use rstest::rstest;

    #[rstest]
    #[case(None, 1.0)]
    #[case(Some("0"), 1.0)]
    #[case(Some("2.5"), 2.5)]
    fn test_rescale_slope(#[case] value: Option<&str>, #[case] expected: f64) {
        let mut elements = vec![text(tags::RESCALE_INTERCEPT, VR::DS, "-1024")];
        if let Some(value) = value {
            elements.push(text(tags::RESCALE_SLOPE, VR::DS, value));
        }
        let mut image = Image::new("1", 0);
        fill_rescale(&dataset(elements), &mut image);
        assert_eq!(image.rescale_slope, expected);
        assert_eq!(image.rescale_intercept, -1024.0);
    }

    #[test]
    fn test_windows_and_tables() {
        let table = dataset(vec![
            DataElement::new(
                tags::LUT_DESCRIPTOR,
                VR::US,
                PrimitiveValue::U16(vec![4_u16, 0, 16].into()),
            ),
            text(tags::LUT_EXPLANATION, VR::LO, "LINEAR"),
            DataElement::new(
                tags::LUT_DATA,
                VR::US,
                PrimitiveValue::U16(vec![0_u16, 100, 200, 300].into()),
            ),
        ]);
        let obj = dataset(vec![
            text(tags::WINDOW_CENTER, VR::DS, "40\\400"),
            text(tags::WINDOW_WIDTH, VR::DS, "80\\2000"),
            text(tags::WINDOW_CENTER_WIDTH_EXPLANATION, VR::LO, "BRAIN\\BONE"),
            sequence(tags::VOILUT_SEQUENCE, vec![table]),
        ]);
        let luts = voi_luts(&obj, "1");
        assert_eq!(
            luts,
            vec![
                VoiLut::Window {
                    center: 40.0,
                    width: 80.0,
                    explanation: Some("BRAIN".to_string())
                },
                VoiLut::Window {
                    center: 400.0,
                    width: 2000.0,
                    explanation: Some("BONE".to_string())
                },
                VoiLut::Table {
                    descriptor: [4, 0, 16],
                    explanation: Some("LINEAR".to_string()),
                    data: vec![0, 100, 200, 300],
                },
            ]
        );
    }

    #[test]
    fn test_mismatched_window_values_are_skipped() {
        let obj = dataset(vec![
            text(tags::WINDOW_CENTER, VR::DS, "40\\400"),
            text(tags::WINDOW_WIDTH, VR::DS, "80"),
        ]);
        assert!(voi_luts(&obj, "1").is_empty());
    }

    #[test]
    fn test_shutters() {
        let obj = dataset(vec![
            text(tags::SHUTTER_SHAPE, VR::CS, "RECTANGULAR\\CIRCULAR\\POLYGONAL"),
            text(tags::SHUTTER_LEFT_VERTICAL_EDGE, VR::IS, "10"),
            text(tags::SHUTTER_RIGHT_VERTICAL_EDGE, VR::IS, "500"),
            text(tags::SHUTTER_UPPER_HORIZONTAL_EDGE, VR::IS, "20"),
            text(tags::SHUTTER_LOWER_HORIZONTAL_EDGE, VR::IS, "490"),
            text(tags::CENTER_OF_CIRCULAR_SHUTTER, VR::IS, "256\\255"),
            text(tags::RADIUS_OF_CIRCULAR_SHUTTER, VR::IS, "200"),
            text(tags::VERTICES_OF_THE_POLYGONAL_SHUTTER, VR::IS, "1\\1\\1\\100\\100\\50"),
            DataElement::new(
                tags::SHUTTER_PRESENTATION_VALUE,
                VR::US,
                PrimitiveValue::from(0_u16),
            ),
        ]);
        let shapes = display_shutters(&obj, "1")
            .into_iter()
            .map(|shutter| {
                assert_eq!(shutter.presentation_value, Some(0));
                shutter.shape
            })
            .collect_vec();
        assert_eq!(
            shapes,
            vec![
                ShutterShape::Rectangular {
                    left: 10,
                    right: 500,
                    upper: 20,
                    lower: 490
                },
                ShutterShape::Circular {
                    center_row: 256,
                    center_column: 255,
                    radius: 200
                },
                ShutterShape::Polygonal {
                    vertices: vec![(1, 1), (1, 100), (100, 50)]
                },
            ]
        );
    }

    #[test]
    fn test_incomplete_shutter_is_skipped() {
        let obj = dataset(vec![
            text(tags::SHUTTER_SHAPE, VR::CS, "CIRCULAR"),
            text(tags::CENTER_OF_CIRCULAR_SHUTTER, VR::IS, "256\\255"),
        ]);
        assert!(display_shutters(&obj, "1").is_empty());
    }
}
