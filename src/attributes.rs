//! Read access to the attributes of a DICOM data set.
//!
//! The extraction code only needs a handful of questions answered about a data set:
//! whether a tag is present, its value as text or as a number, and the items of a
//! sequence. [`DicomAttributes`] captures exactly that, so functional group items
//! (which are nested data sets) can be read with the same calls as the top level.
use dicom::core::Tag;
use dicom::object::InMemDicomObject;
use snafu::{ensure, OptionExt, ResultExt};

use crate::errors::dicom::{
    CardinalitySnafu, InvalidValueSnafu, MissingPropertySnafu, ParseFloatSnafu,
};
use crate::errors::DicomError;

pub trait DicomAttributes: Sized {
    /// Whether the tag is present in the data set, regardless of its value.
    fn has_attribute(&self, tag: Tag) -> bool;

    /// The value rendered as text, with padding removed.
    /// Multi-valued attributes are joined with a backslash. Empty values are `None`.
    fn string_value(&self, tag: Tag) -> Option<String>;

    fn int_value(&self, tag: Tag) -> Option<i64>;

    fn float_value(&self, tag: Tag) -> Option<f64>;

    /// All values of a numeric attribute, e.g. LUT data.
    fn int_values(&self, tag: Tag) -> Option<Vec<i64>>;

    /// The items of a sequence attribute. `None` if the tag is absent or not a sequence.
    fn sequence_items(&self, tag: Tag) -> Option<&[Self]>;

    /// The first item of a sequence attribute.
    fn first_item(&self, tag: Tag) -> Option<&Self> {
        self.sequence_items(tag).and_then(|items| items.first())
    }

    /// Like `string_value`, but a missing value is an error.
    fn required_string(&self, tag: Tag, name: &'static str) -> Result<String, DicomError> {
        self.string_value(tag).context(MissingPropertySnafu { name })
    }

    /// Like `int_value`, telling a missing value apart from one that is not an integer.
    fn required_int(&self, tag: Tag, name: &'static str) -> Result<i64, DicomError> {
        match (self.int_value(tag), self.string_value(tag)) {
            (Some(value), _) => Ok(value),
            (None, Some(value)) => InvalidValueSnafu { name, value }.fail(),
            (None, None) => MissingPropertySnafu { name }.fail(),
        }
    }

    fn required_float(&self, tag: Tag, name: &'static str) -> Result<f64, DicomError> {
        match (self.float_value(tag), self.string_value(tag)) {
            (Some(value), _) => Ok(value),
            (None, Some(value)) => InvalidValueSnafu { name, value }.fail(),
            (None, None) => MissingPropertySnafu { name }.fail(),
        }
    }

    /// Parse a multi-valued decimal attribute with an exact number of values.
    fn float_array<const N: usize>(
        &self,
        tag: Tag,
        name: &'static str,
    ) -> Result<[f64; N], DicomError> {
        let value = self.required_string(tag, name)?;
        parse_float_array(&value, name)
    }
}

impl DicomAttributes for InMemDicomObject {
    fn has_attribute(&self, tag: Tag) -> bool {
        self.get(tag).is_some()
    }

    fn string_value(&self, tag: Tag) -> Option<String> {
        let value = self.get(tag)?.to_str().ok()?;
        let value = value.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    fn int_value(&self, tag: Tag) -> Option<i64> {
        self.get(tag)?.to_int::<i64>().ok()
    }

    fn float_value(&self, tag: Tag) -> Option<f64> {
        self.get(tag)?
            .to_float64()
            .ok()
            .filter(|value| value.is_finite())
    }

    fn int_values(&self, tag: Tag) -> Option<Vec<i64>> {
        let element = self.get(tag)?;
        element.to_multi_int::<i64>().ok().or_else(|| {
            // A single text value may still hold several backslash separated numbers
            let value = element.to_str().ok()?;
            value
                .split('\\')
                .map(|part| part.trim().parse::<i64>().ok())
                .collect()
        })
    }

    fn sequence_items(&self, tag: Tag) -> Option<&[Self]> {
        self.get(tag)?.items()
    }
}

/// Split a backslash separated value into floats. `NaN` and infinities are rejected.
pub fn parse_floats(value: &str, name: &'static str) -> Result<Vec<f64>, DicomError> {
    value
        .split('\\')
        .map(|part| -> Result<f64, DicomError> {
            let part = part.trim();
            let number = part.parse::<f64>().context(ParseFloatSnafu { name })?;
            ensure!(
                number.is_finite(),
                InvalidValueSnafu {
                    name,
                    value: part.to_string()
                }
            );
            Ok(number)
        })
        .collect()
}

/// Split a backslash separated value into exactly `N` floats.
pub fn parse_float_array<const N: usize>(
    value: &str,
    name: &'static str,
) -> Result<[f64; N], DicomError> {
    let values = parse_floats(value, name)?;
    let actual = values.len();
    values.try_into().ok().context(CardinalitySnafu {
        name,
        actual,
        expected: N,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use dicom::core::{DataElement, PrimitiveValue, VR};
    use dicom::dictionary_std::tags;
    use dicom::object::mem::InMemElement;
    use rstest::rstest;

    pub(crate) fn text(tag: Tag, vr: VR, value: &str) -> InMemElement {
        DataElement::new(tag, vr, PrimitiveValue::from(value))
    }

    pub(crate) fn sequence(tag: Tag, items: Vec<InMemDicomObject>) -> InMemElement {
        DataElement::new(
            tag,
            VR::SQ,
            dicom::core::value::DataSetSequence::from(items),
        )
    }

    pub(crate) fn dataset(elements: Vec<InMemElement>) -> InMemDicomObject {
        InMemDicomObject::from_element_iter(elements)
    }

    #[test]
    fn test_string_value_trims_padding() {
        let obj = dataset(vec![text(tags::MODALITY, VR::CS, "CT ")]);
        assert_eq!(obj.string_value(tags::MODALITY), Some("CT".to_string()));
        assert!(obj.has_attribute(tags::MODALITY));
        assert!(!obj.has_attribute(tags::ROWS));
    }

    #[test]
    fn test_empty_value_is_none() {
        let obj = dataset(vec![text(tags::ACQUISITION_NUMBER, VR::IS, "")]);
        assert!(obj.has_attribute(tags::ACQUISITION_NUMBER));
        assert_eq!(obj.string_value(tags::ACQUISITION_NUMBER), None);
    }

    #[test]
    fn test_numeric_values() {
        let obj = dataset(vec![
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(512_u16)),
            text(tags::SLICE_THICKNESS, VR::DS, "2.5"),
        ]);
        assert_eq!(obj.int_value(tags::ROWS), Some(512));
        assert_eq!(obj.float_value(tags::SLICE_THICKNESS), Some(2.5));
    }

    #[test]
    fn test_first_item() {
        let item = dataset(vec![text(tags::IMAGE_ORIENTATION_PATIENT, VR::DS, "1\\0\\0\\0\\1\\0")]);
        let obj = dataset(vec![sequence(tags::DETECTOR_INFORMATION_SEQUENCE, vec![item])]);
        let first = obj.first_item(tags::DETECTOR_INFORMATION_SEQUENCE).unwrap();
        assert!(first.has_attribute(tags::IMAGE_ORIENTATION_PATIENT));
        assert!(obj.first_item(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE).is_none());
    }

    #[rstest]
    #[case("1\\0\\0", Some([1.0, 0.0, 0.0]))]
    #[case(" -12.5\\3\\4e1", Some([-12.5, 3.0, 40.0]))]
    #[case("1\\0", None)]
    #[case("1\\a\\0", None)]
    #[case("NaN\\0\\0", None)]
    #[case("1\\inf\\0", None)]
    #[case("1\\0\\-infinity", None)]
    fn test_parse_float_array(#[case] value: &str, #[case] expected: Option<[f64; 3]>) {
        let result = parse_float_array::<3>(value, "Test");
        assert_eq!(result.ok(), expected);
    }

    #[test]
    fn test_cardinality_error() {
        let result = parse_float_array::<6>("1\\0\\0", "Image Orientation (Patient)");
        assert!(matches!(
            result,
            Err(DicomError::CardinalityError {
                actual: 3,
                expected: 6,
                ..
            })
        ));
    }

    #[test]
    fn test_non_finite_float_is_invalid() {
        let obj = dataset(vec![text(tags::SLICE_THICKNESS, VR::DS, "NaN")]);
        assert_eq!(obj.float_value(tags::SLICE_THICKNESS), None);
        assert!(matches!(
            obj.required_float(tags::SLICE_THICKNESS, "Slice Thickness"),
            Err(DicomError::InvalidValueError { .. })
        ));
        assert!(matches!(
            parse_floats("1\\inf", "Test"),
            Err(DicomError::InvalidValueError { .. })
        ));
    }

    #[test]
    fn test_required_int() {
        let obj = dataset(vec![
            text(tags::INSTANCE_NUMBER, VR::IS, "12"),
            text(tags::ACQUISITION_NUMBER, VR::IS, "abc"),
        ]);
        assert_eq!(obj.required_int(tags::INSTANCE_NUMBER, "Instance Number").unwrap(), 12);
        assert!(matches!(
            obj.required_int(tags::ACQUISITION_NUMBER, "Acquisition Number"),
            Err(DicomError::InvalidValueError { .. })
        ));
        assert!(obj.required_int(tags::ROWS, "Rows").unwrap_err().is_missing());
    }

    #[test]
    fn test_required_string_missing() {
        let obj = dataset(vec![]);
        let result = obj.required_string(tags::SOP_INSTANCE_UID, "SOP Instance UID");
        assert!(result.unwrap_err().is_missing());
    }
}
