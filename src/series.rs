use std::collections::HashSet;

use itertools::Itertools;
use tracing::warn;

use crate::image::{Image, ImageId};

/// The images of one DICOM series.
///
/// Images are stored in insertion order and never move; [`ImageId`] handles stay valid
/// for the lifetime of the series. The presentation order is kept separately and
/// replaced wholesale once the series is ordered.
#[derive(Debug, Clone, Default)]
pub struct Series {
    instance_uid: String,
    images: Vec<Image>,
    keys: HashSet<(String, u32)>,
    order: Vec<ImageId>,
}

impl Series {
    pub fn new(instance_uid: impl Into<String>) -> Self {
        Self {
            instance_uid: instance_uid.into(),
            ..Default::default()
        }
    }

    pub fn instance_uid(&self) -> &str {
        &self.instance_uid
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Add an image. Returns `None` and discards the image if the series already holds
    /// a frame with the same SOP Instance UID and frame number.
    pub fn add_image(&mut self, image: Image) -> Option<ImageId> {
        let (uid, frame) = image.key();
        if !self.keys.insert((uid.to_string(), frame)) {
            warn!(
                sop_instance_uid = %image.sop_instance_uid,
                frame = image.frame_number,
                "Duplicate image rejected from series {}",
                self.instance_uid
            );
            return None;
        }
        let id = ImageId(self.images.len());
        self.images.push(image);
        self.order.push(id);
        Some(id)
    }

    pub fn image(&self, id: ImageId) -> Option<&Image> {
        self.images.get(id.0)
    }

    pub(crate) fn image_mut(&mut self, id: ImageId) -> Option<&mut Image> {
        self.images.get_mut(id.0)
    }

    /// Images in presentation order.
    pub fn images(&self) -> impl Iterator<Item = &Image> {
        self.order.iter().map(|id| &self.images[id.0])
    }

    /// Handles in presentation order.
    pub fn image_ids(&self) -> &[ImageId] {
        &self.order
    }

    /// Replace the presentation order. Handles that are unknown or repeated are dropped,
    /// and images missing from `order` keep their relative order at the end.
    pub fn set_images(&mut self, order: Vec<ImageId>) {
        let mut seen = vec![false; self.images.len()];
        let mut result = Vec::with_capacity(self.images.len());
        for id in order {
            match seen.get_mut(id.0) {
                Some(flag) if !*flag => {
                    *flag = true;
                    result.push(id);
                }
                _ => warn!("Ignoring invalid image handle {} in series order", id),
            }
        }
        let missing = (0..self.images.len())
            .filter(|&index| !seen[index])
            .map(ImageId)
            .collect_vec();
        result.extend(missing);
        self.order = result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_image_rejects_duplicates() {
        let mut series = Series::new("1.2.3");
        let first = series.add_image(Image::new("1.2.3.4", 0));
        let second = series.add_image(Image::new("1.2.3.4", 1));
        let duplicate = series.add_image(Image::new("1.2.3.4", 0));
        assert_eq!(first, Some(ImageId(0)));
        assert_eq!(second, Some(ImageId(1)));
        assert_eq!(duplicate, None);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_set_images() {
        let mut series = Series::new("1.2.3");
        let ids = (0..4)
            .map(|i| series.add_image(Image::new(format!("1.{i}"), 0)).unwrap())
            .collect_vec();

        series.set_images(vec![ids[2], ids[0], ids[2]]);
        let uids = series.images().map(|i| i.sop_instance_uid.as_str()).collect_vec();
        assert_eq!(uids, vec!["1.2", "1.0", "1.1", "1.3"]);

        // Handles are stable across reorders
        assert_eq!(series.image(ids[1]).unwrap().sop_instance_uid, "1.1");
    }

    #[test]
    fn test_set_images_ignores_unknown_handles() {
        let mut series = Series::new("1.2.3");
        let id = series.add_image(Image::new("1.0", 0)).unwrap();
        series.set_images(vec![ImageId(7), id]);
        assert_eq!(series.image_ids(), &[id]);
    }
}
