//! Spatial ordering of the images of a series.
//!
//! Frames are collected per series and volume as they are read. Once input ends the
//! accumulated groups are turned into a presentation order and written back to the
//! series, together with each frame's order number in its volume.
use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::OrderingConfig;
use crate::image::ImageId;
use crate::series::Series;

pub mod accumulator;
pub mod evaluators;

pub use accumulator::{GroupKind, SeriesAccumulator, StackEntry, StackGroup, TieBreak, VolumeAccumulator};
pub use evaluators::{AcquisitionNumberEvaluator, PhasesPerPosition};

#[derive(Debug, Clone, Default)]
pub struct ImageOrderer {
    config: OrderingConfig,
    series: HashMap<String, SeriesAccumulator>,
}

impl ImageOrderer {
    pub fn new(config: OrderingConfig) -> Self {
        Self {
            config,
            series: HashMap::new(),
        }
    }

    pub fn config(&self) -> &OrderingConfig {
        &self.config
    }

    pub fn accumulator(&self, series_instance_uid: &str) -> Option<&SeriesAccumulator> {
        self.series.get(series_instance_uid)
    }

    /// Record one image of `series` under `volume_number`.
    pub fn process_image(&mut self, series: &Series, volume_number: u32, id: ImageId) {
        let Some(image) = series.image(id) else {
            warn!(
                "Image {} does not belong to series {}",
                id,
                series.instance_uid()
            );
            return;
        };
        let accumulator = self
            .series
            .entry(series.instance_uid().to_string())
            .or_default();
        if !accumulator.add(volume_number, id, image, &self.config) {
            debug!(
                "Image {} of series {} was already processed",
                id,
                series.instance_uid()
            );
        }
    }

    /// Write the computed order into `series`.
    ///
    /// Volumes are laid out in ascending volume number. Images that were never processed
    /// keep no order number and follow the ordered ones. The accumulated state is left
    /// untouched, so finalizing again gives the same result.
    pub fn finalize_series(&self, series: &mut Series) {
        let ids = series.image_ids().to_vec();
        for id in &ids {
            if let Some(image) = series.image_mut(*id) {
                image.clear_order();
            }
        }

        let Some(accumulator) = self.series.get(series.instance_uid()) else {
            debug!("No processed images in series {}", series.instance_uid());
            return;
        };

        let mut order = Vec::with_capacity(ids.len());
        for (volume_number, volume) in accumulator.volumes() {
            let volume_order = volume.ordered_images(&self.config);
            debug!(
                volume_number,
                groups = volume.groups().len(),
                frames = volume_order.len(),
                "Ordered volume of series {}",
                series.instance_uid()
            );
            for (order_number, id) in volume_order.iter().enumerate() {
                if let Some(image) = series.image_mut(*id) {
                    image.set_order(volume_number, order_number);
                }
            }
            order.extend(volume_order);
        }
        series.set_images(order);
    }

    /// Finalize every series once input is exhausted.
    pub fn post_processing<'a>(&self, series: impl IntoIterator<Item = &'a mut Series>) {
        let mut count = 0;
        for series in series {
            self.finalize_series(series);
            count += 1;
        }
        info!("Ordered {} series", count);
    }
}
