//! Batch import: route data sets to their series, fill images, order every series.
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use dicom::dictionary_std::tags;
use dicom::object::{FileDicomObject, InMemDicomObject};
use snafu::{OptionExt, ResultExt};
use tracing::debug;

use crate::attributes::DicomAttributes;
use crate::config::OrderingConfig;
use crate::errors::import::{FillSnafu, MissingSeriesInstanceUidSnafu};
use crate::errors::ImportError;
use crate::filler::{number_of_frames, FillContext, ImageFiller};
use crate::image::ImageId;
use crate::ordering::ImageOrderer;
use crate::series::Series;

/// First volume number given to single-frame images
pub const SINGLE_FRAME_VOLUME_BASE: u32 = 100;

/// Volume numbers of one series. Each multi-frame file is a volume of its own, numbered
/// from 1. Single-frame images share one volume per distinct matrix size, numbered from
/// [`SINGLE_FRAME_VOLUME_BASE`].
#[derive(Debug, Clone, Default)]
pub struct VolumeNumbering {
    multi_frame_files: u32,
    single_frame_sizes: Vec<(u16, u16)>,
}

impl VolumeNumbering {
    pub fn assign(&mut self, number_of_frames: u32, rows: u16, columns: u16) -> u32 {
        if number_of_frames > 1 {
            self.multi_frame_files += 1;
            return self.multi_frame_files;
        }
        let size = (rows, columns);
        let index = match self.single_frame_sizes.iter().position(|s| *s == size) {
            Some(index) => index,
            None => {
                self.single_frame_sizes.push(size);
                self.single_frame_sizes.len() - 1
            }
        };
        SINGLE_FRAME_VOLUME_BASE + index as u32
    }
}

#[derive(Debug, Default)]
pub struct ImportSession {
    filler: ImageFiller,
    orderer: ImageOrderer,
    series: BTreeMap<String, Series>,
    numbering: HashMap<String, VolumeNumbering>,
}

impl ImportSession {
    pub fn new(config: OrderingConfig) -> Self {
        Self {
            orderer: ImageOrderer::new(config),
            ..Default::default()
        }
    }

    pub fn series(&self, series_instance_uid: &str) -> Option<&Series> {
        self.series.get(series_instance_uid)
    }

    pub fn number_of_series(&self) -> usize {
        self.series.len()
    }

    /// Fill the images of one data set into its series and hand them to the orderer.
    pub fn ingest<D: DicomAttributes>(
        &mut self,
        dataset: &D,
        source: Option<&Path>,
        transfer_syntax_uid: Option<&str>,
    ) -> Result<Vec<ImageId>, ImportError> {
        let path = source.map(Path::to_path_buf);
        let series_uid = dataset
            .string_value(tags::SERIES_INSTANCE_UID)
            .context(MissingSeriesInstanceUidSnafu { path: path.clone() })?;
        let series = self
            .series
            .entry(series_uid.clone())
            .or_insert_with(|| Series::new(series_uid.clone()));

        let mut context = FillContext {
            series: &mut *series,
            source,
            transfer_syntax_uid,
        };
        let ids = self
            .filler
            .fill(dataset, &mut context)
            .context(FillSnafu { path })?;

        let (rows, columns) = ids
            .first()
            .and_then(|id| series.image(*id))
            .map(|image| (image.rows, image.columns))
            .unwrap_or_default();
        let volume_number = self
            .numbering
            .entry(series_uid)
            .or_default()
            .assign(number_of_frames(dataset), rows, columns);
        debug!(
            volume_number,
            frames = ids.len(),
            "Ingested data set into series {}",
            series.instance_uid()
        );

        for id in &ids {
            self.orderer.process_image(series, volume_number, *id);
        }
        Ok(ids)
    }

    /// Ingest a file read with [`crate::file::DicomFileOperations::read_header`] or [`dicom::object::open_file`].
    pub fn ingest_file(
        &mut self,
        file: &FileDicomObject<InMemDicomObject>,
        source: Option<&Path>,
    ) -> Result<Vec<ImageId>, ImportError> {
        let transfer_syntax_uid = file.meta().transfer_syntax().to_string();
        self.ingest(&**file, source, Some(&transfer_syntax_uid))
    }

    /// Order every series and return them by Series Instance UID.
    pub fn finish(mut self) -> Vec<Series> {
        self.orderer.post_processing(self.series.values_mut());
        self.series.into_values().collect()
    }
}
