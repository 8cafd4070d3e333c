use std::io::Write;
use std::path::{Path, PathBuf};

use crate::geometry::Vector;
use crate::image::Image;
use crate::series::Series;

pub const MANIFEST_HEADER: [&str; 11] = [
    "series_instance_uid",
    "volume_number",
    "order_number",
    "sop_instance_uid",
    "frame_number",
    "instance_number",
    "position_x",
    "position_y",
    "position_z",
    "acquisition_number",
    "path",
];

/// One image of an ordered series.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    series_instance_uid: String,
    volume_number: Option<u32>,
    order_number: Option<usize>,
    sop_instance_uid: String,
    frame_number: u32,
    instance_number: Option<i64>,
    position: Option<Vector>,
    acquisition_number: Option<String>,
    path: Option<PathBuf>,
}

impl ManifestEntry {
    pub fn new(series_instance_uid: &str, image: &Image) -> Self {
        Self {
            series_instance_uid: series_instance_uid.to_string(),
            volume_number: image.volume_number_in_series(),
            order_number: image.order_number_in_volume(),
            sop_instance_uid: image.sop_instance_uid.clone(),
            frame_number: image.frame_number,
            instance_number: image.instance_number,
            position: image.image_position,
            acquisition_number: image.acquisition_number.clone(),
            path: image.source.clone(),
        }
    }

    pub fn series_instance_uid(&self) -> &str {
        &self.series_instance_uid
    }

    pub fn volume_number(&self) -> Option<u32> {
        self.volume_number
    }

    pub fn order_number(&self) -> Option<usize> {
        self.order_number
    }

    pub fn sop_instance_uid(&self) -> &str {
        &self.sop_instance_uid
    }

    pub fn frame_number(&self) -> u32 {
        self.frame_number
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The entry as CSV fields, in the order of [`MANIFEST_HEADER`]. Absent values are empty.
    pub fn record(&self) -> [String; 11] {
        fn field<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }
        [
            self.series_instance_uid.clone(),
            field(self.volume_number),
            field(self.order_number),
            self.sop_instance_uid.clone(),
            self.frame_number.to_string(),
            field(self.instance_number),
            field(self.position.map(|p| p.x)),
            field(self.position.map(|p| p.y)),
            field(self.position.map(|p| p.z)),
            field(self.acquisition_number.as_deref()),
            field(self.path.as_ref().map(|p| p.display())),
        ]
    }
}

/// Entries for every image, series by series, each in its final order.
pub fn get_manifest<'a>(series: impl IntoIterator<Item = &'a Series>) -> Vec<ManifestEntry> {
    series
        .into_iter()
        .flat_map(|series| {
            series
                .images()
                .map(move |image| ManifestEntry::new(series.instance_uid(), image))
        })
        .collect()
}

pub fn write_manifest<W: Write>(entries: &[ManifestEntry], writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(MANIFEST_HEADER)?;
    for entry in entries {
        writer.write_record(entry.record())?;
    }
    writer.flush()?;
    Ok(())
}
