use std::path::PathBuf;

use snafu::Snafu;

use crate::errors::FillError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ImportError {
    #[snafu(display("missing Series Instance UID in {}", describe(path)))]
    MissingSeriesInstanceUid { path: Option<PathBuf> },

    #[snafu(display("unable to fill images from {}", describe(path)))]
    Fill {
        path: Option<PathBuf>,
        source: FillError,
    },
}

fn describe(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<in memory>".to_string())
}
