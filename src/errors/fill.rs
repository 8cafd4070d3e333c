use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
/// Outcome of filling images from one data set when nothing usable came out of it
pub enum FillError {
    #[snafu(display("data set {} has neither Rows nor Pixel Data", sop_instance_uid))]
    NotAnImage { sop_instance_uid: String },

    #[snafu(display(
        "none of the {} images of {} were added to series {}",
        count,
        sop_instance_uid,
        series_instance_uid
    ))]
    NoImagesAdded {
        sop_instance_uid: String,
        series_instance_uid: String,
        count: usize,
    },
}
