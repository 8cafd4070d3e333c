use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use dicom::dictionary_std::tags;
use dicom::object::{DefaultDicomObject, OpenFileOptions, ReadError};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressIterator, ProgressStyle};
use itertools::Itertools;
use rayon::prelude::*;
use rust_search::SearchBuilder;

pub const DICM_PREFIX: &[u8; 4] = b"DICM";
pub const DICM_PREFIX_LOCATION: u64 = 128;

const BAR_TEMPLATE: &str =
    "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta} @ {per_sec})";
const SPINNER_TEMPLATE: &str = "{spinner:.blue} {msg}";

type IOResult<T> = Result<T, std::io::Error>;

pub fn default_bar(len: u64) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(len).with_style(style)
}

pub fn default_spinner() -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    ProgressBar::new_spinner().with_style(style)
}

/// Keep paths that passed a check, drop the ones that failed it, propagate errors.
fn keep_checked<T, E>(r: Result<(bool, T), E>) -> Option<Result<T, E>> {
    match r {
        Ok((true, p)) => Some(Ok(p)),
        Ok((false, _)) => None,
        Err(e) => Some(Err(e)),
    }
}

pub trait Inode
where
    Self: AsRef<Path>,
{
    fn inode(&self) -> IOResult<u64> {
        Ok(std::fs::metadata(self.as_ref())?.ino())
    }

    /// The inode of a path, or `value` if it cannot be queried.
    fn inode_or(&self, value: u64) -> u64 {
        self.inode().unwrap_or(value)
    }
}

impl<P: AsRef<Path>> Inode for P {}

pub trait InodeSort<P>
where
    P: AsRef<Path> + Inode,
    Self: Iterator<Item = P>,
{
    /// Sort paths by inode number, which roughly follows their placement on disk.
    fn sorted_by_inode(&mut self) -> impl Iterator<Item = P> {
        self.map(|p| (p.inode_or(0), p))
            .sorted_unstable_by_key(|(i, _)| *i)
            .map(|(_, p)| p)
    }

    /// Like `sorted_by_inode`, with a progress bar over the inode queries.
    fn sorted_by_inode_with_progress(&mut self) -> impl Iterator<Item = P> {
        let pb = match self.size_hint() {
            (_, Some(total)) => default_bar(total as u64),
            _ => default_spinner(),
        };
        pb.set_message("Sorting paths by inode");
        self.map(|p| (p.inode_or(0), p))
            .progress_with(pb)
            .sorted_unstable_by_key(|(i, _)| *i)
            .map(|(_, p)| p)
    }
}

impl<P: AsRef<Path> + Inode, I: Iterator<Item = P>> InodeSort<P> for I {}

pub trait SourceFileOperations
where
    Self: AsRef<Path>,
{
    /// Read a text file with one path per line. Blank lines are skipped.
    fn read_paths(&self) -> IOResult<impl Iterator<Item = IOResult<PathBuf>>> {
        let reader = BufReader::new(File::open(self.as_ref())?);
        Ok(reader.lines().filter_map(|line| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(Ok(PathBuf::from(line.trim()))),
            Err(e) => Some(Err(e)),
        }))
    }
}

impl<P: AsRef<Path>> SourceFileOperations for P {}

pub trait DicomFileOperations
where
    Self: AsRef<Path>,
{
    /// Whether the file carries the DICM magic after its 128 byte preamble.
    /// Only failing to open the file is an error; short files are not DICOM.
    fn has_dicm_prefix(&self) -> IOResult<bool> {
        let mut reader = File::open(self.as_ref())?;
        let mut buffer = [0; DICM_PREFIX.len()];
        let found = reader
            .seek(SeekFrom::Start(DICM_PREFIX_LOCATION))
            .and_then(|_| reader.read_exact(&mut buffer))
            .is_ok_and(|_| &buffer == DICM_PREFIX);
        Ok(found)
    }

    fn has_dicom_extension(&self) -> bool {
        self.as_ref()
            .extension()
            .is_some_and(|ext| ext == "dcm" || ext == "dicom" || ext == "DCM" || ext == "DICOM")
    }

    /// Decide by extension when there is one, otherwise by the DICM prefix.
    fn is_dicom_file(&self) -> IOResult<bool> {
        let path = self.as_ref();
        if self.has_dicom_extension() {
            Ok(path.is_file())
        } else if path.extension().is_some() || path.is_dir() {
            Ok(false)
        } else {
            self.has_dicm_prefix()
        }
    }

    fn is_dicom_file_or(&self, default: bool) -> bool {
        self.is_dicom_file().unwrap_or(default)
    }

    /// Recursively find the DICOM files under a directory.
    fn find_dicoms(&self) -> IOResult<impl Iterator<Item = PathBuf>> {
        let dir = self.as_ref();
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Not a directory",
            ));
        }
        let result = SearchBuilder::default()
            .location(dir)
            .build()
            .map(PathBuf::from)
            .filter(|file| file.is_dicom_file_or(false));
        Ok(result)
    }

    fn find_dicoms_with_spinner(&self) -> IOResult<impl Iterator<Item = PathBuf>> {
        let spinner = default_spinner();
        spinner.set_message("Searching for DICOM files");
        Ok(self.find_dicoms()?.inspect(move |_| spinner.tick()))
    }

    /// Read DICOM paths from a text file, keeping those that pass `is_dicom_file`.
    /// Errors opening the list or checking a path are propagated.
    fn read_dicom_paths(&self, progress: bool) -> IOResult<Vec<PathBuf>>
    where
        Self: SourceFileOperations,
    {
        let paths = self.read_paths()?.collect::<Vec<_>>();
        let pb = if progress {
            default_bar(paths.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_message("Reading DICOM paths from text file");
        paths
            .into_par_iter()
            .progress_with(pb)
            .map(|r| r.and_then(|p| p.is_dicom_file().map(|is_dicom| (is_dicom, p))))
            .filter_map(keep_checked)
            .collect()
    }

    /// Read the file meta group and every attribute before Pixel Data.
    fn read_header(&self) -> Result<DefaultDicomObject, ReadError> {
        OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(self.as_ref())
    }
}

impl<P: AsRef<Path>> DicomFileOperations for P {}

/// Expand a source argument into DICOM file paths: a directory is searched recursively,
/// a `.txt` file is read as a list of paths, anything else is taken as a single file.
pub fn collect_sources(source: &Path, progress: bool) -> IOResult<Vec<PathBuf>> {
    if source.is_dir() {
        if progress {
            Ok(source.find_dicoms_with_spinner()?.collect())
        } else {
            Ok(source.find_dicoms()?.collect())
        }
    } else if source.is_file() && source.extension().is_some_and(|ext| ext == "txt") {
        source.read_dicom_paths(progress)
    } else if source.is_file() {
        Ok(vec![source.to_path_buf()])
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Source does not exist",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[rstest]
    #[case::empty_file(vec![], false)]
    #[case::dicm_prefix(b"DICM".to_vec(), true)]
    #[case::wrong_prefix(b"NOT_DICM".to_vec(), false)]
    fn test_has_dicm_prefix(#[case] contents: Vec<u8>, #[case] expected: bool) {
        let mut temp = NamedTempFile::new().unwrap();
        temp.seek(SeekFrom::Start(DICM_PREFIX_LOCATION)).unwrap();
        temp.write_all(&contents).unwrap();
        assert_eq!(temp.path().has_dicm_prefix().unwrap(), expected);
    }

    #[rstest]
    #[case::no_extension("test", false)]
    #[case::wrong_extension("test.txt", false)]
    #[case::dcm_extension("test.dcm", true)]
    #[case::dicom_extension("test.dicom", true)]
    #[case::dcm_extension_uppercase("test.DCM", true)]
    #[case::mixed_case("test.DiCoM", false)]
    fn test_has_dicom_extension(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(PathBuf::from(path).has_dicom_extension(), expected);
    }

    #[test]
    fn test_is_dicom_file_real_dicom() {
        let path = dicom_test_files::path("pydicom/CT_small.dcm").unwrap();
        assert!(path.has_dicm_prefix().unwrap());
        assert!(path.is_dicom_file().unwrap());
    }

    #[test]
    fn test_extensionless_dicom_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("IM0001");
        std::fs::copy(dicom_test_files::path("pydicom/CT_small.dcm").unwrap(), &dest).unwrap();
        assert!(dest.is_dicom_file().unwrap());
    }

    #[rstest]
    #[case::no_spinner(false)]
    #[case::spinner(true)]
    fn test_collect_sources_from_directory(#[case] progress: bool) {
        let temp_dir = tempfile::tempdir().unwrap();
        let dicom_path = dicom_test_files::path("pydicom/CT_small.dcm").unwrap();
        let dicom_dest = temp_dir.path().join("test.dcm");
        std::fs::copy(&dicom_path, &dicom_dest).unwrap();
        std::fs::write(temp_dir.path().join("test.txt"), "not a DICOM file").unwrap();
        let sub_dir = temp_dir.path().join("subdir");
        std::fs::create_dir(&sub_dir).unwrap();
        let sub_dicom = sub_dir.join("sub.dcm");
        std::fs::copy(&dicom_path, &sub_dicom).unwrap();

        let files = collect_sources(temp_dir.path(), progress).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.contains(&dicom_dest));
        assert!(files.contains(&sub_dicom));
    }

    #[rstest]
    #[case::no_bar(false)]
    #[case::bar(true)]
    fn test_collect_sources_from_text_file(#[case] progress: bool) {
        let temp_dir = tempfile::tempdir().unwrap();
        let list = temp_dir.path().join("paths.txt");
        let file1 = temp_dir.path().join("file1.dcm");
        let file2 = temp_dir.path().join("file2.dcm");
        std::fs::write(&file1, "test1").unwrap();
        std::fs::write(&file2, "test2").unwrap();

        let mut handle = File::create(&list).unwrap();
        writeln!(handle, "{}", file1.display()).unwrap();
        writeln!(handle).unwrap();
        writeln!(handle, "{}", file2.display()).unwrap();
        writeln!(handle, "{}", temp_dir.path().join("notes.doc").display()).unwrap();
        drop(handle);

        let mut paths = collect_sources(&list, progress).unwrap();
        paths.sort();
        assert_eq!(paths, vec![file1, file2]);
    }

    #[test]
    fn test_collect_sources_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(collect_sources(&temp_dir.path().join("missing.dcm"), false).is_err());
    }

    #[rstest]
    #[case::no_progress(false)]
    #[case::progress(true)]
    fn test_inode_sort(#[case] progress: bool) {
        let temp_dir = tempfile::tempdir().unwrap();
        let files = (1..=3)
            .map(|i| {
                let path = temp_dir.path().join(format!("file{i}.dcm"));
                std::fs::write(&path, format!("file{i}")).unwrap();
                path
            })
            .collect_vec();
        let paths = vec![&files[1], &files[2], &files[0]];

        let sorted: Vec<_> = match progress {
            true => paths.into_iter().sorted_by_inode_with_progress().collect(),
            false => paths.into_iter().sorted_by_inode().collect(),
        };
        assert_eq!(sorted.len(), 3);
        let inodes = sorted.iter().map(|p| p.inode().unwrap()).collect_vec();
        assert!(inodes.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_read_header_stops_before_pixel_data() {
        let path = dicom_test_files::path("pydicom/CT_small.dcm").unwrap();
        let file = path.read_header().unwrap();
        assert!(file.get(tags::ROWS).is_some());
        assert!(file.get(tags::PIXEL_DATA).is_none());
    }
}
