use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::Parser;
use dicom::object::DefaultDicomObject;
use indicatif::ProgressFinish;
use itertools::Itertools;
use rayon::prelude::*;
use snafu::{ensure, Report, ResultExt, Snafu, Whatever};
use tracing::{error, info, warn, Level};

use dicom_ordering::config::{
    OrderingConfig, DEFAULT_NORMAL_TOLERANCE_DEGREES, DEFAULT_STACK_SPREAD_THRESHOLD,
};
use dicom_ordering::errors::{dicom::ReadSnafu, DicomError, ImportError};
use dicom_ordering::file::{collect_sources, default_bar, DicomFileOperations, InodeSort};
use dicom_ordering::import::ImportSession;
use dicom_ordering::manifest::{get_manifest, write_manifest};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Invalid source path: {}", path.display()))]
    InvalidSourcePath {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("No sources found in source path: {}", path.display()))]
    NoSources { path: PathBuf },

    #[snafu(display("DICOM error on {}: {}", path.display(), source))]
    ReadDicom {
        path: PathBuf,
        #[snafu(source(from(DicomError, Box::new)))]
        source: Box<DicomError>,
    },

    #[snafu(display("Unable to import {}", path.display()))]
    Import {
        path: PathBuf,
        #[snafu(source(from(ImportError, Box::new)))]
        source: Box<ImportError>,
    },

    #[snafu(display("Error writing manifest to {}", path.display()))]
    WriteManifest {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("Error writing manifest: {:?}", source))]
    Csv {
        #[snafu(source(from(csv::Error, Box::new)))]
        source: Box<csv::Error>,
    },
}

#[derive(Parser, Debug)]
#[command(author = "Scott Chase Waggener", version = env!("CARGO_PKG_VERSION"), about = "Order the images of DICOM series in space and write a CSV manifest", long_about = None)]
struct Args {
    #[arg(
        help = "Source path. Can be a DICOM file, directory, or a text file with DICOM file paths"
    )]
    source: PathBuf,

    #[arg(help = "Output CSV path (default: stdout)")]
    output: Option<PathBuf>,

    #[arg(
        help = "Largest angle in degrees between slice normals of the same stack",
        long = "tolerance",
        short = 't',
        default_value_t = DEFAULT_NORMAL_TOLERANCE_DEGREES
    )]
    tolerance: f64,

    #[arg(
        help = "Spread in mm along the normal above which a group is ordered as a stack",
        long = "stack-threshold",
        default_value_t = DEFAULT_STACK_SPREAD_THRESHOLD
    )]
    stack_threshold: f64,

    #[arg(
        help = "Fail if any file cannot be read or imported",
        long = "strict",
        default_value_t = false
    )]
    strict: bool,

    #[arg(
        help = "Increase logging verbosity (-v info, -vv debug)",
        short = 'v',
        action = clap::ArgAction::Count
    )]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    let level = match args.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    run(args).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });
}

fn read(path: &Path) -> Result<DefaultDicomObject, Error> {
    path.read_header()
        .context(ReadSnafu)
        .context(ReadDicomSnafu { path })
}

fn run(args: Args) -> Result<(), Error> {
    let source = collect_sources(&args.source, true).context(InvalidSourcePathSnafu {
        path: &args.source,
    })?;
    let source = source
        .into_iter()
        .sorted_by_inode_with_progress()
        .collect::<Vec<_>>();
    ensure!(!source.is_empty(), NoSourcesSnafu { path: &args.source });
    info!("Number of sources found: {}", source.len());

    let pb = default_bar(source.len() as u64).with_finish(ProgressFinish::AndLeave);
    pb.set_message("Reading DICOM headers");
    let read_func = |path: PathBuf| {
        let result = read(&path);
        pb.inc(1);
        match result {
            Ok(file) => Ok((path, file)),
            Err(e) => {
                error!("Error reading file {}: {}", path.display(), Report::from_error(&e));
                Err(e)
            }
        }
    };
    let files = if args.strict {
        source
            .into_par_iter()
            .map(read_func)
            .collect::<Result<Vec<_>, _>>()?
    } else {
        source
            .into_par_iter()
            .map(read_func)
            .filter_map(Result::ok)
            .collect::<Vec<_>>()
    };

    let config = OrderingConfig::default()
        .with_normal_tolerance(args.tolerance)
        .with_stack_spread_threshold(args.stack_threshold);
    let mut session = ImportSession::new(config);

    // Ingest in path order for a reproducible order of ties
    for (path, file) in files.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
        match session.ingest_file(&file, Some(path.as_path())) {
            Ok(_) => {}
            Err(e) if args.strict => return Err(e).context(ImportSnafu { path }),
            Err(e) => warn!("Skipping {}: {}", path.display(), Report::from_error(&e)),
        }
    }
    info!("Found {} series", session.number_of_series());

    let series = session.finish();
    let manifest = get_manifest(&series);
    match &args.output {
        Some(path) => {
            let file = File::create(path).context(WriteManifestSnafu { path })?;
            write_manifest(&manifest, BufWriter::new(file)).context(CsvSnafu)?;
        }
        None => write_manifest(&manifest, std::io::stdout().lock()).context(CsvSnafu)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{run, Args};
    use dicom::dictionary_std::tags;
    use dicom::object::open_file;
    use rstest::rstest;

    fn args(source: std::path::PathBuf, output: std::path::PathBuf, strict: bool) -> Args {
        Args {
            source,
            output: Some(output),
            tolerance: 1.0,
            stack_threshold: 1.0,
            strict,
            verbose: 0,
        }
    }

    #[rstest]
    #[case("path")]
    #[case("text")]
    #[case("dir")]
    fn test_main(#[case] input_type: &str) {
        let dicom_file_path = dicom_test_files::path("pydicom/CT_small.dcm").unwrap();
        let temp_dir = tempfile::tempdir().unwrap();
        let temp_dicom_path = temp_dir.path().join("CT_small.dcm");
        std::fs::copy(&dicom_file_path, &temp_dicom_path).unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        let output = output_dir.path().join("manifest.csv");

        let source = match input_type {
            "path" => temp_dicom_path.clone(),
            "text" => {
                let paths_file_path = temp_dir.path().join("paths.txt");
                std::fs::write(&paths_file_path, temp_dicom_path.to_str().unwrap()).unwrap();
                paths_file_path
            }
            "dir" => temp_dir.path().to_path_buf(),
            _ => unreachable!(),
        };
        run(args(source, output.clone(), true)).unwrap();

        let dicom_file = open_file(&dicom_file_path).unwrap();
        let sop_instance_uid = dicom_file
            .get(tags::SOP_INSTANCE_UID)
            .unwrap()
            .value()
            .to_str()
            .unwrap()
            .trim_end_matches('\0')
            .to_string();

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][2], "0");
        assert_eq!(&records[0][3], sop_instance_uid.as_str());
        assert_eq!(&records[0][10], temp_dicom_path.to_str().unwrap());
    }

    #[rstest]
    #[case::lenient(false)]
    #[case::strict(true)]
    fn test_unreadable_file(#[case] strict: bool) {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::copy(
            dicom_test_files::path("pydicom/CT_small.dcm").unwrap(),
            temp_dir.path().join("good.dcm"),
        )
        .unwrap();
        std::fs::write(temp_dir.path().join("bad.dcm"), "not a DICOM file").unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        let output = output_dir.path().join("manifest.csv");

        let result = run(args(temp_dir.path().to_path_buf(), output.clone(), strict));
        assert_eq!(result.is_err(), strict);
        if !strict {
            let mut reader = csv::Reader::from_path(&output).unwrap();
            assert_eq!(reader.records().count(), 1);
        }
    }

    #[test]
    fn test_no_sources() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output = temp_dir.path().join("manifest.csv");
        std::fs::create_dir(temp_dir.path().join("empty")).unwrap();
        let result = run(args(temp_dir.path().join("empty"), output, false));
        assert!(matches!(result, Err(super::Error::NoSources { .. })));
    }
}
