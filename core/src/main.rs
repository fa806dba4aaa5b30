use clap::Parser;
use dcmw_core::cli::{Cli, OutputFormat};
use dcmw_core::schema::SchemaModel;
use dcmw_core::{Pipeline, PipelineConfig, PipelineOutput, TextReport};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    // Verify directory exists
    if !cli.directory.is_dir() {
        eprintln!("Error: {} is not a directory", cli.directory.display());
        process::exit(1);
    }

    let config = match load_config(cli.config.as_deref(), cli.threads) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let custom_schema = match cli.schema.as_deref().map(|p| SchemaModel::from_path(p)).transpose() {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let schema = match custom_schema.as_ref() {
        Some(schema) => schema,
        None => match SchemaModel::builtin() {
            Ok(schema) => schema,
            Err(e) => {
                eprintln!("Error: built-in table definitions are invalid: {}", e);
                process::exit(1);
            }
        },
    };

    info!("Processing directory: {}", cli.directory.display());

    let dicom_files = match collect_dicom_files(&cli.directory) {
        Ok(files) => files,
        Err(e) => {
            error!("Failed to read directory: {}", e);
            eprintln!("Error: Failed to read directory: {}", e);
            process::exit(1);
        }
    };

    if dicom_files.is_empty() {
        eprintln!("Error: No DICOM files found in directory");
        process::exit(1);
    }

    info!("Found {} DICOM files", dicom_files.len());

    let pipeline = Pipeline::new(schema, config);
    let output = match pipeline.run_files(&dicom_files) {
        Ok(output) => output,
        Err(e) => {
            error!("Pipeline failed: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if output.report.processed_sources == 0 {
        eprintln!("Error: No valid DICOM files could be read");
        process::exit(1);
    }

    print_output(&output, cli.format);
}

fn setup_logging(verbose: bool) {
    if verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }
}

/// Reads the configuration file, if any; `--threads` wins over the file
fn load_config(path: Option<&Path>, threads: Option<usize>) -> dcmw_core::Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };
    match threads {
        Some(0) => Err(dcmw_core::DcmwError::Config(
            "threads must be at least 1".to_string(),
        )),
        Some(threads) => Ok(config.with_threads(threads)),
        None => Ok(config),
    }
}

/// Collects DICOM files below `directory`, descending into subdirectories
fn collect_dicom_files(directory: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![directory.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                if let Some(ext) = path.extension() {
                    // Accept .dcm and .dicom extensions
                    if ext.eq_ignore_ascii_case("dcm") || ext.eq_ignore_ascii_case("dicom") {
                        files.push(path);
                    }
                } else if is_dicom_file(&path) {
                    // Scanners often write files without extension
                    files.push(path);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Checks if a file has a DICOM header
///
/// DICOM files typically have:
/// - 128-byte preamble
/// - 4-byte "DICM" magic string at offset 128
fn is_dicom_file(path: &Path) -> bool {
    use std::fs::File;
    use std::io::Read;

    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    // Read first 132 bytes (128-byte preamble + 4-byte "DICM" magic)
    let mut buffer = [0u8; 132];
    match file.read_exact(&mut buffer) {
        Ok(()) => &buffer[128..132] == b"DICM",
        Err(_) => false,
    }
}

fn print_output(output: &PipelineOutput, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!("{}", TextReport::new(output));
        }
        OutputFormat::Json => {
            #[cfg(feature = "json")]
            {
                match output_json(output) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize to JSON: {}", e);
                        eprintln!("Error: Failed to serialize to JSON: {}", e);
                        process::exit(1);
                    }
                }
            }
            #[cfg(not(feature = "json"))]
            {
                let _ = output;
                eprintln!("Error: JSON output requires the 'json' feature");
                eprintln!("Rebuild with: cargo build --features json");
                process::exit(1);
            }
        }
    }
}

#[cfg(feature = "json")]
fn output_json(output: &PipelineOutput) -> Result<String, serde_json::Error> {
    use dcmw_core::protocol::StudyProtocolSignature;
    use dcmw_core::ModalityClassification;
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct OutputJson<'a> {
        studies: &'a BTreeMap<String, StudyProtocolSignature>,
        series: &'a BTreeMap<String, ModalityClassification>,
        report: ReportJson,
    }

    #[derive(Serialize)]
    struct ReportJson {
        processed_sources: usize,
        skipped_sources: usize,
        entities: usize,
        field_warnings: usize,
        duplicate_sources: usize,
        disagreements: usize,
        rejections: Vec<String>,
        conflicts: Vec<String>,
        unclassifiable: BTreeMap<String, String>,
    }

    let report = &output.report;
    let json = OutputJson {
        studies: &output.signatures,
        series: &output.classifications,
        report: ReportJson {
            processed_sources: report.processed_sources,
            skipped_sources: report.skipped_sources,
            entities: output.snapshot.len(),
            field_warnings: report.field_warnings,
            duplicate_sources: report.duplicate_sources,
            disagreements: report.disagreements,
            rejections: report.rejections.iter().map(|r| r.to_string()).collect(),
            conflicts: report.conflicts.iter().map(|c| c.to_string()).collect(),
            unclassifiable: report
                .unclassifiable
                .iter()
                .map(|(uid, reason)| (uid.clone(), reason.to_string()))
                .collect(),
        },
    };

    serde_json::to_string_pretty(&json)
}
