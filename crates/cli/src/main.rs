use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use facesort_core::pipeline::categorize_batch_use_case::{BatchReport, CategorizeBatchUseCase};
use facesort_core::pipeline::categorizer::{CategorizeOutcome, Categorizer};
use facesort_core::pipeline::pipeline_logger::LogPipelineLogger;
use facesort_core::shared::constants::CATEGORIZED_DIR;
use facesort_core::shared::settings::Settings;
use facesort_core::shared::upload::Upload;
use facesort_core::storage::domain::photo_library::PhotoLibrary;
use facesort_core::storage::infrastructure::fs_photo_library::FsPhotoLibrary;

/// Register people and sort photos by whether a face is in them.
#[derive(Parser)]
#[command(name = "facesort")]
struct Cli {
    /// Library root holding `registered/` and `categorized/`.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Haar cascade XML to use instead of the stock frontal-face model.
    #[arg(long, global = true)]
    cascade: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store sample photos for a person.
    Register {
        name: String,
        #[arg(required = true)]
        samples: Vec<PathBuf>,
    },
    /// File photos under a label, or under `unknown` when no face is found.
    Categorize {
        /// A registered person, or `unknown`.
        #[arg(long)]
        label: String,
        /// Print result records as JSON.
        #[arg(long)]
        json: bool,
        #[arg(required = true)]
        photos: Vec<PathBuf>,
    },
    /// List registered persons.
    Persons,
    /// List categorized folders and their photos.
    Gallery,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load();
    let root = cli.root.unwrap_or(settings.data_root);
    let cascade = cli.cascade.or(settings.cascade_path);
    let library = Arc::new(FsPhotoLibrary::open(&root)?);
    log::info!("Photo library at {}", root.display());
    if let Some(path) = &cascade {
        log::info!("Using cascade {}", path.display());
    }

    match cli.command {
        Command::Register { name, samples } => {
            let uploads = read_uploads(&samples)?;
            let categorizer = build_categorizer(library, cascade.as_deref())?;
            categorizer.register(&name, &uploads)?;
            println!("Registered '{name}' with {} sample(s)", uploads.len());
        }
        Command::Categorize {
            label,
            json,
            photos,
        } => {
            let uploads = read_uploads(&photos)?;
            let mut categorizer = build_categorizer(library, cascade.as_deref())?;
            let report = CategorizeBatchUseCase::new(
                &mut categorizer,
                Box::new(LogPipelineLogger::new()),
            )
            .execute(&uploads, &label)?;
            log::info!(
                "Filed {} photo(s) under {}",
                report.results.len(),
                root.join(CATEGORIZED_DIR).display()
            );
            print_report(&report, json)?;
        }
        Command::Persons => {
            for name in library.registered_persons()? {
                println!("{name}");
            }
        }
        Command::Gallery => {
            for folder in library.categorized_persons()? {
                println!("{} ({} photos)", folder.name, folder.photo_paths.len());
                for path in &folder.photo_paths {
                    println!("  {}", path.display());
                }
            }
        }
    }

    Ok(())
}

fn build_categorizer(
    library: Arc<FsPhotoLibrary>,
    cascade: Option<&Path>,
) -> Result<Categorizer, Box<dyn std::error::Error>> {
    let categorizer =
        Categorizer::with_stock_detector(library, cascade, None, Some(Box::new(download_progress)))?;
    Ok(categorizer)
}

fn read_uploads(paths: &[PathBuf]) -> Result<Vec<Upload>, Box<dyn std::error::Error>> {
    paths.iter().map(|path| read_upload(path)).collect()
}

fn read_upload(path: &Path) -> Result<Upload, Box<dyn std::error::Error>> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Not a file: {}", path.display()))?;
    let bytes = fs::read(path).map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    Ok(Upload::new(file_name, bytes)?)
}

fn print_report(report: &BatchReport, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(&report.results)?);
    } else {
        for outcome in &report.results {
            println!("{}", describe(outcome));
        }
    }
    println!(
        "{} photo(s) with faces, {} without",
        report.with_faces(),
        report.without_faces()
    );
    Ok(())
}

fn describe(outcome: &CategorizeOutcome) -> String {
    match outcome {
        CategorizeOutcome::Success {
            label,
            face_count,
            destination_path,
        } => format!(
            "{}: {face_count} face(s), filed under '{label}'",
            destination_path.display()
        ),
        CategorizeOutcome::NoFaces {
            destination_path,
            diagnostic,
        } => match diagnostic {
            Some(reason) => format!("{}: no faces ({reason})", destination_path.display()),
            None => format!("{}: no faces", destination_path.display()),
        },
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parses_categorize_with_global_flags() {
        let cli = Cli::try_parse_from([
            "facesort",
            "categorize",
            "--label",
            "team",
            "--json",
            "a.jpg",
            "b.png",
            "--root",
            "/tmp/lib",
        ])
        .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/lib")));
        match cli.command {
            Command::Categorize {
                label,
                json,
                photos,
            } => {
                assert_eq!(label, "team");
                assert!(json);
                assert_eq!(photos.len(), 2);
            }
            _ => panic!("expected categorize"),
        }
    }

    #[test]
    fn test_register_requires_samples() {
        assert!(Cli::try_parse_from(["facesort", "register", "alice"]).is_err());
    }

    #[test]
    fn test_read_upload_keeps_file_name() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("group_photo.jpg");
        fs::write(&path, b"bytes").unwrap();

        let upload = read_upload(&path).unwrap();
        assert_eq!(upload.file_name(), "group_photo.jpg");
        assert_eq!(upload.bytes(), b"bytes");
    }

    #[test]
    fn test_read_upload_reports_missing_file() {
        let err = read_upload(Path::new("/nonexistent/photo.jpg")).unwrap_err();
        assert!(err.to_string().contains("Cannot read"));
    }

    #[test]
    fn test_describe_no_faces_with_reason() {
        let outcome = CategorizeOutcome::NoFaces {
            destination_path: PathBuf::from("data/categorized/unknown/x.jpg"),
            diagnostic: Some("could not decode".into()),
        };
        assert_eq!(
            describe(&outcome),
            "data/categorized/unknown/x.jpg: no faces (could not decode)"
        );
    }
}
