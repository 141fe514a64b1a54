use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;

use facewatch_core::enrollment::centroid::SamplePolicy;
use facewatch_core::fastpath::roi::PrevBox;
use facewatch_core::pipeline::embed_use_case::EmbedUseCase;
use facewatch_core::pipeline::engine::Engine;
use facewatch_core::pipeline::enroll_use_case::{EnrollRequest, EnrollUseCase};
use facewatch_core::pipeline::export_gallery_use_case::ExportGalleryUseCase;
use facewatch_core::pipeline::recognize_fast_use_case::{
    RecognizeFastRequest, RecognizeFastUseCase,
};
use facewatch_core::pipeline::recognize_use_case::{RecognizeRequest, RecognizeUseCase};
use facewatch_core::pipeline::status_use_case::StatusUseCase;
use facewatch_core::search::infrastructure::index_factory::IndexBackend;
use facewatch_core::shared::config::EngineConfig;
use facewatch_core::shared::constants::IMAGE_EXTENSIONS;

/// Face recognition against an enrolled gallery.
#[derive(Parser)]
#[command(name = "facewatch")]
struct Cli {
    /// JSON config file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Local gallery snapshot.
    #[arg(long, global = true)]
    gallery: Option<PathBuf>,

    /// Remote gallery export URL.
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Skip the remote gallery and use the local snapshot only.
    #[arg(long, global = true)]
    offline: bool,

    /// Similarity index: auto, matrix or brute.
    #[arg(long, global = true)]
    index_backend: Option<IndexBackend>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, global = true)]
    det_threshold: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect, identify and track every face in an image.
    Recognize {
        image: PathBuf,
        /// Match threshold override (-1.0 to 1.0).
        #[arg(long)]
        threshold: Option<f32>,
        /// Camera or client stream the frame belongs to.
        #[arg(long)]
        stream: Option<String>,
    },
    /// Identify the primary face, searching near its previous position first.
    RecognizeFast {
        image: PathBuf,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        stream: Option<String>,
        /// Previous box as a JSON array `[x, y, w, h]` in frame pixels.
        #[arg(long)]
        prev_bbox: Option<String>,
        /// Previous box in display coordinates: send_w,send_h,x,y,w,h.
        #[arg(long, value_delimiter = ',')]
        prev_scaled: Option<Vec<f64>>,
    },
    /// Print the embedding of the primary face.
    Embed { image: PathBuf },
    /// Enroll a person from one or more photos (files or directories).
    Enroll {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        relationship: String,
        /// Accept enrollment when at least this many samples contain a face.
        #[arg(long)]
        min_samples: Option<usize>,
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Replace the gallery with the remote export.
    Sync,
    /// Print the gallery as a snapshot document.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print engine health.
    Status,
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
    validate(&cli)?;
    let config = build_config(&cli)?;

    let engine = Engine::from_config(config);
    let startup = engine.init();
    let mutates = matches!(cli.command, Command::Enroll { .. } | Command::Sync);

    match cli.command {
        Command::Recognize {
            image,
            threshold,
            stream,
        } => {
            let bytes = read_image(&image)?;
            let response = RecognizeUseCase::new(&engine).execute(&RecognizeRequest {
                threshold,
                stream: stream.as_deref(),
                ..RecognizeRequest::new(&bytes)
            });
            print_json(&response)?;
        }
        Command::RecognizeFast {
            image,
            threshold,
            stream,
            prev_bbox,
            prev_scaled,
        } => {
            let bytes = read_image(&image)?;
            let response = RecognizeFastUseCase::new(&engine).execute(&RecognizeFastRequest {
                threshold,
                stream: stream.as_deref(),
                prev: prev_box(prev_bbox, prev_scaled),
                ..RecognizeFastRequest::new(&bytes)
            });
            print_json(&response)?;
        }
        Command::Embed { image } => {
            let bytes = read_image(&image)?;
            print_json(&EmbedUseCase::new(&engine).execute(&bytes))?;
        }
        Command::Enroll {
            name,
            relationship,
            min_samples,
            images,
        } => {
            let paths = expand_images(&images)?;
            let samples = paths
                .iter()
                .map(|p| read_image(p))
                .collect::<Result<Vec<_>, _>>()?;
            let policy = match min_samples {
                Some(n) => SamplePolicy::AtLeast(n),
                None => SamplePolicy::RequireAll,
            };
            let response = EnrollUseCase::new(&engine).execute(&EnrollRequest {
                name: &name,
                relationship: &relationship,
                images: &samples,
                policy,
            });
            print_json(&response)?;
        }
        // Startup already ran the sync.
        Command::Sync => print_json(&startup)?,
        Command::Export { output } => {
            let document = ExportGalleryUseCase::new(&engine).execute();
            match output {
                Some(path) => {
                    fs::write(&path, serde_json::to_string_pretty(&document)?)?;
                    log::info!("Gallery written to {}", path.display());
                }
                None => print_json(&document)?,
            }
        }
        Command::Status => print_json(&StatusUseCase::new(&engine).execute())?,
    }

    if mutates && !engine.teardown() {
        log::warn!("Gallery snapshot was not saved");
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(path) = &cli.gallery {
        config.gallery_path = path.clone();
    }
    if let Some(url) = &cli.backend_url {
        config.backend_gallery_url = url.clone();
    }
    if cli.offline {
        config.backend_gallery_url.clear();
    }
    if let Some(backend) = cli.index_backend {
        config.index_backend = backend;
    }
    if let Some(det) = cli.det_threshold {
        config.det_threshold = det;
    }
    config.validate()?;
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.offline && cli.backend_url.is_some() {
        return Err("--offline and --backend-url are mutually exclusive".into());
    }
    if let Command::Recognize {
        threshold: Some(t), ..
    }
    | Command::RecognizeFast {
        threshold: Some(t), ..
    } = &cli.command
    {
        if !(-1.0..=1.0).contains(t) {
            return Err(format!("Threshold must be between -1.0 and 1.0, got {t}").into());
        }
    }
    if let Command::Enroll {
        name, min_samples, ..
    } = &cli.command
    {
        if name.trim().is_empty() {
            return Err("Name must not be empty".into());
        }
        if *min_samples == Some(0) {
            return Err("--min-samples must be at least 1".into());
        }
    }
    Ok(())
}

fn prev_box(prev_bbox: Option<String>, prev_scaled: Option<Vec<f64>>) -> PrevBox {
    let scaled = |i: usize| prev_scaled.as_ref().and_then(|v| v.get(i).copied());
    PrevBox {
        prev_bbox,
        send_w: scaled(0),
        send_h: scaled(1),
        prev_x: scaled(2),
        prev_y: scaled(3),
        prev_w: scaled(4),
        prev_h: scaled(5),
    }
}

fn read_image(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    fs::read(path).map_err(|e| format!("Failed to read {}: {e}", path.display()).into())
}

/// Files as given; directories contribute their image files, sorted.
fn expand_images(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(input)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| is_image(p))
                .collect();
            found.sort();
            paths.extend(found);
        } else if input.exists() {
            paths.push(input.clone());
        } else {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
    }
    if paths.is_empty() {
        return Err("No images to enroll".into());
    }
    Ok(paths)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
