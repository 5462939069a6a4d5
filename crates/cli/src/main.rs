use std::path::PathBuf;
use std::process;

use clap::Parser;

use facesort_core::clustering::infrastructure::kmeans_assigner::KMeansAssigner;
use facesort_core::detection::domain::embedding_extractor::EmbeddingExtractor;
use facesort_core::detection::domain::face_detector::FaceDetector;
use facesort_core::detection::infrastructure::onnx_embedding_extractor::OnnxEmbeddingExtractor;
use facesort_core::detection::infrastructure::onnx_face_detector::OnnxFaceDetector;
use facesort_core::imaging::infrastructure::image_file_reader::ImageFileReader;
use facesort_core::pipeline::cluster_faces_use_case::{ClusterConfig, ClusterFacesUseCase};
use facesort_core::pipeline::cluster_materializer::{
    CollisionPolicy, ExistingOutput, MaterializeOptions,
};
use facesort_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facesort_core::shared::constants::{
    DEFAULT_CLUSTERS, DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, EMBEDDING_MODEL_NAME,
    EMBEDDING_MODEL_URL,
};
use facesort_core::shared::model_resolver;

/// Sort a directory of photos into clusters by the face they contain.
#[derive(Parser)]
#[command(name = "facesort")]
struct Cli {
    /// Directory of input images.
    input_dir: PathBuf,

    /// Directory to create cluster_<id>/ subdirectories in.
    output_dir: PathBuf,

    /// Number of clusters to partition the faces into.
    #[arg(long, default_value_t = DEFAULT_CLUSTERS)]
    clusters: usize,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f64,

    /// Seed for the clustering random state.
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Filename collision handling: overwrite or namespace.
    #[arg(long, default_value = "overwrite")]
    collision: String,

    /// Threads used for copying files into the output tree.
    #[arg(long, default_value = "4")]
    copy_threads: usize,

    /// Fail instead of adding to a non-empty output directory.
    #[arg(long)]
    refuse_existing: bool,
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

    let detector = build_detector(&cli)?;
    let extractor = build_extractor()?;

    let config = ClusterConfig {
        n_clusters: cli.clusters,
        materialize: MaterializeOptions {
            collision: parse_collision(&cli.collision),
            on_existing: if cli.refuse_existing {
                ExistingOutput::Refuse
            } else {
                ExistingOutput::Append
            },
            copy_workers: cli.copy_threads,
        },
    };

    let mut use_case = ClusterFacesUseCase::new(
        Box::new(ImageFileReader::new()),
        detector,
        extractor,
        Box::new(KMeansAssigner::new(cli.seed)),
        Box::new(StdoutPipelineLogger::default()),
    );

    let summary = use_case.execute(&cli.input_dir, &cli.output_dir, &config)?;
    log::info!(
        "Done: {} images placed under {}",
        summary.materialized.total_placed(),
        cli.output_dir.display()
    );
    Ok(())
}

fn build_detector(cli: &Cli) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {DETECTOR_MODEL_NAME}");
    let model_path = model_resolver::resolve(
        DETECTOR_MODEL_NAME,
        DETECTOR_MODEL_URL,
        Some(Box::new(download_progress)),
    )?;
    eprintln!();
    Ok(Box::new(OnnxFaceDetector::new(&model_path, cli.confidence)?))
}

fn build_extractor() -> Result<Box<dyn EmbeddingExtractor>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {EMBEDDING_MODEL_NAME}");
    let model_path = model_resolver::resolve(
        EMBEDDING_MODEL_NAME,
        EMBEDDING_MODEL_URL,
        Some(Box::new(download_progress)),
    )?;
    eprintln!();
    Ok(Box::new(OnnxEmbeddingExtractor::new(&model_path)?))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input_dir.is_dir() {
        return Err(format!("Input directory not found: {}", cli.input_dir.display()).into());
    }
    if cli.clusters == 0 {
        return Err("Cluster count must be at least 1".into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.collision != "overwrite" && cli.collision != "namespace" {
        return Err(format!(
            "Collision policy must be 'overwrite' or 'namespace', got '{}'",
            cli.collision
        )
        .into());
    }
    Ok(())
}

fn parse_collision(policy: &str) -> CollisionPolicy {
    if policy == "namespace" {
        CollisionPolicy::NamespaceBySource
    } else {
        CollisionPolicy::Overwrite
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}
