use std::path::Path;

use crate::clustering::domain::cluster_assigner::ClusterAssigner;
use crate::clustering::domain::embedding_batch::{
    EmbeddingBatch, ImageRecord, RecordStatus, SkipReason,
};
use crate::detection::domain::embedding_extractor::EmbeddingExtractor;
use crate::detection::domain::face_detector::FaceDetector;
use crate::imaging::domain::image_reader::ImageReader;
use crate::pipeline::cluster_materializer::{
    ClusterMaterializer, MaterializeOptions, MaterializeSummary,
};
use crate::pipeline::error::PipelineError;
use crate::pipeline::image_scanner::scan_images;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::constants::DEFAULT_CLUSTERS;

#[derive(Clone, Debug)]
pub struct ClusterConfig {
    pub n_clusters: usize,
    pub materialize: MaterializeOptions,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            n_clusters: DEFAULT_CLUSTERS,
            materialize: MaterializeOptions::default(),
        }
    }
}

#[derive(Debug)]
pub struct ClusterSummary {
    /// One record per enumerated image, in enumeration order, each
    /// marked Embedded or Failed.
    pub records: Vec<ImageRecord>,
    pub embedded: usize,
    pub skipped: usize,
    pub materialized: MaterializeSummary,
}

/// Directory clustering pipeline: enumerate → read → detect → embed →
/// assign → materialize.
///
/// Per-image failures (unreadable file, no face, capability error)
/// mark that image's record and continue; only run-level
/// preconditions abort. The embedding batch is completed in full
/// before clustering begins, in enumeration order.
pub struct ClusterFacesUseCase {
    reader: Box<dyn ImageReader>,
    detector: Box<dyn FaceDetector>,
    extractor: Box<dyn EmbeddingExtractor>,
    assigner: Box<dyn ClusterAssigner>,
    logger: Box<dyn PipelineLogger>,
}

impl ClusterFacesUseCase {
    pub fn new(
        reader: Box<dyn ImageReader>,
        detector: Box<dyn FaceDetector>,
        extractor: Box<dyn EmbeddingExtractor>,
        assigner: Box<dyn ClusterAssigner>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            reader,
            detector,
            extractor,
            assigner,
            logger,
        }
    }

    pub fn execute(
        &mut self,
        input_dir: &Path,
        output_root: &Path,
        config: &ClusterConfig,
    ) -> Result<ClusterSummary, PipelineError> {
        if config.n_clusters == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "n_clusters must be at least 1".into(),
            ));
        }

        let paths = scan_images(input_dir).map_err(|source| PipelineError::InputDir {
            path: input_dir.to_path_buf(),
            source,
        })?;

        let mut records: Vec<ImageRecord> = paths.into_iter().map(ImageRecord::new).collect();
        let total = records.len();
        let mut batch = EmbeddingBatch::new();

        for (i, record) in records.iter_mut().enumerate() {
            let status = match embed_one(
                self.reader.as_ref(),
                self.detector.as_mut(),
                self.extractor.as_ref(),
                &record.path,
            ) {
                Ok(Some(embedding)) => match batch.push(embedding, record.path.clone()) {
                    Ok(()) => RecordStatus::Embedded,
                    Err(e) => RecordStatus::Failed(SkipReason::Processing(e.to_string())),
                },
                Ok(None) => RecordStatus::Failed(SkipReason::NoFace),
                Err(cause) => RecordStatus::Failed(SkipReason::Processing(cause)),
            };

            if let RecordStatus::Failed(ref reason) = status {
                self.logger.skipped(&record.path, reason);
            }
            record.status = status;
            self.logger.progress(i + 1, total);
        }

        if batch.is_empty() {
            return Err(PipelineError::EmptyBatch { scanned: total });
        }

        let assignment = self.assigner.assign(&batch, config.n_clusters)?;
        let materialized = ClusterMaterializer::new(config.materialize.clone()).materialize(
            &assignment,
            config.n_clusters,
            &batch,
            output_root,
        )?;

        let embedded = batch.len();
        let skipped = total - embedded;
        self.logger.info(&format!(
            "Placed {} images into {} clusters ({} skipped)",
            materialized.total_placed(),
            config.n_clusters,
            skipped
        ));
        self.logger.summary();

        Ok(ClusterSummary {
            records,
            embedded,
            skipped,
            materialized,
        })
    }
}

/// One image through the capability chain. `Ok(None)` means the
/// detector saw no face; `Err` carries the captured capability
/// failure for diagnostics.
fn embed_one(
    reader: &dyn ImageReader,
    detector: &mut dyn FaceDetector,
    extractor: &dyn EmbeddingExtractor,
    path: &Path,
) -> Result<Option<Vec<f32>>, String> {
    let frame = reader.read(path).map_err(|e| e.to_string())?;
    let Some(face) = detector.detect(&frame).map_err(|e| e.to_string())? else {
        return Ok(None);
    };
    let embedding = extractor.embed(&face).map_err(|e| e.to_string())?;
    Ok(Some(embedding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::Frame;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---
    //
    // Test images are 1x1 frames whose pixel value is the first byte
    // of the file; the stubs key their behavior off that value:
    //   0   → detector reports no face
    //   255 → detector fails (capability error)
    //   else → embedding [value, 0.0]

    struct StubReader;

    impl ImageReader for StubReader {
        fn read(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
            let byte = fs::read(path)?.first().copied().ok_or("empty file")?;
            Ok(Frame::new(vec![byte; 3], 1, 1, 3))
        }
    }

    struct StubDetector;

    impl FaceDetector for StubDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
            match frame.data()[0] {
                0 => Ok(None),
                255 => Err("model choked".into()),
                _ => Ok(Some(frame.clone())),
            }
        }
    }

    struct StubExtractor;

    impl EmbeddingExtractor for StubExtractor {
        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, face: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
            Ok(vec![face.data()[0] as f32, 0.0])
        }
    }

    /// Splits on the first embedding component: < 100 → cluster 0.
    struct ThresholdAssigner;

    impl ClusterAssigner for ThresholdAssigner {
        fn assign(
            &self,
            batch: &EmbeddingBatch,
            _k: usize,
        ) -> Result<Vec<usize>, crate::clustering::domain::cluster_assigner::ClusterError> {
            Ok(batch
                .embeddings()
                .iter()
                .map(|e| usize::from(e[0] >= 100.0))
                .collect())
        }
    }

    struct RecordingLogger {
        skips: Arc<Mutex<Vec<(PathBuf, SkipReason)>>>,
    }

    impl RecordingLogger {
        fn new() -> Self {
            Self {
                skips: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl PipelineLogger for RecordingLogger {
        fn progress(&mut self, _current: usize, _total: usize) {}
        fn skipped(&mut self, path: &Path, reason: &SkipReason) {
            self.skips
                .lock()
                .unwrap()
                .push((path.to_path_buf(), reason.clone()));
        }
        fn info(&mut self, _message: &str) {}
    }

    // --- Helpers ---

    fn make_use_case(logger: Box<dyn PipelineLogger>) -> ClusterFacesUseCase {
        ClusterFacesUseCase::new(
            Box::new(StubReader),
            Box::new(StubDetector),
            Box::new(StubExtractor),
            Box::new(ThresholdAssigner),
            logger,
        )
    }

    fn write_image(dir: &Path, name: &str, value: u8) {
        fs::write(dir.join(name), [value]).unwrap();
    }

    fn count_files(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    // --- Tests ---

    #[test]
    fn test_two_group_scenario_with_one_skip() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("photos");
        let output = tmp.path().join("clusters");
        fs::create_dir_all(&input).unwrap();
        // Two similar faces, one distinct face, one photo with no face
        write_image(&input, "a.jpg", 10);
        write_image(&input, "b.jpg", 20);
        write_image(&input, "c.jpg", 200);
        write_image(&input, "d.jpg", 0);

        let logger = RecordingLogger::new();
        let skips = logger.skips.clone();
        let mut uc = make_use_case(Box::new(logger));
        let summary = uc
            .execute(&input, &output, &ClusterConfig::default())
            .unwrap();

        assert_eq!(summary.embedded, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            count_files(&output.join("cluster_0")) + count_files(&output.join("cluster_1")),
            3
        );
        // The no-face image appears nowhere in the output
        assert!(!output.join("cluster_0").join("d.jpg").exists());
        assert!(!output.join("cluster_1").join("d.jpg").exists());

        let skips = skips.lock().unwrap();
        assert_eq!(skips.len(), 1);
        assert_eq!(skips[0].0, input.join("d.jpg"));
        assert_eq!(skips[0].1, SkipReason::NoFace);
    }

    #[test]
    fn test_records_mark_embedded_and_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("photos");
        let output = tmp.path().join("clusters");
        fs::create_dir_all(&input).unwrap();
        write_image(&input, "face.jpg", 10);
        write_image(&input, "landscape.jpg", 0);

        let mut uc = make_use_case(Box::new(RecordingLogger::new()));
        let summary = uc
            .execute(&input, &output, &ClusterConfig::default())
            .unwrap();

        // Records are in lexicographic enumeration order
        assert_eq!(summary.records[0].path, input.join("face.jpg"));
        assert_eq!(summary.records[0].status, RecordStatus::Embedded);
        assert_eq!(
            summary.records[1].status,
            RecordStatus::Failed(SkipReason::NoFace)
        );
    }

    #[test]
    fn test_capability_error_skips_and_continues() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("photos");
        let output = tmp.path().join("clusters");
        fs::create_dir_all(&input).unwrap();
        write_image(&input, "bad.jpg", 255);
        write_image(&input, "good.jpg", 10);

        let logger = RecordingLogger::new();
        let skips = logger.skips.clone();
        let mut uc = make_use_case(Box::new(logger));
        let summary = uc
            .execute(&input, &output, &ClusterConfig::default())
            .unwrap();

        assert_eq!(summary.embedded, 1);
        let skips = skips.lock().unwrap();
        assert_eq!(skips.len(), 1);
        assert!(matches!(skips[0].1, SkipReason::Processing(ref c) if c.contains("model choked")));
    }

    #[test]
    fn test_unreadable_file_is_processing_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("photos");
        let output = tmp.path().join("clusters");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("empty.jpg"), b"").unwrap(); // StubReader errors
        write_image(&input, "good.jpg", 10);

        let mut uc = make_use_case(Box::new(RecordingLogger::new()));
        let summary = uc
            .execute(&input, &output, &ClusterConfig::default())
            .unwrap();

        assert_eq!(summary.embedded, 1);
        assert!(matches!(
            summary.records[0].status,
            RecordStatus::Failed(SkipReason::Processing(_))
        ));
    }

    #[test]
    fn test_zero_clusters_rejected_before_any_output() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("photos");
        let output = tmp.path().join("clusters");
        fs::create_dir_all(&input).unwrap();
        write_image(&input, "a.jpg", 10);

        let mut uc = make_use_case(Box::new(RecordingLogger::new()));
        let config = ClusterConfig {
            n_clusters: 0,
            ..Default::default()
        };
        let err = uc.execute(&input, &output, &config).unwrap_err();

        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_empty_directory_reports_empty_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("photos");
        let output = tmp.path().join("clusters");
        fs::create_dir_all(&input).unwrap();

        let mut uc = make_use_case(Box::new(RecordingLogger::new()));
        let err = uc
            .execute(&input, &output, &ClusterConfig::default())
            .unwrap_err();

        assert!(matches!(err, PipelineError::EmptyBatch { scanned: 0 }));
        assert!(!output.exists());
    }

    #[test]
    fn test_all_faceless_reports_empty_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("photos");
        let output = tmp.path().join("clusters");
        fs::create_dir_all(&input).unwrap();
        write_image(&input, "a.jpg", 0);
        write_image(&input, "b.jpg", 0);

        let mut uc = make_use_case(Box::new(RecordingLogger::new()));
        let err = uc
            .execute(&input, &output, &ClusterConfig::default())
            .unwrap_err();

        assert!(matches!(err, PipelineError::EmptyBatch { scanned: 2 }));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_input_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut uc = make_use_case(Box::new(RecordingLogger::new()));
        let err = uc
            .execute(
                &tmp.path().join("nope"),
                &tmp.path().join("out"),
                &ClusterConfig::default(),
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::InputDir { .. }));
    }

    #[test]
    fn test_dimension_drift_marks_image_failed() {
        // Extractor whose second call returns a longer vector
        struct DriftingExtractor {
            calls: std::cell::Cell<usize>,
        }

        impl EmbeddingExtractor for DriftingExtractor {
            fn dimension(&self) -> usize {
                2
            }

            fn embed(&self, _face: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
                let n = self.calls.get();
                self.calls.set(n + 1);
                Ok(vec![1.0; 2 + n])
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("photos");
        let output = tmp.path().join("clusters");
        fs::create_dir_all(&input).unwrap();
        write_image(&input, "a.jpg", 10);
        write_image(&input, "b.jpg", 20);

        let mut uc = ClusterFacesUseCase::new(
            Box::new(StubReader),
            Box::new(StubDetector),
            Box::new(DriftingExtractor {
                calls: std::cell::Cell::new(0),
            }),
            Box::new(ThresholdAssigner),
            Box::new(RecordingLogger::new()),
        );
        let summary = uc
            .execute(&input, &output, &ClusterConfig::default())
            .unwrap();

        assert_eq!(summary.embedded, 1);
        assert_eq!(summary.records[0].status, RecordStatus::Embedded);
        assert!(matches!(
            summary.records[1].status,
            RecordStatus::Failed(SkipReason::Processing(_))
        ));
    }

    #[test]
    fn test_end_to_end_with_kmeans() {
        use crate::clustering::infrastructure::kmeans_assigner::KMeansAssigner;

        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("photos");
        let output = tmp.path().join("clusters");
        fs::create_dir_all(&input).unwrap();
        write_image(&input, "a.jpg", 10);
        write_image(&input, "b.jpg", 12);
        write_image(&input, "c.jpg", 200);
        write_image(&input, "d.jpg", 202);

        let mut uc = ClusterFacesUseCase::new(
            Box::new(StubReader),
            Box::new(StubDetector),
            Box::new(StubExtractor),
            Box::new(KMeansAssigner::default()),
            Box::new(RecordingLogger::new()),
        );
        let summary = uc
            .execute(&input, &output, &ClusterConfig::default())
            .unwrap();

        assert_eq!(summary.embedded, 4);
        // The two value-groups must land in different clusters
        let counts = &summary.materialized.placed;
        assert_eq!(counts.iter().sum::<usize>(), 4);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0], 2);
        assert_eq!(counts[1], 2);
    }
}
