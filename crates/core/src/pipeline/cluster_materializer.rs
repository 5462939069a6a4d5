use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::clustering::domain::embedding_batch::EmbeddingBatch;

/// How to resolve two source images with the same filename landing in
/// the same cluster directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Keep only the last source in enumeration order. Displaced
    /// sources are logged as warnings and not counted as placed.
    Overwrite,
    /// Prefix the destination name with the source's parent directory
    /// name (`<parent>__<file>`), eliminating collisions.
    NamespaceBySource,
}

/// What to do when the output root already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExistingOutput {
    /// Reuse existing cluster directories, adding files to them.
    Append,
    /// Fail if the output root exists and is non-empty.
    Refuse,
}

#[derive(Clone, Debug)]
pub struct MaterializeOptions {
    pub collision: CollisionPolicy,
    pub on_existing: ExistingOutput,
    /// Copy worker threads; `1` copies sequentially.
    pub copy_workers: usize,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            collision: CollisionPolicy::Overwrite,
            on_existing: ExistingOutput::Append,
            copy_workers: 4,
        }
    }
}

/// One source file that could not be copied. Recoverable: remaining
/// copies proceed.
#[derive(Clone, Debug)]
pub struct CopyFailure {
    pub source: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct MaterializeSummary {
    /// Cluster directories created (one per id in `[0, k)`).
    pub clusters: usize,
    /// Images placed per cluster id.
    pub placed: Vec<usize>,
    pub failures: Vec<CopyFailure>,
}

impl MaterializeSummary {
    pub fn total_placed(&self) -> usize {
        self.placed.iter().sum()
    }
}

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("assignment length {assignment} does not match batch length {batch}")]
    LengthMismatch { assignment: usize, batch: usize },
    #[error("cluster id {id} out of range for {clusters} clusters")]
    ClusterIdOutOfRange { id: usize, clusters: usize },
    #[error("output root {path} already exists and is not empty")]
    OutputNotEmpty { path: PathBuf },
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("a copy worker thread panicked")]
    CopyWorker,
}

struct CopyJob {
    source: PathBuf,
    dest: PathBuf,
    cluster: usize,
}

enum CopyOutcome {
    Placed(usize),
    Failed(CopyFailure),
}

/// Realizes a cluster assignment as a physical directory layout:
/// `output_root/cluster_<id>/<filename>` for every batch entry.
///
/// Source files are never deleted or modified. Re-running with the
/// same assignment and batch onto a fresh root reproduces identical
/// directory content.
pub struct ClusterMaterializer {
    options: MaterializeOptions,
}

impl ClusterMaterializer {
    pub fn new(options: MaterializeOptions) -> Self {
        Self { options }
    }

    pub fn materialize(
        &self,
        assignment: &[usize],
        n_clusters: usize,
        batch: &EmbeddingBatch,
        output_root: &Path,
    ) -> Result<MaterializeSummary, MaterializeError> {
        // Validate the assignment before touching the filesystem
        if assignment.len() != batch.len() {
            return Err(MaterializeError::LengthMismatch {
                assignment: assignment.len(),
                batch: batch.len(),
            });
        }
        if let Some(&id) = assignment.iter().find(|&&id| id >= n_clusters) {
            return Err(MaterializeError::ClusterIdOutOfRange {
                id,
                clusters: n_clusters,
            });
        }

        if self.options.on_existing == ExistingOutput::Refuse && dir_is_nonempty(output_root) {
            return Err(MaterializeError::OutputNotEmpty {
                path: output_root.to_path_buf(),
            });
        }

        for id in 0..n_clusters {
            let dir = output_root.join(format!("cluster_{id}"));
            fs::create_dir_all(&dir).map_err(|source| MaterializeError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }

        let jobs = self.build_jobs(assignment, batch, output_root);
        let outcomes = run_copies(jobs, self.options.copy_workers)?;

        let mut placed = vec![0usize; n_clusters];
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                CopyOutcome::Placed(cluster) => placed[cluster] += 1,
                CopyOutcome::Failed(failure) => failures.push(failure),
            }
        }

        Ok(MaterializeSummary {
            clusters: n_clusters,
            placed,
            failures,
        })
    }

    /// Builds one copy job per surviving batch entry. Under
    /// [`CollisionPolicy::Overwrite`], later entries displace earlier
    /// ones targeting the same destination, so the outcome matches
    /// last-write-wins without concurrent writes to one path.
    fn build_jobs(
        &self,
        assignment: &[usize],
        batch: &EmbeddingBatch,
        output_root: &Path,
    ) -> Vec<CopyJob> {
        let mut by_dest: HashMap<PathBuf, CopyJob> = HashMap::new();

        for (index, (_, source)) in batch.iter().enumerate() {
            let cluster = assignment[index];
            let dest = output_root
                .join(format!("cluster_{cluster}"))
                .join(self.dest_name(source));

            if let Some(displaced) = by_dest.insert(
                dest.clone(),
                CopyJob {
                    source: source.to_path_buf(),
                    dest,
                    cluster,
                },
            ) {
                log::warn!(
                    "Filename collision in cluster_{}: {} displaced by a later source",
                    displaced.cluster,
                    displaced.source.display()
                );
            }
        }

        by_dest.into_values().collect()
    }

    fn dest_name(&self, source: &Path) -> std::ffi::OsString {
        let name = source.file_name().unwrap_or_default();
        match self.options.collision {
            CollisionPolicy::Overwrite => name.to_os_string(),
            CollisionPolicy::NamespaceBySource => {
                let parent = source
                    .parent()
                    .and_then(|p| p.file_name())
                    .and_then(|p| p.to_str())
                    .unwrap_or("root");
                let mut namespaced = std::ffi::OsString::from(format!("{parent}__"));
                namespaced.push(name);
                namespaced
            }
        }
    }
}

fn dir_is_nonempty(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Copies are independent per destination, so they fan out over a
/// small worker pool. Failures are reported per file, never
/// propagated as run errors.
fn run_copies(jobs: Vec<CopyJob>, workers: usize) -> Result<Vec<CopyOutcome>, MaterializeError> {
    if workers <= 1 || jobs.len() <= 1 {
        return Ok(jobs.into_iter().map(copy_one).collect());
    }

    let (job_tx, job_rx) = crossbeam_channel::unbounded::<CopyJob>();
    let (out_tx, out_rx) = crossbeam_channel::unbounded::<CopyOutcome>();

    for job in jobs {
        // Receiver outlives this loop, send cannot fail
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let rx = job_rx.clone();
            let tx = out_tx.clone();
            std::thread::spawn(move || {
                for job in rx.iter() {
                    let _ = tx.send(copy_one(job));
                }
            })
        })
        .collect();
    drop(out_tx);
    drop(job_rx);

    let outcomes: Vec<CopyOutcome> = out_rx.iter().collect();
    for handle in handles {
        handle.join().map_err(|_| MaterializeError::CopyWorker)?;
    }

    Ok(outcomes)
}

fn copy_one(job: CopyJob) -> CopyOutcome {
    match fs::copy(&job.source, &job.dest) {
        Ok(_) => CopyOutcome::Placed(job.cluster),
        Err(e) => CopyOutcome::Failed(CopyFailure {
            source: job.source,
            reason: e.to_string(),
        }),
    }
}
