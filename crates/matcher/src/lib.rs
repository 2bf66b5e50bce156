pub mod pipeline;

use anyhow::Context;
use config::PipelineConfig;
use hashes::{kmer_from_hash, NOISE_KMER_HASH};
use io::files::create_dir_all;
use io::sequences::read_sequences;
use logging::PhaseTimesMonitor;
use pipeline::combine::combine_maximal_matches;
use pipeline::kmers_index::kmers_index;
use pipeline::maximal_matches::maximal_matches;
use pipeline::remove_intermediates;
use pipeline::seeds_join::seeds_join;
use pipeline::seeds_sorting::seeds_sorting;
use std::path::{Path, PathBuf};
use utils::TasksSummary;

pub use pipeline::maximal_matches::{HandleBoundary, ReduceError};

/// Per run sub directory of the temporary directory, removed on drop unless
/// intermediate files are kept
struct RunDirectory {
    path: PathBuf,
    keep: bool,
}

impl RunDirectory {
    fn create(temp_dir: &Path, keep: bool) -> anyhow::Result<Self> {
        let path = temp_dir.join(format!("pcpe_run_{}", uuid::Uuid::new_v4()));
        create_dir_all(&path).context("Cannot create the temporary directory")?;
        Ok(Self { path, keep })
    }
}

impl Drop for RunDirectory {
    fn drop(&mut self) {
        if self.keep {
            logging::info!("Intermediate files kept in {}", self.path.display());
        } else if let Err(err) = std::fs::remove_dir_all(&self.path) {
            logging::warn!(
                "Cannot remove temporary directory {}: {}",
                self.path.display(),
                err
            );
        }
    }
}

fn stage_failures(phases: &PhaseTimesMonitor, summary: TasksSummary) -> usize {
    if summary.failed > 0 {
        logging::warn!(
            "{} of {} tasks failed during {}",
            summary.failed,
            summary.completed + summary.failed,
            phases.get_phase_desc()
        );
    }
    summary.failed
}

#[derive(Debug, Clone)]
pub struct MatcherReport {
    pub output: PathBuf,
    pub maximal_matches: u64,
    /// Tasks whose output was dropped, the result misses their matches
    pub failed_tasks: usize,
}

/// Finds all the maximal common substrings between the sequences of `x_input`
/// and the ones of `y_input`, seeded by shared k-mers, and writes them to `output`.
pub fn run_matcher(
    config: &PipelineConfig,
    x_input: &Path,
    y_input: &Path,
    output: &Path,
) -> anyhow::Result<MatcherReport> {
    config.validate().context("Invalid configuration")?;

    let mut phases = PhaseTimesMonitor::new();
    let run_dir = RunDirectory::create(&config.temp_dir, config.keep_temp_files)?;
    let mut failed_tasks = 0;

    if config.skip_noise_kmers {
        logging::info!(
            "Seeds on the {} k-mer are skipped",
            String::from_utf8_lossy(&kmer_from_hash(NOISE_KMER_HASH))
        );
    }

    phases.start_phase("phase: k-mers indexing".to_string());

    let x_sequences = read_sequences(x_input)
        .with_context(|| format!("Cannot read sequences from {}", x_input.display()))?;
    let y_sequences = read_sequences(y_input)
        .with_context(|| format!("Cannot read sequences from {}", y_input.display()))?;
    logging::info!(
        "Loaded {} X sequences and {} Y sequences",
        x_sequences.len(),
        y_sequences.len()
    );

    let x_indexes = kmers_index(&x_sequences, "x", &run_dir.path, config);
    let y_indexes = kmers_index(&y_sequences, "y", &run_dir.path, config);
    failed_tasks += stage_failures(&phases, x_indexes.summary + y_indexes.summary);
    drop(x_sequences);
    drop(y_sequences);

    phases.start_phase("phase: seeds join".to_string());

    let seeds = seeds_join(&x_indexes.files, &y_indexes.files, &run_dir.path, config);
    failed_tasks += stage_failures(&phases, seeds.summary);
    remove_intermediates(&x_indexes.files, config.keep_temp_files);
    remove_intermediates(&y_indexes.files, config.keep_temp_files);
    logging::info!("Seed matches files: {}", seeds.files.len());

    phases.start_phase("phase: seeds sorting".to_string());

    let sorted = seeds_sorting(&seeds.files, &run_dir.path, config);
    failed_tasks += stage_failures(&phases, sorted.summary);
    remove_intermediates(&seeds.files, config.keep_temp_files);

    phases.start_phase("phase: maximal matches".to_string());

    let maximal = maximal_matches(&sorted.files, &run_dir.path, config);
    failed_tasks += stage_failures(&phases, maximal.summary);
    remove_intermediates(&sorted.files, config.keep_temp_files);

    phases.start_phase("phase: combine".to_string());

    let maximal_matches_count = combine_maximal_matches(
        &maximal.files,
        output,
        config.output_format,
        config.io_buffer_size,
    )?;
    remove_intermediates(&maximal.files, config.keep_temp_files);

    if failed_tasks > 0 {
        logging::error!(
            "{} tasks failed, the output misses their matches",
            failed_tasks
        );
    }

    phases.print_stats("Maximal matches search completed.");

    Ok(MatcherReport {
        output: output.to_path_buf(),
        maximal_matches: maximal_matches_count,
        failed_tasks,
    })
}
