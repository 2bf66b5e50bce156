use crate::pipeline::{discard_output_on_error, StageOutput};
use anyhow::Context;
use config::{PipelineConfig, SEED_MATCHES_FILE_PREFIX};
use io::files::{is_non_empty_file, stage_file_name};
use io::hash_index::HashIndexReader;
use io::seed_matches_file::SeedMatchWriter;
use io::SeedMatch;
use itertools::iproduct;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use utils::{run_tasks, PipelineTask};

/// Merge-joins two k-mers index files sorted by hash.
/// Every pair of occurrences sharing a hash becomes a seed match, X major.
/// Returns the number of seed matches written.
pub fn join_kmers_indexes(
    x_index: &Path,
    y_index: &Path,
    output: &Path,
    io_buffer_size: usize,
) -> anyhow::Result<u64> {
    let mut x_reader = HashIndexReader::open(x_index, io_buffer_size)?;
    let mut y_reader = HashIndexReader::open(y_index, io_buffer_size)?;
    let mut writer = SeedMatchWriter::create(output, io_buffer_size)?;

    let mut x_entry = x_reader.next_entry()?;
    let mut y_entry = y_reader.next_entry()?;

    loop {
        let (Some(x), Some(y)) = (x_entry.as_ref(), y_entry.as_ref()) else {
            break;
        };

        match x.hash.cmp(&y.hash) {
            Ordering::Less => x_entry = x_reader.next_entry()?,
            Ordering::Greater => y_entry = y_reader.next_entry()?,
            Ordering::Equal => {
                for (x_occurrence, y_occurrence) in iproduct!(&x.occurrences, &y.occurrences) {
                    writer.write_record(&SeedMatch::seed(
                        x_occurrence.sequence,
                        y_occurrence.sequence,
                        x_occurrence.offset,
                        y_occurrence.offset,
                    ))?;
                }
                x_entry = x_reader.next_entry()?;
                y_entry = y_reader.next_entry()?;
            }
        }
    }

    writer.close()?;
    Ok(writer.records_written())
}

pub struct SeedsJoinTask {
    x_index: PathBuf,
    y_index: PathBuf,
    output: PathBuf,
    io_buffer_size: usize,
}

impl PipelineTask for SeedsJoinTask {
    fn name(&self) -> String {
        format!(
            "seeds join {} x {}",
            self.x_index.display(),
            self.y_index.display()
        )
    }

    fn run(&self) -> anyhow::Result<()> {
        if !is_non_empty_file(&self.x_index) || !is_non_empty_file(&self.y_index) {
            logging::debug!("Skipping {}, one of the indexes is empty", self.name());
            return Ok(());
        }

        let result = join_kmers_indexes(
            &self.x_index,
            &self.y_index,
            &self.output,
            self.io_buffer_size,
        )
        .with_context(|| format!("Cannot join into {}", self.output.display()));

        discard_output_on_error(&self.output, result).map(|matches| {
            logging::debug!("{} produced {} seed matches", self.name(), matches);
        })
    }
}

/// Joins every X index file with every Y index file
pub fn seeds_join(
    x_indexes: &[PathBuf],
    y_indexes: &[PathBuf],
    run_dir: &Path,
    config: &PipelineConfig,
) -> StageOutput {
    let tasks: Vec<_> = iproduct!(x_indexes, y_indexes)
        .enumerate()
        .map(|(index, (x_index, y_index))| {
            Some(SeedsJoinTask {
                x_index: x_index.clone(),
                y_index: y_index.clone(),
                output: stage_file_name(run_dir, SEED_MATCHES_FILE_PREFIX, index),
                io_buffer_size: config.io_buffer_size,
            })
        })
        .collect();

    let summary = run_tasks(&tasks, config.threads_count);
    let outputs = tasks.into_iter().flatten().map(|task| task.output).collect();
    StageOutput::collect(outputs, summary)
}
