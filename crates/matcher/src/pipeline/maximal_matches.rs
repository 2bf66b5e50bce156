use crate::pipeline::{discard_output_on_error, StageOutput};
use anyhow::Context;
use config::{PipelineConfig, MAXIMAL_MATCHES_FILE_PREFIX};
use io::files::{file_size, remove_file_if_exists, stage_file_name};
use io::seed_matches_file::{read_seed_matches, SeedMatchReader, SeedMatchWriter};
use io::{PcpeIoResult, SeedMatch};
use std::cmp::max;
use std::path::{Path, PathBuf};
use utils::{run_tasks, PipelineTask};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ReduceError {
    #[error(
        "a run of contiguous seed matches fills the whole window of {window_records} records, \
         a sort buffer larger than {} bytes is required",
        .window_records * SeedMatch::SIZE
    )]
    RunExceedsWindow { window_records: usize },
}

/// How much of a window can be reduced without looking at the next records
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandleBoundary {
    /// The records before this index can be reduced, the others are carried over
    Complete(usize),
    /// The whole window is a single contiguous run that may continue after it
    Unresolved,
}

/// Finds the prefix of a sorted window whose reduction cannot be affected by
/// the records that follow the window.
///
/// The prefix ends where the trailing sequence pair starts. When the whole
/// window belongs to one pair, it ends where the trailing contiguous run starts.
pub fn find_handle_boundary(window: &[SeedMatch], at_eof: bool) -> HandleBoundary {
    let Some(last) = window.last() else {
        return HandleBoundary::Complete(0);
    };
    if at_eof {
        return HandleBoundary::Complete(window.len());
    }

    let pair_start = window
        .iter()
        .rposition(|record| !record.same_pair(last))
        .map_or(0, |index| index + 1);
    if pair_start > 0 {
        return HandleBoundary::Complete(pair_start);
    }

    // Runs only link consecutive records
    let run_start = window
        .windows(2)
        .rposition(|pair| !pair[0].is_contiguous(&pair[1]))
        .map_or(0, |index| index + 1);
    if run_start > 0 {
        HandleBoundary::Complete(run_start)
    } else {
        HandleBoundary::Unresolved
    }
}

/// Merges every run of consecutive contiguous records into its first record,
/// whose `len` grows by one for each absorbed record.
pub fn reduce_window(
    window: &[SeedMatch],
    mut emit: impl FnMut(SeedMatch) -> PcpeIoResult<()>,
) -> PcpeIoResult<()> {
    let mut index = 0;
    while index < window.len() {
        let mut base = window[index];
        while index + 1 < window.len() && window[index].is_contiguous(&window[index + 1]) {
            base.len += 1;
            index += 1;
        }
        emit(base)?;
        index += 1;
    }
    Ok(())
}

pub fn merge_contiguous_matches(records: &[SeedMatch]) -> Vec<SeedMatch> {
    let mut merged = Vec::with_capacity(records.len());
    // Pushing into a vector cannot fail
    let _ = reduce_window(records, |record| {
        merged.push(record);
        Ok(())
    });
    merged
}

fn reduce_streaming(
    input: &Path,
    writer: &mut SeedMatchWriter,
    window_records: usize,
    io_buffer_size: usize,
) -> anyhow::Result<()> {
    let mut reader = SeedMatchReader::open(input, io_buffer_size)?;
    let mut window = Vec::with_capacity(window_records);

    loop {
        let missing = window_records - window.len();
        reader.read_records(&mut window, missing)?;
        let at_eof = reader.eof();

        match find_handle_boundary(&window, at_eof) {
            HandleBoundary::Complete(end) => {
                reduce_window(&window[..end], |record| writer.write_record(&record))?;
                window.drain(..end);
            }
            HandleBoundary::Unresolved => {
                return Err(ReduceError::RunExceedsWindow { window_records }.into());
            }
        }

        if at_eof && window.is_empty() {
            return Ok(());
        }
    }
}

/// Reduces a sorted seed matches file to its maximal matches.
///
/// Files not larger than `window_bytes` are reduced in a single pass, larger
/// ones through a window of `window_bytes` carried over between reads.
/// Returns false if the input is empty and no output was written.
pub fn reduce_seed_matches_file(
    input: &Path,
    output: &Path,
    window_bytes: usize,
    io_buffer_size: usize,
) -> anyhow::Result<bool> {
    let size = file_size(input)?;
    if size == 0 {
        remove_file_if_exists(output)?;
        return Ok(false);
    }

    let mut writer = SeedMatchWriter::create(output, io_buffer_size)?;
    if size <= window_bytes as u64 {
        let records = read_seed_matches(input)?;
        reduce_window(&records, |record| writer.write_record(&record))?;
    } else {
        let window_records = max(2, window_bytes / SeedMatch::SIZE);
        reduce_streaming(input, &mut writer, window_records, io_buffer_size)?;
    }
    writer.close()?;
    Ok(true)
}

pub struct ReduceSeedsTask {
    input: PathBuf,
    output: PathBuf,
    window_bytes: usize,
    io_buffer_size: usize,
}

impl PipelineTask for ReduceSeedsTask {
    fn name(&self) -> String {
        format!("maximal matches {}", self.input.display())
    }

    fn run(&self) -> anyhow::Result<()> {
        let result = reduce_seed_matches_file(
            &self.input,
            &self.output,
            self.window_bytes,
            self.io_buffer_size,
        )
        .with_context(|| format!("Cannot reduce {}", self.input.display()));
        discard_output_on_error(&self.output, result).map(|_| ())
    }
}

pub fn maximal_matches(inputs: &[PathBuf], run_dir: &Path, config: &PipelineConfig) -> StageOutput {
    let tasks: Vec<_> = inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            Some(ReduceSeedsTask {
                input: input.clone(),
                output: stage_file_name(run_dir, MAXIMAL_MATCHES_FILE_PREFIX, index),
                window_bytes: config.sort_buffer_size,
                io_buffer_size: config.io_buffer_size,
            })
        })
        .collect();

    let summary = run_tasks(&tasks, config.threads_count);
    let outputs = tasks.into_iter().flatten().map(|task| task.output).collect();
    StageOutput::collect(outputs, summary)
}
