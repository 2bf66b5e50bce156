use crate::pipeline::{discard_output_on_error, remove_intermediates, StageOutput};
use anyhow::Context;
use config::{PipelineConfig, SORTED_SEED_MATCHES_FILE_PREFIX};
use io::files::{remove_file_if_exists, stage_file_name};
use io::seed_matches_file::{
    read_seed_matches, split_seed_match_file, write_seed_matches, SeedMatchReader,
    SeedMatchWriter,
};
use io::{PcpeIoResult, SeedMatch};
use std::cmp::{max, Ordering, Reverse};
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use utils::{run_tasks, PipelineTask};

const MIN_MERGE_READER_BUFFER: usize = 64 * 1024;

/// The current record of one of the sorted inputs of a k-way merge
struct MergeHead {
    reader: SeedMatchReader,
    head: SeedMatch,
    source: usize,
}

impl MergeHead {
    fn open(path: &Path, buffer_bytes: usize, source: usize) -> PcpeIoResult<Option<Self>> {
        let mut reader = SeedMatchReader::open(path, buffer_bytes)?;
        if reader.eof() {
            return Ok(None);
        }
        let head = reader.read_record()?;
        Ok(Some(Self {
            reader,
            head,
            source,
        }))
    }

    fn head(&self) -> &SeedMatch {
        &self.head
    }

    fn is_exhausted(&self) -> bool {
        self.reader.eof()
    }

    /// Moves to the next record, false once the input is exhausted
    fn advance(&mut self) -> PcpeIoResult<bool> {
        if self.is_exhausted() {
            return Ok(false);
        }
        self.head = self.reader.read_record()?;
        Ok(true)
    }
}

impl PartialEq for MergeHead {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeHead {}

impl PartialOrd for MergeHead {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeHead {
    fn cmp(&self, other: &Self) -> Ordering {
        self.head
            .cmp(&other.head)
            .then(self.source.cmp(&other.source))
    }
}

/// K-way merge of sorted seed matches files, every record is passed to `emit` in order
pub fn merge_sorted_files_with(
    inputs: &[PathBuf],
    io_buffer_size: usize,
    mut emit: impl FnMut(&SeedMatch) -> anyhow::Result<()>,
) -> anyhow::Result<u64> {
    let reader_buffer = max(
        io_buffer_size / max(1, inputs.len()),
        MIN_MERGE_READER_BUFFER,
    );

    let mut heap = BinaryHeap::with_capacity(inputs.len());
    for (source, input) in inputs.iter().enumerate() {
        if let Some(head) = MergeHead::open(input, reader_buffer, source)? {
            heap.push(Reverse(head));
        }
    }

    let mut merged = 0;
    while let Some(Reverse(mut head)) = heap.pop() {
        emit(head.head())?;
        merged += 1;
        if head.advance()? {
            heap.push(Reverse(head));
        }
    }
    Ok(merged)
}

pub fn merge_sorted_files(
    inputs: &[PathBuf],
    output: &Path,
    io_buffer_size: usize,
) -> anyhow::Result<u64> {
    let mut writer = SeedMatchWriter::create(output, io_buffer_size)?;
    let merged = merge_sorted_files_with(inputs, io_buffer_size, |record| {
        writer.write_record(record)?;
        Ok(())
    })?;
    writer.close()?;
    Ok(merged)
}

/// External sort of a single file: parts of at most `sort_buffer_size` bytes
/// are sorted in memory and then merged. Returns false if the input is empty
/// and no output was written.
pub fn sort_seed_matches_file(
    input: &Path,
    output: &Path,
    sort_buffer_size: usize,
    io_buffer_size: usize,
    keep_temp_files: bool,
) -> anyhow::Result<bool> {
    let parts = split_seed_match_file(input, sort_buffer_size)?;

    match parts.as_slice() {
        [] => {
            remove_file_if_exists(output)?;
            Ok(false)
        }
        [single] => {
            let mut records = read_seed_matches(single)?;
            records.sort_unstable();
            write_seed_matches(output, &records)?;
            Ok(true)
        }
        parts => {
            logging::debug!(
                "Merging {} sorted parts of {}",
                parts.len(),
                input.display()
            );
            let result = sort_and_merge_parts(parts, output, io_buffer_size);
            remove_intermediates(parts, keep_temp_files);
            result.map(|_| true)
        }
    }
}

/// Sorts every part in place, then merges them into `output`
fn sort_and_merge_parts(
    parts: &[PathBuf],
    output: &Path,
    io_buffer_size: usize,
) -> anyhow::Result<u64> {
    for part in parts {
        let mut records = read_seed_matches(part)?;
        records.sort_unstable();
        write_seed_matches(part, &records)?;
    }
    merge_sorted_files(parts, output, io_buffer_size)
}

pub struct SortSeedsTask {
    input: PathBuf,
    output: PathBuf,
    sort_buffer_size: usize,
    io_buffer_size: usize,
    keep_temp_files: bool,
}

impl PipelineTask for SortSeedsTask {
    fn name(&self) -> String {
        format!("sort {}", self.input.display())
    }

    fn run(&self) -> anyhow::Result<()> {
        let result = sort_seed_matches_file(
            &self.input,
            &self.output,
            self.sort_buffer_size,
            self.io_buffer_size,
            self.keep_temp_files,
        )
        .with_context(|| format!("Cannot sort {}", self.input.display()));
        discard_output_on_error(&self.output, result).map(|_| ())
    }
}

pub fn seeds_sorting(inputs: &[PathBuf], run_dir: &Path, config: &PipelineConfig) -> StageOutput {
    let tasks: Vec<_> = inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            Some(SortSeedsTask {
                input: input.clone(),
                output: stage_file_name(run_dir, SORTED_SEED_MATCHES_FILE_PREFIX, index),
                sort_buffer_size: config.sort_buffer_size,
                io_buffer_size: config.io_buffer_size,
                keep_temp_files: config.keep_temp_files,
            })
        })
        .collect();

    let summary = run_tasks(&tasks, config.threads_count);
    let outputs = tasks.into_iter().flatten().map(|task| task.output).collect();
    StageOutput::collect(outputs, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn keys(records: &[SeedMatch]) -> Vec<(u32, u32, u32, u32)> {
        records
            .iter()
            .map(|r| (r.x, r.y, r.x_loc, r.y_loc))
            .collect()
    }

    fn fixture() -> Vec<SeedMatch> {
        vec![
            SeedMatch::seed(2, 1, 3, 1),
            SeedMatch::seed(0, 0, 1, 0),
            SeedMatch::seed(1, 1, 2, 0),
            SeedMatch::seed(2, 0, 1, 0),
            SeedMatch::seed(1, 0, 1, 0),
            SeedMatch::seed(2, 1, 2, 0),
        ]
    }

    const SORTED_FIXTURE: [(u32, u32, u32, u32); 6] = [
        (0, 0, 1, 0),
        (1, 0, 1, 0),
        (1, 1, 2, 0),
        (2, 0, 1, 0),
        (2, 1, 2, 0),
        (2, 1, 3, 1),
    ];

    #[test]
    fn sort_in_memory_and_with_small_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("seeds");
        write_seed_matches(&input, &fixture()).unwrap();

        for (name, buffer) in [("large", 1024 * 1024), ("two_records", 2 * SeedMatch::SIZE)] {
            let output = dir.path().join(name);
            assert!(sort_seed_matches_file(&input, &output, buffer, 1024, false).unwrap());
            assert_eq!(keys(&read_seed_matches(&output).unwrap()), SORTED_FIXTURE);
        }

        // Parts are cleaned up, the input is left alone
        assert!(!dir.path().join("seeds_0").exists());
        assert_eq!(read_seed_matches(&input).unwrap().len(), 6);
    }

    #[test]
    fn sort_is_total_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let mut records: Vec<_> = (0..5000)
            .map(|i| {
                SeedMatch::new(
                    rng.gen_range(0..5),
                    rng.gen_range(0..5),
                    rng.gen_range(0..200),
                    i,
                    rng.gen_range(6..20),
                )
            })
            .collect();
        records.shuffle(&mut rng);

        let input = dir.path().join("seeds");
        let sorted = dir.path().join("sorted");
        let resorted = dir.path().join("resorted");
        write_seed_matches(&input, &records).unwrap();

        assert!(sort_seed_matches_file(&input, &sorted, 977 * SeedMatch::SIZE, 4096, false).unwrap());
        let output = read_seed_matches(&sorted).unwrap();
        assert_eq!(output.len(), records.len());
        assert!(output.windows(2).all(|w| w[0] <= w[1]));

        // len travels with its record
        records.sort_unstable();
        let as_tuples = |r: &[SeedMatch]| r.iter().map(|m| m.as_tuple()).collect::<Vec<_>>();
        assert_eq!(as_tuples(&output), as_tuples(&records));

        assert!(sort_seed_matches_file(&sorted, &resorted, 300 * SeedMatch::SIZE, 4096, false).unwrap());
        assert_eq!(
            std::fs::read(&sorted).unwrap(),
            std::fs::read(&resorted).unwrap()
        );
    }

    #[test]
    fn keeps_parts_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("seeds");
        write_seed_matches(&input, &fixture()).unwrap();

        sort_seed_matches_file(&input, &dir.path().join("out"), 4 * SeedMatch::SIZE, 1024, true)
            .unwrap();
        assert!(dir.path().join("seeds_0").exists());
        assert!(dir.path().join("seeds_1").exists());
    }

    #[test]
    fn empty_input_has_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("seeds");
        write_seed_matches(&input, &[]).unwrap();
        let output = dir.path().join("out");
        assert!(!sort_seed_matches_file(&input, &output, 1024, 1024, false).unwrap());
        assert!(!output.exists());
    }

    #[test]
    fn merge_refills_readers() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let mut records: Vec<_> = (0..20_000)
            .map(|i| {
                SeedMatch::new(
                    rng.gen_range(0..20),
                    rng.gen_range(0..20),
                    rng.gen_range(0..1000),
                    i,
                    6,
                )
            })
            .collect();

        let input = dir.path().join("seeds");
        let output = dir.path().join("sorted");
        write_seed_matches(&input, &records).unwrap();

        // Three parts of up to 7000 records, each merge reader holds about 3276
        assert!(sort_seed_matches_file(&input, &output, 7000 * SeedMatch::SIZE, 4096, false).unwrap());
        assert!(!dir.path().join("seeds_0").exists());

        records.sort_unstable();
        let as_tuples = |r: &[SeedMatch]| r.iter().map(|m| m.as_tuple()).collect::<Vec<_>>();
        assert_eq!(as_tuples(&read_seed_matches(&output).unwrap()), as_tuples(&records));
    }

    #[test]
    fn failed_merge_removes_parts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("seeds");
        write_seed_matches(&input, &fixture()).unwrap();

        // The output path is taken by a directory
        let output = dir.path().join("out");
        std::fs::create_dir(&output).unwrap();
        assert!(sort_seed_matches_file(&input, &output, 2 * SeedMatch::SIZE, 1024, false).is_err());
        for index in 0..3 {
            assert!(!dir.path().join(format!("seeds_{}", index)).exists());
        }
    }

    #[test]
    fn merge_skips_empty_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![
            dir.path().join("a"),
            dir.path().join("b"),
            dir.path().join("c"),
        ];
        write_seed_matches(&inputs[0], &[SeedMatch::seed(0, 0, 0, 0), SeedMatch::seed(5, 0, 0, 0)]).unwrap();
        write_seed_matches(&inputs[1], &[]).unwrap();
        write_seed_matches(&inputs[2], &[SeedMatch::seed(1, 0, 0, 0), SeedMatch::seed(2, 0, 0, 0)]).unwrap();

        let mut merged = Vec::new();
        let count = merge_sorted_files_with(&inputs, 1024, |record| {
            merged.push(record.x);
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 4);
        assert_eq!(merged, vec![0, 1, 2, 5]);
    }

    #[test]
    fn stage_sorts_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![dir.path().join("seed_matches.0"), dir.path().join("seed_matches.1")];
        write_seed_matches(&inputs[0], &fixture()).unwrap();
        write_seed_matches(&inputs[1], &[]).unwrap();

        let config = PipelineConfig::default().with_sort_buffer_size(3 * SeedMatch::SIZE);
        let output = seeds_sorting(&inputs, dir.path(), &config);

        assert_eq!(output.summary.completed, 2);
        assert_eq!(output.files, vec![dir.path().join("sorted_seed_matches.0")]);
        assert_eq!(keys(&read_seed_matches(&output.files[0]).unwrap()), SORTED_FIXTURE);
    }
}
