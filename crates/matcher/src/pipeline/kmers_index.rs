use crate::pipeline::{discard_output_on_error, StageOutput};
use anyhow::Context;
use config::{
    KmerHash, PipelineConfig, SequenceIndex, SequenceOffset, KMER_INDEX_FILE_PREFIX,
};
use hashes::{KmerHashIterator, NOISE_KMER_HASH};
use io::files::set_file_name;
use io::hash_index::{HashIndexWriter, KmerOccurrence};
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use utils::{chunk_ranges, run_tasks, PipelineTask};

pub type KmersIndex = BTreeMap<KmerHash, Vec<KmerOccurrence>>;

/// Groups the occurrences of every k-mer of a chunk of sequences by hash.
/// Occurrences keep the insertion order, by sequence then by offset.
pub fn build_kmers_index(
    sequences: &[Vec<u8>],
    first_index: usize,
    skip_noise_kmers: bool,
) -> anyhow::Result<(KmersIndex, usize)> {
    let mut index = KmersIndex::new();
    let mut invalid_kmers = 0;

    for (position, sequence) in sequences.iter().enumerate() {
        let sequence_index = SequenceIndex::try_from(first_index + position)
            .context("Sequence index does not fit in 32 bits")?;

        let mut kmers = KmerHashIterator::new(sequence);
        for kmer in kmers.by_ref() {
            if skip_noise_kmers && kmer.hash == NOISE_KMER_HASH {
                continue;
            }
            let offset = SequenceOffset::try_from(kmer.offset)
                .context("Sequence offset does not fit in 32 bits")?;
            index.entry(kmer.hash).or_default().push(KmerOccurrence {
                sequence: sequence_index,
                offset,
            });
        }
        invalid_kmers += kmers.invalid_kmers();
    }

    Ok((index, invalid_kmers))
}

pub fn write_kmers_index(
    output: &Path,
    index: &KmersIndex,
    io_buffer_size: usize,
) -> anyhow::Result<()> {
    let mut writer = HashIndexWriter::create(output, io_buffer_size)?;
    for (hash, occurrences) in index {
        writer.write_entry(*hash, occurrences)?;
    }
    writer.close()?;
    Ok(())
}

pub struct KmersIndexTask<'a> {
    sequences: &'a [Vec<u8>],
    range: Range<usize>,
    output: PathBuf,
    io_buffer_size: usize,
    skip_noise_kmers: bool,
}

impl KmersIndexTask<'_> {
    fn build(&self) -> anyhow::Result<()> {
        let (index, invalid_kmers) = build_kmers_index(
            &self.sequences[self.range.clone()],
            self.range.start,
            self.skip_noise_kmers,
        )?;

        if invalid_kmers > 0 {
            logging::warn!(
                "Skipped {} k-mers with symbols outside A-Z in sequences {}..{}",
                invalid_kmers,
                self.range.start,
                self.range.end
            );
        }

        write_kmers_index(&self.output, &index, self.io_buffer_size)
            .with_context(|| format!("Cannot write k-mers index {}", self.output.display()))
    }
}

impl PipelineTask for KmersIndexTask<'_> {
    fn name(&self) -> String {
        format!("k-mers index {}", self.output.display())
    }

    fn run(&self) -> anyhow::Result<()> {
        discard_output_on_error(&self.output, self.build())
    }
}

/// Writes one k-mers index file for each chunk of `compare_unit_size` sequences
pub fn kmers_index(
    sequences: &[Vec<u8>],
    set_name: &str,
    run_dir: &Path,
    config: &PipelineConfig,
) -> StageOutput {
    let tasks: Vec<_> = chunk_ranges(sequences.len(), config.compare_unit_size)
        .into_iter()
        .enumerate()
        .map(|(index, range)| {
            Some(KmersIndexTask {
                sequences,
                range,
                output: set_file_name(run_dir, KMER_INDEX_FILE_PREFIX, set_name, index),
                io_buffer_size: config.io_buffer_size,
                skip_noise_kmers: config.skip_noise_kmers,
            })
        })
        .collect();

    let summary = run_tasks(&tasks, config.threads_count);
    let outputs = tasks.into_iter().flatten().map(|task| task.output).collect();
    StageOutput::collect(outputs, summary)
}
