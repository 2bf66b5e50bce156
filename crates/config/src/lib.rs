use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub type KmerHash = u32;
pub type SequenceIndex = u32;
pub type SequenceOffset = u32;

/// Length of the k-mers used as match seeds. The hash width is derived from it.
pub const KMER_LENGTH: usize = 6;

/// Size in bytes of one serialized seed match record
pub const SEED_MATCH_RECORD_SIZE: usize = 20;

pub const DEFAULT_IO_BUFFER_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_SORT_BUFFER_SIZE: usize = 100 * 1024 * 1024;
pub const DEFAULT_COMPARE_UNIT_SIZE: usize = 10_000;
pub const DEFAULT_TEMP_DIR: &str = "./temp";

// File name prefixes of the intermediate stages
pub const KMER_INDEX_FILE_PREFIX: &str = "kmer_index";
pub const SEED_MATCHES_FILE_PREFIX: &str = "seed_matches";
pub const SORTED_SEED_MATCHES_FILE_PREFIX: &str = "sorted_seed_matches";
pub const MAXIMAL_MATCHES_FILE_PREFIX: &str = "maximal_matches";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be greater than zero")]
    ZeroValue { name: &'static str },
    #[error("sort buffer of {size} bytes cannot hold two seed match records")]
    SortBufferTooSmall { size: usize },
    #[error("temporary directory path is empty")]
    EmptyTempDir,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// Flat 20 bytes little endian records
    #[default]
    Binary,
    /// One `x y x_loc y_loc len` line for each match
    Text,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Size in bytes of the buffers of each record reader and writer
    pub io_buffer_size: usize,

    /// Number of sequences indexed together in a single k-mer index file
    pub compare_unit_size: usize,

    /// Maximum bytes sorted in memory at once, also used as the window of the maximal matches reducer
    pub sort_buffer_size: usize,

    /// Root directory for the intermediate files
    pub temp_dir: PathBuf,

    /// Number of worker threads for each stage
    pub threads_count: usize,

    /// Keep intermediate files after they have been consumed
    pub keep_temp_files: bool,

    /// Do not index the k-mer made only of unknown residues (`XXXXXX`)
    pub skip_noise_kmers: bool,

    pub output_format: OutputFormat,
}

fn available_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            io_buffer_size: DEFAULT_IO_BUFFER_SIZE,
            compare_unit_size: DEFAULT_COMPARE_UNIT_SIZE,
            sort_buffer_size: DEFAULT_SORT_BUFFER_SIZE,
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            threads_count: available_threads(),
            keep_temp_files: false,
            skip_noise_kmers: false,
            output_format: OutputFormat::Binary,
        }
    }
}

impl PipelineConfig {
    pub fn with_io_buffer_size(mut self, size: usize) -> Self {
        self.io_buffer_size = size;
        self
    }

    pub fn with_compare_unit_size(mut self, size: usize) -> Self {
        self.compare_unit_size = size;
        self
    }

    pub fn with_sort_buffer_size(mut self, size: usize) -> Self {
        self.sort_buffer_size = size;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_threads_count(mut self, threads_count: usize) -> Self {
        self.threads_count = threads_count;
        self
    }

    pub fn with_keep_temp_files(mut self, keep: bool) -> Self {
        self.keep_temp_files = keep;
        self
    }

    pub fn with_skip_noise_kmers(mut self, skip: bool) -> Self {
        self.skip_noise_kmers = skip;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Number of whole records held by the sort buffer
    pub fn sort_buffer_records(&self) -> usize {
        self.sort_buffer_size / SEED_MATCH_RECORD_SIZE
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.io_buffer_size == 0 {
            return Err(ConfigError::ZeroValue {
                name: "io_buffer_size",
            });
        }
        if self.compare_unit_size == 0 {
            return Err(ConfigError::ZeroValue {
                name: "compare_unit_size",
            });
        }
        if self.threads_count == 0 {
            return Err(ConfigError::ZeroValue {
                name: "threads_count",
            });
        }
        if self.sort_buffer_records() < 2 {
            return Err(ConfigError::SortBufferTooSmall {
                size: self.sort_buffer_size,
            });
        }
        if self.temp_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyTempDir);
        }
        Ok(())
    }
}
