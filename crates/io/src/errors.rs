use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum PcpeIoError {
    #[error("cannot open {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot read from {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write to {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("size of {path:?} ({size} bytes) is not a multiple of the {record_size} bytes record size")]
    RecordSize {
        path: PathBuf,
        size: u64,
        record_size: usize,
    },
    #[error("read past the end of {path:?}")]
    ReadPastEnd { path: PathBuf },
    #[error("{path:?} ended after {read} of {expected} bytes")]
    UnexpectedEof {
        path: PathBuf,
        read: u64,
        expected: u64,
    },
    #[error("write to the already closed file {path:?}")]
    WriterClosed { path: PathBuf },
    #[error("hash {hash} has {count} occurrences, more than an index entry can hold")]
    EntryTooLarge { hash: u32, count: usize },
    #[error("truncated hash index entry in {path:?} at byte {offset}")]
    TruncatedEntry { path: PathBuf, offset: u64 },
    #[error("malformed sequence file {path:?}: {reason}")]
    SequenceFormat { path: PathBuf, reason: String },
}

pub type PcpeIoResult<T> = Result<T, PcpeIoError>;
