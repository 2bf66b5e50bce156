use crate::errors::{PcpeIoError, PcpeIoResult};
use crate::files::file_size;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use config::{KmerHash, SequenceIndex, SequenceOffset};
use std::cmp::{max, min};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

const ENTRY_HEADER_SIZE: usize = 8;
const OCCURRENCE_SIZE: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KmerOccurrence {
    pub sequence: SequenceIndex,
    pub offset: SequenceOffset,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashIndexEntry {
    pub hash: KmerHash,
    pub occurrences: Vec<KmerOccurrence>,
}

/// The occurrences count is stored as u32
fn entry_count(hash: KmerHash, occurrences: usize) -> PcpeIoResult<u32> {
    occurrences
        .try_into()
        .map_err(|_| PcpeIoError::EntryTooLarge {
            hash,
            count: occurrences,
        })
}

fn encode_entry(
    target: &mut Vec<u8>,
    hash: KmerHash,
    occurrences: &[KmerOccurrence],
) -> PcpeIoResult<()> {
    let count = entry_count(hash, occurrences.len())?;

    let start = target.len();
    target.resize(start + ENTRY_HEADER_SIZE + occurrences.len() * OCCURRENCE_SIZE, 0);
    let entry = &mut target[start..];
    LittleEndian::write_u32(&mut entry[0..4], hash);
    LittleEndian::write_u32(&mut entry[4..8], count);
    for (occurrence, slot) in occurrences
        .iter()
        .zip(entry[ENTRY_HEADER_SIZE..].chunks_exact_mut(OCCURRENCE_SIZE))
    {
        LittleEndian::write_u32(&mut slot[0..4], occurrence.sequence);
        LittleEndian::write_u32(&mut slot[4..8], occurrence.offset);
    }
    Ok(())
}

/// Writes `(hash, count, count * (sequence, offset))` entries.
/// Entries that do not fit the buffer bypass it after flushing what is buffered.
pub struct HashIndexWriter {
    path: PathBuf,
    file: Option<File>,
    buffer: Vec<u8>,
    capacity: usize,
    entries_written: u64,
}

impl HashIndexWriter {
    pub fn create(path: impl AsRef<Path>, buffer_bytes: usize) -> PcpeIoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| PcpeIoError::Open {
            path: path.clone(),
            source,
        })?;
        let capacity = max(buffer_bytes, ENTRY_HEADER_SIZE + OCCURRENCE_SIZE);
        Ok(Self {
            path,
            file: Some(file),
            buffer: Vec::with_capacity(min(capacity, 1024 * 1024)),
            capacity,
            entries_written: 0,
        })
    }

    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    fn flush_buffer(&mut self) -> PcpeIoResult<()> {
        let Some(file) = &mut self.file else {
            return Err(PcpeIoError::WriterClosed {
                path: self.path.clone(),
            });
        };
        file.write_all(&self.buffer)
            .map_err(|source| PcpeIoError::Write {
                path: self.path.clone(),
                source,
            })?;
        self.buffer.clear();
        Ok(())
    }

    pub fn write_entry(&mut self, hash: KmerHash, occurrences: &[KmerOccurrence]) -> PcpeIoResult<()> {
        if self.file.is_none() {
            return Err(PcpeIoError::WriterClosed {
                path: self.path.clone(),
            });
        }
        if occurrences.is_empty() {
            return Ok(());
        }

        let entry_size = ENTRY_HEADER_SIZE + occurrences.len() * OCCURRENCE_SIZE;
        if self.buffer.len() + entry_size > self.capacity {
            self.flush_buffer()?;
        }

        if entry_size > self.capacity {
            let mut direct = Vec::with_capacity(entry_size);
            encode_entry(&mut direct, hash, occurrences)?;
            if let Some(file) = &mut self.file {
                file.write_all(&direct)
                    .map_err(|source| PcpeIoError::Write {
                        path: self.path.clone(),
                        source,
                    })?;
            }
        } else {
            encode_entry(&mut self.buffer, hash, occurrences)?;
        }

        self.entries_written += 1;
        Ok(())
    }

    pub fn close(&mut self) -> PcpeIoResult<()> {
        if self.file.is_some() {
            self.flush_buffer()?;
            self.file = None;
        }
        Ok(())
    }
}

impl Drop for HashIndexWriter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            logging::error!("Error while closing hash index writer: {}", err);
        }
    }
}

/// Streams the entries of a hash index file in file order
pub struct HashIndexReader {
    path: PathBuf,
    reader: BufReader<File>,
    file_size: u64,
    offset: u64,
}

impl HashIndexReader {
    pub fn open(path: impl AsRef<Path>, buffer_bytes: usize) -> PcpeIoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| PcpeIoError::Open {
            path: path.clone(),
            source,
        })?;
        let file_size = file_size(&path)?;
        Ok(Self {
            reader: BufReader::with_capacity(max(buffer_bytes, ENTRY_HEADER_SIZE), file),
            path,
            file_size,
            offset: 0,
        })
    }

    pub fn is_open(&self) -> bool {
        self.offset < self.file_size
    }

    fn truncated(&self) -> PcpeIoError {
        PcpeIoError::TruncatedEntry {
            path: self.path.clone(),
            offset: self.offset,
        }
    }

    fn read_u32(&mut self) -> PcpeIoResult<u32> {
        self.reader
            .read_u32::<LittleEndian>()
            .map_err(|source| PcpeIoError::Read {
                path: self.path.clone(),
                source,
            })
    }

    pub fn next_entry(&mut self) -> PcpeIoResult<Option<HashIndexEntry>> {
        let remaining = self.file_size - self.offset;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < ENTRY_HEADER_SIZE as u64 {
            return Err(self.truncated());
        }

        let hash = self.read_u32()?;
        let count = self.read_u32()? as u64;
        if remaining - (ENTRY_HEADER_SIZE as u64) < count * OCCURRENCE_SIZE as u64 {
            return Err(self.truncated());
        }

        let mut occurrences = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let sequence = self.read_u32()?;
            let offset = self.read_u32()?;
            occurrences.push(KmerOccurrence { sequence, offset });
        }

        self.offset += ENTRY_HEADER_SIZE as u64 + count * OCCURRENCE_SIZE as u64;
        Ok(Some(HashIndexEntry { hash, occurrences }))
    }
}
