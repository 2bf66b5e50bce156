use crate::errors::{PcpeIoError, PcpeIoResult};
use crate::files::{file_size, part_file_name, remove_file_if_exists};
use crate::structs::seed_match::SeedMatch;
use std::cmp::{max, min};
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

const WRITE_ALL_BUFFER_SIZE: usize = 1024 * 1024;

fn records_capacity(buffer_bytes: usize) -> usize {
    max(1, buffer_bytes / SeedMatch::SIZE)
}

fn check_record_size(path: &Path, size: u64) -> PcpeIoResult<()> {
    if size % SeedMatch::SIZE as u64 != 0 {
        return Err(PcpeIoError::RecordSize {
            path: path.to_path_buf(),
            size,
            record_size: SeedMatch::SIZE,
        });
    }
    Ok(())
}

/// Buffered sequential reader of a seed matches file.
///
/// The file size is measured when the file is opened, the reader stays open
/// while there are either unread bytes in the file or unread records in the buffer.
pub struct SeedMatchReader {
    path: PathBuf,
    file: File,
    file_size: u64,
    bytes_read: u64,
    raw: Vec<u8>,
    records: Vec<SeedMatch>,
    position: usize,
}

impl SeedMatchReader {
    pub fn open(path: impl AsRef<Path>, buffer_bytes: usize) -> PcpeIoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| PcpeIoError::Open {
            path: path.clone(),
            source,
        })?;
        let file_size = file_size(&path)?;
        check_record_size(&path, file_size)?;

        let capacity = min(
            records_capacity(buffer_bytes),
            (file_size / SeedMatch::SIZE as u64) as usize,
        );

        let mut reader = Self {
            path,
            file,
            file_size,
            bytes_read: 0,
            raw: vec![0; capacity * SeedMatch::SIZE],
            records: Vec::with_capacity(capacity),
            position: 0,
        };
        reader.refill()?;
        Ok(reader)
    }

    fn refill(&mut self) -> PcpeIoResult<()> {
        self.records.clear();
        self.position = 0;

        let to_read = min(self.file_size - self.bytes_read, self.raw.len() as u64) as usize;
        if to_read == 0 {
            return Ok(());
        }

        self.file
            .read_exact(&mut self.raw[..to_read])
            .map_err(|source| {
                if source.kind() == ErrorKind::UnexpectedEof {
                    PcpeIoError::UnexpectedEof {
                        path: self.path.clone(),
                        read: self.bytes_read,
                        expected: self.file_size,
                    }
                } else {
                    PcpeIoError::Read {
                        path: self.path.clone(),
                        source,
                    }
                }
            })?;
        self.bytes_read += to_read as u64;

        self.records.extend(
            self.raw[..to_read]
                .chunks_exact(SeedMatch::SIZE)
                .map(SeedMatch::decode),
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn is_open(&self) -> bool {
        self.position < self.records.len() || self.bytes_read < self.file_size
    }

    pub fn eof(&self) -> bool {
        !self.is_open()
    }

    /// The next record, without consuming it
    pub fn peek(&self) -> Option<&SeedMatch> {
        self.records.get(self.position)
    }

    pub fn read_record(&mut self) -> PcpeIoResult<SeedMatch> {
        let Some(record) = self.records.get(self.position).copied() else {
            return Err(PcpeIoError::ReadPastEnd {
                path: self.path.clone(),
            });
        };
        self.position += 1;
        if self.position == self.records.len() && self.bytes_read < self.file_size {
            self.refill()?;
        }
        Ok(record)
    }

    /// Appends up to `count` records to `target`, returns how many were read
    pub fn read_records(&mut self, target: &mut Vec<SeedMatch>, count: usize) -> PcpeIoResult<usize> {
        let mut read = 0;
        while read < count && self.is_open() {
            let available = min(count - read, self.records.len() - self.position);
            target.extend_from_slice(&self.records[self.position..self.position + available]);
            self.position += available;
            read += available;
            if self.position == self.records.len() && self.bytes_read < self.file_size {
                self.refill()?;
            }
        }
        Ok(read)
    }
}

/// Buffered writer of seed match records.
/// Closing is idempotent, dropping an open writer closes it.
pub struct SeedMatchWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    records_written: u64,
}

impl SeedMatchWriter {
    pub fn create(path: impl AsRef<Path>, buffer_bytes: usize) -> PcpeIoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| PcpeIoError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            writer: Some(BufWriter::with_capacity(
                records_capacity(buffer_bytes) * SeedMatch::SIZE,
                file,
            )),
            path,
            records_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn write_record(&mut self, record: &SeedMatch) -> PcpeIoResult<()> {
        let Some(writer) = &mut self.writer else {
            return Err(PcpeIoError::WriterClosed {
                path: self.path.clone(),
            });
        };
        record
            .write_to(writer)
            .map_err(|source| PcpeIoError::Write {
                path: self.path.clone(),
                source,
            })?;
        self.records_written += 1;
        Ok(())
    }

    pub fn write_records<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a SeedMatch>,
    ) -> PcpeIoResult<()> {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    pub fn close(&mut self) -> PcpeIoResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|source| PcpeIoError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl Drop for SeedMatchWriter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            logging::error!("Error while closing seed matches writer: {}", err);
        }
    }
}

pub fn read_seed_matches(path: impl AsRef<Path>) -> PcpeIoResult<Vec<SeedMatch>> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| PcpeIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    check_record_size(path, data.len() as u64)?;
    Ok(data
        .chunks_exact(SeedMatch::SIZE)
        .map(SeedMatch::decode)
        .collect())
}

pub fn write_seed_matches(path: impl AsRef<Path>, records: &[SeedMatch]) -> PcpeIoResult<()> {
    let mut writer = SeedMatchWriter::create(
        path,
        min(WRITE_ALL_BUFFER_SIZE, max(1, records.len()) * SeedMatch::SIZE),
    )?;
    writer.write_records(records)?;
    writer.close()
}

/// Splits a seed matches file into contiguous parts of at most `max_bytes`
/// (rounded down to whole records, at least one record).
///
/// An empty file has no parts, a file that already fits is its own single part,
/// otherwise the parts are written next to it as `<path>_<i>`.
pub fn split_seed_match_file(
    path: impl AsRef<Path>,
    max_bytes: usize,
) -> PcpeIoResult<Vec<PathBuf>> {
    let path = path.as_ref();
    let size = file_size(path)?;
    check_record_size(path, size)?;

    if size == 0 {
        return Ok(Vec::new());
    }

    let part_bytes = (records_capacity(max_bytes) * SeedMatch::SIZE) as u64;
    if size <= part_bytes {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut input = File::open(path).map_err(|source| PcpeIoError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let parts_count = size.div_ceil(part_bytes) as usize;
    let mut parts = Vec::with_capacity(parts_count);

    for index in 0..parts_count {
        let part_path = part_file_name(path, index);
        let expected = min(part_bytes, size - index as u64 * part_bytes);
        if let Err(err) = copy_part(&mut input, path, &part_path, expected) {
            parts.push(part_path);
            for part in &parts {
                if let Err(err) = remove_file_if_exists(part) {
                    logging::warn!("Cannot remove partial split: {}", err);
                }
            }
            return Err(match err {
                PcpeIoError::UnexpectedEof { read, .. } => PcpeIoError::UnexpectedEof {
                    path: path.to_path_buf(),
                    read: index as u64 * part_bytes + read,
                    expected: size,
                },
                err => err,
            });
        }
        parts.push(part_path);
    }

    Ok(parts)
}

/// Copies the next `expected` bytes of `input` into a new part file
fn copy_part(
    input: &mut File,
    path: &Path,
    part_path: &Path,
    expected: u64,
) -> PcpeIoResult<()> {
    let part = File::create(part_path).map_err(|source| PcpeIoError::Open {
        path: part_path.to_path_buf(),
        source,
    })?;
    let mut part = BufWriter::with_capacity(
        min(expected as usize, WRITE_ALL_BUFFER_SIZE),
        part,
    );

    let copied = std::io::copy(&mut input.take(expected), &mut part).map_err(|source| {
        PcpeIoError::Read {
            path: path.to_path_buf(),
            source,
        }
    })?;
    if copied != expected {
        return Err(PcpeIoError::UnexpectedEof {
            path: path.to_path_buf(),
            read: copied,
            expected,
        });
    }
    part.flush().map_err(|source| PcpeIoError::Write {
        path: part_path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn random_records(count: usize, seed: u64) -> Vec<SeedMatch> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                SeedMatch::new(
                    rng.gen_range(0..10),
                    rng.gen_range(0..10),
                    rng.gen(),
                    rng.gen(),
                    rng.gen_range(6..100),
                )
            })
            .collect()
    }

    fn tuples(records: &[SeedMatch]) -> Vec<(u32, u32, u32, u32, u32)> {
        records.iter().map(|r| r.as_tuple()).collect()
    }

    #[test]
    fn reader_with_buffer_smaller_than_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matches");
        let records = random_records(103, 1);

        let mut writer = SeedMatchWriter::create(&path, 3 * SeedMatch::SIZE).unwrap();
        writer.write_records(&records).unwrap();
        assert_eq!(writer.records_written(), 103);
        writer.close().unwrap();

        // Buffer of 7 records, not a divisor of the file length
        let mut reader = SeedMatchReader::open(&path, 7 * SeedMatch::SIZE + 5).unwrap();
        assert_eq!(reader.file_size(), 103 * 20);
        let mut read = Vec::new();
        while reader.is_open() {
            assert_eq!(reader.peek().map(|r| r.as_tuple()), Some(records[read.len()].as_tuple()));
            read.push(reader.read_record().unwrap());
        }
        assert!(reader.eof());
        assert_eq!(tuples(&read), tuples(&records));
        assert!(reader.peek().is_none());
        assert!(matches!(
            reader.read_record(),
            Err(PcpeIoError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn read_records_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matches");
        let records = random_records(50, 2);
        write_seed_matches(&path, &records).unwrap();

        let mut reader = SeedMatchReader::open(&path, 4 * SeedMatch::SIZE).unwrap();
        let mut read = Vec::new();
        assert_eq!(reader.read_records(&mut read, 11).unwrap(), 11);
        assert_eq!(reader.read_records(&mut read, 100).unwrap(), 39);
        assert_eq!(reader.read_records(&mut read, 5).unwrap(), 0);
        assert_eq!(tuples(&read), tuples(&records));
    }

    #[test]
    fn empty_file_is_immediately_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        write_seed_matches(&path, &[]).unwrap();

        let reader = SeedMatchReader::open(&path, 1024).unwrap();
        assert!(reader.eof());
        assert!(read_seed_matches(&path).unwrap().is_empty());
        assert!(split_seed_match_file(&path, 1024).unwrap().is_empty());
    }

    #[test]
    fn rejects_partial_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd");
        std::fs::write(&path, [0u8; 30]).unwrap();

        assert!(matches!(
            SeedMatchReader::open(&path, 1024),
            Err(PcpeIoError::RecordSize { size: 30, .. })
        ));
        assert!(matches!(
            read_seed_matches(&path),
            Err(PcpeIoError::RecordSize { .. })
        ));
    }

    #[test]
    fn file_shrinking_after_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shrinking");
        write_seed_matches(&path, &random_records(10, 3)).unwrap();

        let mut reader = SeedMatchReader::open(&path, 4 * SeedMatch::SIZE).unwrap();
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(5 * SeedMatch::SIZE as u64)
            .unwrap();

        // The first three come from the buffer, the fourth needs a refill
        for _ in 0..3 {
            reader.read_record().unwrap();
        }
        assert!(matches!(
            reader.read_record(),
            Err(PcpeIoError::UnexpectedEof {
                read: 80,
                expected: 200,
                ..
            })
        ));
    }

    #[test]
    fn writer_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("closed");
        let mut writer = SeedMatchWriter::create(&path, 1024).unwrap();
        writer.write_record(&SeedMatch::seed(1, 2, 3, 4)).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(!writer.is_open());
        assert!(matches!(
            writer.write_record(&SeedMatch::seed(1, 2, 3, 5)),
            Err(PcpeIoError::WriterClosed { .. })
        ));
        assert_eq!(read_seed_matches(&path).unwrap().len(), 1);
    }

    #[test]
    fn dropped_writer_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped");
        {
            let mut writer = SeedMatchWriter::create(&path, 1024 * 1024).unwrap();
            writer.write_record(&SeedMatch::seed(9, 8, 7, 6)).unwrap();
        }
        assert_eq!(
            read_seed_matches(&path).unwrap()[0].as_tuple(),
            (9, 8, 7, 6, 6)
        );
    }

    #[test]
    fn split_into_parts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big");
        let records = random_records(25, 3);
        write_seed_matches(&path, &records).unwrap();

        // Fits in a single part
        assert_eq!(split_seed_match_file(&path, 25 * 20).unwrap(), vec![path.clone()]);

        // 10 records per part, the limit is rounded down to whole records
        let parts = split_seed_match_file(&path, 10 * 20 + 19).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], dir.path().join("big_2"));

        let mut joined = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            let part_records = read_seed_matches(part).unwrap();
            assert_eq!(part_records.len(), if index < 2 { 10 } else { 5 });
            joined.extend(part_records);
        }
        assert_eq!(tuples(&joined), tuples(&records));

        // Limits below one record still make progress
        assert_eq!(split_seed_match_file(&path, 1).unwrap().len(), 25);
    }

    #[test]
    fn failed_split_removes_its_parts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big");
        write_seed_matches(&path, &random_records(25, 4)).unwrap();

        // The second part cannot be created
        std::fs::create_dir(dir.path().join("big_1")).unwrap();
        assert!(matches!(
            split_seed_match_file(&path, 10 * 20),
            Err(PcpeIoError::Open { .. })
        ));
        assert!(!dir.path().join("big_0").exists());
        assert!(!dir.path().join("big_2").exists());
        assert_eq!(read_seed_matches(&path).unwrap().len(), 25);
    }
}
