use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use config::{SequenceIndex, SequenceOffset, KMER_LENGTH, SEED_MATCH_RECORD_SIZE};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::io::Write;

/// A position pair where a sequence of X and a sequence of Y share a substring.
///
/// Ordering and equality only look at `(x, y, x_loc, y_loc)`: `len` is a
/// payload that the maximal matches reducer grows while merging seeds.
#[derive(Copy, Clone, Debug, Default)]
pub struct SeedMatch {
    pub x: SequenceIndex,
    pub y: SequenceIndex,
    pub x_loc: SequenceOffset,
    pub y_loc: SequenceOffset,
    pub len: u32,
}

impl SeedMatch {
    pub const SIZE: usize = SEED_MATCH_RECORD_SIZE;

    pub const fn new(
        x: SequenceIndex,
        y: SequenceIndex,
        x_loc: SequenceOffset,
        y_loc: SequenceOffset,
        len: u32,
    ) -> Self {
        Self {
            x,
            y,
            x_loc,
            y_loc,
            len,
        }
    }

    /// A freshly joined k-mer match
    pub const fn seed(
        x: SequenceIndex,
        y: SequenceIndex,
        x_loc: SequenceOffset,
        y_loc: SequenceOffset,
    ) -> Self {
        Self::new(x, y, x_loc, y_loc, KMER_LENGTH as u32)
    }

    #[inline(always)]
    fn key(&self) -> (u32, u32, u32, u32) {
        (self.x, self.y, self.x_loc, self.y_loc)
    }

    #[inline(always)]
    pub fn same_pair(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }

    /// Both offsets differ by exactly one on the same sequence pair
    #[inline(always)]
    pub fn is_contiguous(&self, other: &Self) -> bool {
        self.same_pair(other)
            && self.x_loc.abs_diff(other.x_loc) == 1
            && self.y_loc.abs_diff(other.y_loc) == 1
    }

    #[inline(always)]
    pub fn encode(&self, buffer: &mut [u8]) {
        LittleEndian::write_u32(&mut buffer[0..4], self.x);
        LittleEndian::write_u32(&mut buffer[4..8], self.y);
        LittleEndian::write_u32(&mut buffer[8..12], self.x_loc);
        LittleEndian::write_u32(&mut buffer[12..16], self.y_loc);
        LittleEndian::write_u32(&mut buffer[16..20], self.len);
    }

    #[inline(always)]
    pub fn decode(buffer: &[u8]) -> Self {
        Self {
            x: LittleEndian::read_u32(&buffer[0..4]),
            y: LittleEndian::read_u32(&buffer[4..8]),
            x_loc: LittleEndian::read_u32(&buffer[8..12]),
            y_loc: LittleEndian::read_u32(&buffer[12..16]),
            len: LittleEndian::read_u32(&buffer[16..20]),
        }
    }

    pub fn write_to(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_u32::<LittleEndian>(self.x)?;
        writer.write_u32::<LittleEndian>(self.y)?;
        writer.write_u32::<LittleEndian>(self.x_loc)?;
        writer.write_u32::<LittleEndian>(self.y_loc)?;
        writer.write_u32::<LittleEndian>(self.len)
    }

    /// All the fields, `len` included
    pub fn as_tuple(&self) -> (u32, u32, u32, u32, u32) {
        (self.x, self.y, self.x_loc, self.y_loc, self.len)
    }
}

impl PartialEq for SeedMatch {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for SeedMatch {}

impl PartialOrd for SeedMatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SeedMatch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Display for SeedMatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.x, self.y, self.x_loc, self.y_loc, self.len
        )
    }
}
