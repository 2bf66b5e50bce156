use config::{KmerHash, KMER_LENGTH};

pub const ALPHABET_SIZE: KmerHash = 26;

/// Weight of the last symbol of a k-mer, 26^(k-1)
const LAST_SYMBOL_WEIGHT: KmerHash = ALPHABET_SIZE.pow(KMER_LENGTH as u32 - 1);

/// Hash of the k-mer made only of unknown residues
pub const NOISE_KMER_HASH: KmerHash = noise_kmer_hash();

const fn noise_kmer_hash() -> KmerHash {
    let symbol = (b'X' - b'A') as KmerHash;
    let mut hash = 0;
    let mut weight = 1;
    let mut i = 0;
    while i < KMER_LENGTH {
        hash += symbol * weight;
        weight *= ALPHABET_SIZE;
        i += 1;
    }
    hash
}

#[inline(always)]
fn symbol_value(symbol: u8) -> Option<KmerHash> {
    if symbol.is_ascii_uppercase() {
        Some((symbol - b'A') as KmerHash)
    } else {
        None
    }
}

/// Base-26 positional hash, the first symbol has the lowest weight.
/// Returns `None` if the k-mer contains a symbol outside `A..=Z`.
pub fn kmer_hash(kmer: &[u8]) -> Option<KmerHash> {
    debug_assert_eq!(kmer.len(), KMER_LENGTH);
    let mut hash = 0;
    for &symbol in kmer.iter().rev() {
        hash = hash * ALPHABET_SIZE + symbol_value(symbol)?;
    }
    Some(hash)
}

/// Rebuilds the k-mer symbols from a hash
pub fn kmer_from_hash(mut hash: KmerHash) -> [u8; KMER_LENGTH] {
    let mut kmer = [b'A'; KMER_LENGTH];
    for symbol in kmer.iter_mut() {
        *symbol = b'A' + (hash % ALPHABET_SIZE) as u8;
        hash /= ALPHABET_SIZE;
    }
    kmer
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HashedKmer {
    pub offset: usize,
    pub hash: KmerHash,
}

/// Iterates the hashes of all the valid k-mers of a sequence, rolling the hash
/// while consecutive windows are valid.
pub struct KmerHashIterator<'a> {
    sequence: &'a [u8],
    position: usize,
    last_hash: Option<KmerHash>,
    invalid_kmers: usize,
}

impl<'a> KmerHashIterator<'a> {
    pub fn new(sequence: &'a [u8]) -> Self {
        Self {
            sequence,
            position: 0,
            last_hash: None,
            invalid_kmers: 0,
        }
    }

    /// Number of windows skipped so far because of non alphabet symbols
    pub fn invalid_kmers(&self) -> usize {
        self.invalid_kmers
    }
}

impl<'a> Iterator for KmerHashIterator<'a> {
    type Item = HashedKmer;

    fn next(&mut self) -> Option<Self::Item> {
        while self.position + KMER_LENGTH <= self.sequence.len() {
            let offset = self.position;
            self.position += 1;

            let incoming = self.sequence[offset + KMER_LENGTH - 1];
            let hash = match (self.last_hash, symbol_value(incoming)) {
                (Some(previous), Some(value)) => {
                    // The outgoing symbol was validated by the previous window
                    let outgoing = (self.sequence[offset - 1] - b'A') as KmerHash;
                    Some((previous - outgoing) / ALPHABET_SIZE + value * LAST_SYMBOL_WEIGHT)
                }
                (_, None) => None,
                (None, Some(_)) => kmer_hash(&self.sequence[offset..offset + KMER_LENGTH]),
            };

            self.last_hash = hash;
            match hash {
                Some(hash) => return Some(HashedKmer { offset, hash }),
                None => self.invalid_kmers += 1,
            }
        }
        None
    }
}
