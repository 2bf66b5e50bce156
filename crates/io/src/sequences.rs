use crate::errors::{PcpeIoError, PcpeIoResult};
use std::path::Path;

fn parse_number(path: &Path, token: Option<&[u8]>, what: &str) -> PcpeIoResult<usize> {
    let token = token.ok_or_else(|| PcpeIoError::SequenceFormat {
        path: path.to_path_buf(),
        reason: format!("missing {}", what),
    })?;
    std::str::from_utf8(token)
        .ok()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| PcpeIoError::SequenceFormat {
            path: path.to_path_buf(),
            reason: format!("invalid {} '{}'", what, String::from_utf8_lossy(token)),
        })
}

/// Parses the whitespace delimited `count (length sequence)*` text format.
/// The declared lengths are not trusted, the sequence tokens are.
pub fn parse_sequences(path: &Path, data: &[u8]) -> PcpeIoResult<Vec<Vec<u8>>> {
    let mut tokens = data
        .split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty());

    let count = parse_number(path, tokens.next(), "sequences count")?;
    let mut sequences = Vec::with_capacity(count);
    let mut wrong_lengths = 0;

    for index in 0..count {
        let declared = parse_number(path, tokens.next(), &format!("length of sequence {}", index))?;
        let sequence = tokens.next().ok_or_else(|| PcpeIoError::SequenceFormat {
            path: path.to_path_buf(),
            reason: format!("expected {} sequences, found {}", count, index),
        })?;
        if declared != sequence.len() {
            wrong_lengths += 1;
        }
        sequences.push(sequence.to_vec());
    }

    if wrong_lengths > 0 {
        logging::debug!(
            "{} sequences of {} have a declared length different from the actual one",
            wrong_lengths,
            path.display()
        );
    }
    if tokens.next().is_some() {
        logging::warn!(
            "Ignoring trailing data after {} sequences in {}",
            count,
            path.display()
        );
    }

    Ok(sequences)
}

pub fn read_sequences(path: impl AsRef<Path>) -> PcpeIoResult<Vec<Vec<u8>>> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| PcpeIoError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_sequences(path, &data)
}
