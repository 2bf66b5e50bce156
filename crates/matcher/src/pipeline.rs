pub mod combine;
pub mod kmers_index;
pub mod maximal_matches;
pub mod seeds_join;
pub mod seeds_sorting;

use io::files::{is_non_empty_file, remove_file_if_exists};
use std::path::{Path, PathBuf};
use utils::TasksSummary;

/// Files produced by a stage, only the ones that can contribute to the result
pub struct StageOutput {
    pub files: Vec<PathBuf>,
    pub summary: TasksSummary,
}

impl StageOutput {
    pub(crate) fn collect(outputs: Vec<PathBuf>, summary: TasksSummary) -> Self {
        Self {
            files: outputs.into_iter().filter(|path| is_non_empty_file(path)).collect(),
            summary,
        }
    }
}

/// A failed task must not leave a partial output behind
pub(crate) fn discard_output_on_error<T>(
    output: &Path,
    result: anyhow::Result<T>,
) -> anyhow::Result<T> {
    if result.is_err() {
        if let Err(err) = remove_file_if_exists(output) {
            logging::warn!("Cannot remove partial output: {}", err);
        }
    }
    result
}

pub(crate) fn remove_intermediates(files: &[PathBuf], keep_temp_files: bool) {
    if keep_temp_files {
        return;
    }
    for file in files {
        if let Err(err) = remove_file_if_exists(file) {
            logging::warn!("Cannot remove intermediate file: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_keeps_non_empty_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join("seed_matches.0");
        let empty = dir.path().join("seed_matches.1");
        std::fs::write(&full, [0u8; 20]).unwrap();
        std::fs::write(&empty, b"").unwrap();

        let output = StageOutput::collect(
            vec![full.clone(), empty, dir.path().join("seed_matches.2")],
            TasksSummary::default(),
        );
        assert_eq!(output.files, vec![full]);
    }

    #[test]
    fn failed_task_output_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("maximal_matches.0");
        std::fs::write(&output, [0u8; 20]).unwrap();

        assert!(discard_output_on_error(&output, Ok(())).is_ok());
        assert!(output.exists());
        let failed: anyhow::Result<()> = Err(anyhow::anyhow!("reduce failed"));
        assert!(discard_output_on_error(&output, failed).is_err());
        assert!(!output.exists());
    }
}
