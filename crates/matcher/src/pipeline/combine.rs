use crate::pipeline::discard_output_on_error;
use crate::pipeline::seeds_sorting::{merge_sorted_files, merge_sorted_files_with};
use anyhow::Context;
use config::OutputFormat;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

fn write_text_output(
    inputs: &[PathBuf],
    output: &Path,
    io_buffer_size: usize,
) -> anyhow::Result<u64> {
    let file = File::create(output)
        .with_context(|| format!("Cannot create output file {}", output.display()))?;
    let mut writer = BufWriter::with_capacity(io_buffer_size, file);

    let written = merge_sorted_files_with(inputs, io_buffer_size, |record| {
        writeln!(writer, "{}", record)?;
        Ok(())
    })?;
    writer.flush()?;
    Ok(written)
}

/// Gathers the maximal matches of every task into the final output, globally sorted.
/// An empty input list produces an empty output file, a failure leaves none.
pub fn combine_maximal_matches(
    inputs: &[PathBuf],
    output: &Path,
    format: OutputFormat,
    io_buffer_size: usize,
) -> anyhow::Result<u64> {
    let result = match format {
        OutputFormat::Binary => merge_sorted_files(inputs, output, io_buffer_size)
            .with_context(|| format!("Cannot write output file {}", output.display())),
        OutputFormat::Text => write_text_output(inputs, output, io_buffer_size),
    };
    let written = discard_output_on_error(output, result)?;
    logging::info!(
        "Written {} maximal matches to {}",
        written,
        output.display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use io::seed_matches_file::{read_seed_matches, write_seed_matches};
    use io::SeedMatch;

    fn inputs(dir: &Path) -> Vec<PathBuf> {
        let files = vec![dir.join("maximal_matches.0"), dir.join("maximal_matches.1")];
        write_seed_matches(
            &files[0],
            &[SeedMatch::new(0, 0, 1, 0, 6), SeedMatch::new(2, 1, 2, 0, 7)],
        )
        .unwrap();
        write_seed_matches(&files[1], &[SeedMatch::new(1, 1, 2, 0, 6)]).unwrap();
        files
    }

    #[test]
    fn binary_output_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("result.bin");
        let written =
            combine_maximal_matches(&inputs(dir.path()), &output, OutputFormat::Binary, 1024)
                .unwrap();
        assert_eq!(written, 3);

        let records: Vec<_> = read_seed_matches(&output)
            .unwrap()
            .iter()
            .map(|r| r.as_tuple())
            .collect();
        assert_eq!(
            records,
            vec![(0, 0, 1, 0, 6), (1, 1, 2, 0, 6), (2, 1, 2, 0, 7)]
        );
    }

    #[test]
    fn text_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("result.txt");
        combine_maximal_matches(&inputs(dir.path()), &output, OutputFormat::Text, 1024).unwrap();
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "0 0 1 0 6\n1 1 2 0 6\n2 1 2 0 7\n"
        );
    }

    #[test]
    fn unreadable_input_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = inputs(dir.path());
        let corrupt = dir.path().join("maximal_matches.2");
        std::fs::write(&corrupt, [0u8; 30]).unwrap();
        files.push(corrupt);

        for format in [OutputFormat::Binary, OutputFormat::Text] {
            let output = dir.path().join("result");
            assert!(combine_maximal_matches(&files, &output, format, 1024).is_err());
            assert!(!output.exists());
        }
    }

    #[test]
    fn no_matches_gives_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        for format in [OutputFormat::Binary, OutputFormat::Text] {
            let output = dir.path().join("empty");
            assert_eq!(combine_maximal_matches(&[], &output, format, 1024).unwrap(), 0);
            assert_eq!(std::fs::metadata(&output).unwrap().len(), 0);
        }
    }
}
