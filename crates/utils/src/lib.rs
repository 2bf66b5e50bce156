pub mod scheduler;

use itertools::Itertools;
use std::ops::Range;

pub use scheduler::{run_tasks, PipelineTask, TasksSummary};

/// `0, step, 2 * step, ..., n`, the last step may be shorter
pub fn steps_to_number(n: usize, step: usize) -> Vec<usize> {
    if n == 0 {
        logging::warn!("Splitting an empty range, no chunks produced");
        return Vec::new();
    }
    let step = step.max(1);
    let mut steps: Vec<usize> = (0..n).step_by(step).collect();
    steps.push(n);
    steps
}

/// Contiguous ranges of at most `step` elements covering `0..n`
pub fn chunk_ranges(n: usize, step: usize) -> Vec<Range<usize>> {
    steps_to_number(n, step)
        .into_iter()
        .tuple_windows()
        .map(|(start, end)| start..end)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps() {
        assert_eq!(steps_to_number(10, 3), vec![0, 3, 6, 9, 10]);
        assert_eq!(steps_to_number(9, 3), vec![0, 3, 6, 9]);
        assert_eq!(steps_to_number(2, 5), vec![0, 2]);
        assert_eq!(steps_to_number(3, 0), vec![0, 1, 2, 3]);
        assert!(steps_to_number(0, 4).is_empty());
    }

    #[test]
    fn ranges() {
        assert_eq!(chunk_ranges(10, 4), vec![0..4, 4..8, 8..10]);
        assert_eq!(chunk_ranges(3, 10_000), vec![0..3]);
        assert!(chunk_ranges(0, 10).is_empty());
    }
}
