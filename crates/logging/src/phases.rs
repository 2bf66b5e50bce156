use std::time::{Duration, Instant};

use crate::{log, MessageLevel};

pub struct PhaseResult {
    pub name: String,
    pub time: Duration,
}

/// Tracks the wallclock time of the sequential phases of a run.
/// Starting a phase implicitly ends the previous one.
pub struct PhaseTimesMonitor {
    timer: Instant,
    phase: Option<(String, Instant)>,
    results: Vec<PhaseResult>,
}

impl Default for PhaseTimesMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTimesMonitor {
    pub fn new() -> Self {
        Self {
            timer: Instant::now(),
            phase: None,
            results: Vec::new(),
        }
    }

    pub fn get_wallclock(&self) -> Duration {
        self.timer.elapsed()
    }

    pub fn get_phase_desc(&self) -> String {
        self.phase
            .as_ref()
            .map(|x| x.0.clone())
            .unwrap_or_default()
    }

    pub fn results(&self) -> &[PhaseResult] {
        &self.results
    }

    fn end_phase(&mut self) {
        if let Some((name, phase_timer)) = self.phase.take() {
            let elapsed = phase_timer.elapsed();
            log(
                MessageLevel::Info,
                &format!(
                    "Finished {}. phase duration: {:.2?} gtime: {:.2?}",
                    name,
                    &elapsed,
                    self.get_wallclock()
                ),
            );
            self.results.push(PhaseResult {
                name,
                time: elapsed,
            })
        }
    }

    pub fn start_phase(&mut self, name: String) {
        self.end_phase();
        log(MessageLevel::Info, &format!("Started {}", name));
        self.phase = Some((name, Instant::now()));
    }

    pub fn print_stats(&mut self, end_message: &str) {
        self.end_phase();

        log(MessageLevel::Info, end_message);
        log(
            MessageLevel::Info,
            &format!("TOTAL TIME: {:.2?}", self.get_wallclock()),
        );
        for PhaseResult { name, time } in self.results.iter() {
            log(MessageLevel::Info, &format!("\t{} \t=> {:.2?}", name, time));
        }
    }
}
