use anyhow::Context;
use backtrace::Backtrace;
use config::{
    OutputFormat, PipelineConfig, DEFAULT_COMPARE_UNIT_SIZE, DEFAULT_IO_BUFFER_SIZE,
    DEFAULT_SORT_BUFFER_SIZE,
};
use logging::{MessageLevel, UnrecoverableErrorLogging};
use std::io::Write;
use std::panic;
use std::path::PathBuf;
use std::process::exit;
use structopt::StructOpt;

fn parse_log_level(level: &str) -> Result<MessageLevel, String> {
    MessageLevel::from_name(level)
        .ok_or_else(|| format!("unknown log level '{}', use debug, info, warning or error", level))
}

#[derive(StructOpt, Debug)]
#[structopt(
    name = "pcpe",
    about = "Finds the maximal common substrings between two sets of sequences"
)]
struct MatcherArgs {
    /// The first set of sequences (X)
    x_input: PathBuf,

    /// The second set of sequences (Y)
    y_input: PathBuf,

    #[structopt(short = "o", long = "output-file", default_value = "maximal_matches.bin")]
    output_file: PathBuf,

    /// Directory for temporary files
    #[structopt(short = "t", long = "temp-dir", default_value = "./temp")]
    temp_dir: PathBuf,

    /// Worker threads for each stage (default: available parallelism)
    #[structopt(short = "j", long = "threads-count")]
    threads_count: Option<usize>,

    /// Buffer size in bytes of each file reader and writer
    #[structopt(long = "io-buffer-size")]
    io_buffer_size: Option<usize>,

    /// Bytes sorted in memory at once, also the window of the maximal matches reduction
    #[structopt(long = "sort-buffer-size")]
    sort_buffer_size: Option<usize>,

    /// Sequences indexed together in each k-mers index file
    #[structopt(long = "compare-unit-size")]
    compare_unit_size: Option<usize>,

    /// Keep intermediate temporary files for debugging purposes
    #[structopt(long = "keep-temp-files")]
    keep_temp_files: bool,

    /// Do not use the XXXXXX k-mer as a seed
    #[structopt(long = "skip-noise-kmers")]
    skip_noise_kmers: bool,

    /// Write `x y x_loc y_loc len` lines instead of binary records
    #[structopt(long = "text-output")]
    text_output: bool,

    /// Also append every message to this file
    #[structopt(long = "log-file")]
    log_file: Option<PathBuf>,

    #[structopt(long = "log-level", default_value = "info", parse(try_from_str = parse_log_level))]
    log_level: MessageLevel,
}

impl MatcherArgs {
    fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default()
            .with_temp_dir(&self.temp_dir)
            .with_io_buffer_size(self.io_buffer_size.unwrap_or(DEFAULT_IO_BUFFER_SIZE))
            .with_sort_buffer_size(self.sort_buffer_size.unwrap_or(DEFAULT_SORT_BUFFER_SIZE))
            .with_compare_unit_size(self.compare_unit_size.unwrap_or(DEFAULT_COMPARE_UNIT_SIZE))
            .with_keep_temp_files(self.keep_temp_files)
            .with_skip_noise_kmers(self.skip_noise_kmers)
            .with_output_format(if self.text_output {
                OutputFormat::Text
            } else {
                OutputFormat::Binary
            });
        if let Some(threads_count) = self.threads_count {
            config = config.with_threads_count(threads_count);
        }
        config
    }
}

fn run(args: MatcherArgs) -> anyhow::Result<()> {
    logging::set_min_level(args.log_level);
    if let Some(log_file) = &args.log_file {
        logging::setup_logging_file(log_file)
            .with_context(|| format!("Cannot open log file {}", log_file.display()))?;
    }

    let config = args.pipeline_config();
    if logging::min_level() == MessageLevel::Debug {
        logging::debug!("Configuration: {}", serde_json::to_string(&config)?);
    }

    let report = matcher::run_matcher(&config, &args.x_input, &args.y_input, &args.output_file)?;
    if report.failed_tasks > 0 {
        anyhow::bail!(
            "{} tasks failed, {} is incomplete",
            report.failed_tasks,
            report.output.display()
        );
    }
    Ok(())
}

fn main() {
    let args = MatcherArgs::from_args();

    // Worker panics are caught by the scheduler, only report them
    panic::set_hook(Box::new(move |info| {
        let stderr = std::io::stderr();
        let mut err_lock = stderr.lock();

        if let Some(location) = info.location() {
            let _ = writeln!(err_lock, "Thread panicked at location: {}", location);
        }
        if let Some(s) = info.payload().downcast_ref::<&str>() {
            let _ = writeln!(err_lock, "Panic payload: {:?}", s);
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            let _ = writeln!(err_lock, "Panic payload: {:?}", s);
        }
        let _ = writeln!(err_lock, "Backtrace: {:?}", Backtrace::new());
    }));

    if run(args).log_unrecoverable_error("pcpe failed").is_err() {
        exit(1);
    }
}
