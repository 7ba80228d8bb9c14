//! Logging setup for embedding applications and tests.
//!
//! Verbose runs double as an audit trail: storage verdicts, planner
//! decisions, and detector misses all log at debug with their module path,
//! stamped with the elapsed run clock so log lines can be correlated with
//! operation metrics afterwards.

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

static RUN_CLOCK: OnceLock<Instant> = OnceLock::new();

pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let clock = *RUN_CLOCK.get_or_init(Instant::now);

    Builder::from_default_env()
        .filter_level(LevelFilter::Warn) // dependencies: warnings only
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(move |buf, record| {
            let tag = match record.level() {
                Level::Error => "ERROR".red().bold(),
                Level::Warn => "WARN".yellow(),
                Level::Info => "INFO".green(),
                Level::Debug | Level::Trace => "DEBUG".blue(),
            };
            let elapsed = clock.elapsed().as_secs_f64();
            if record.level() >= Level::Debug {
                // audit lines carry the deciding module (detector, planner)
                writeln!(
                    buf,
                    "[{elapsed:>9.3}s {tag} {}] {}",
                    record.target().dimmed(),
                    record.args()
                )
            } else {
                writeln!(buf, "[{elapsed:>9.3}s {tag}] {}", record.args())
            }
        })
        .init();
}
