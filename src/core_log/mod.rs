use colored::*;
use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

/// Initializes the logger with a custom format and colors.
///
/// `RUST_LOG` takes precedence over the default `info` filter; `verbose`
/// forces debug output regardless.
pub fn init_logger(verbose: bool) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }

    builder
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            let level = match record.level() {
                log::Level::Error => record.level().to_string().red(),
                log::Level::Warn => record.level().to_string().yellow(),
                log::Level::Info => record.level().to_string().green(),
                log::Level::Debug => record.level().to_string().blue(),
                log::Level::Trace => record.level().to_string().white(),
            };
            writeln!(buf, "[{}] [{}] {}", timestamp, level, record.args())
        })
        .init();
}
