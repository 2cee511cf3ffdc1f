use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config as LogConfig, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::errors::ConfigError;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {l} [{t}] {m}{n}";

/// Sets up the global logger from the `[general]` config section. Mirrors the
/// `General{log_path, log_level, log_to_stdout}` fields already present in
/// `config.rs`, the way `main.rs`/`initialization.rs` imply a `logging` module
/// would be wired (the file itself was absent from the teacher repo).
///
/// # Arguments
///
/// * `log_path` - path to the log file
/// * `log_level` - minimum level to record
/// * `log_to_stdout` - whether to also echo log lines to stdout
pub fn setup_logger(
    log_path: &str,
    log_level: LevelFilter,
    log_to_stdout: bool,
) -> Result<(), ConfigError> {
    let file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(log_path)
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    let mut builder = LogConfig::builder().appender(Appender::builder().build("file", Box::new(file)));
    let mut root_appenders = vec!["file".to_string()];

    if log_to_stdout {
        let stdout = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build();
        builder = builder.appender(Appender::builder().build("stdout", Box::new(stdout)));
        root_appenders.push("stdout".to_string());
    }

    let root = Root::builder();
    let root = root_appenders
        .iter()
        .fold(root, |r, name| r.appender(name.clone()))
        .build(log_level);

    let log_config = builder
        .logger(Logger::builder().build("gridplan", log_level))
        .build(root)
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    log4rs::init_config(log_config).map_err(|e| ConfigError::Logging(e.to_string()))?;

    Ok(())
}
