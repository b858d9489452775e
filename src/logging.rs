use std::path::Path;
use std::str::FromStr;

use log::LevelFilter;
use log4rs::{
    append::{console::ConsoleAppender, file::FileAppender},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    Handle,
};

use crate::error::ConfigError;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {h({l:<5})} {M} - {m}{n}";

pub fn parse_level(level: &str) -> Result<LevelFilter, ConfigError> {
    LevelFilter::from_str(level)
        .map_err(|_| ConfigError::Logging(format!("unknown log level '{level}'")))
}

/// Builds the log4rs config for the daemon: console output, plus `log_file`
/// when given.
pub fn logger_config(level: LevelFilter, log_file: Option<&Path>) -> Result<Config, ConfigError> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let mut builder =
        Config::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));
    let mut root = Root::builder().appender("stdout");

    if let Some(path) = log_file {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build(path)?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    builder
        .build(root.build(level))
        .map_err(|err| ConfigError::Logging(err.to_string()))
}

/// Installs the global logger. Only the binary calls this.
pub fn init_logger(level: &str, log_file: Option<&Path>) -> Result<Handle, ConfigError> {
    let config = logger_config(parse_level(level)?, log_file)?;
    log4rs::init_config(config).map_err(|err| ConfigError::Logging(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level("WARN").unwrap(), LevelFilter::Warn);
        assert!(matches!(parse_level("loud"), Err(ConfigError::Logging(_))));
    }

    #[test]
    fn test_config_with_file() {
        let path = std::env::temp_dir().join(format!("failover-log-{}.log", std::process::id()));
        let config = logger_config(LevelFilter::Info, Some(&path)).unwrap();
        assert_eq!(config.appenders().len(), 2);
        assert_eq!(config.root().level(), LevelFilter::Info);
        let _ = std::fs::remove_file(&path);
    }
}
