use crate::config::{LogFormat, LogLevel, LoggingConfig};
use crate::logging::{init, level_to_log_level, log_level_to_level, parse_log_level};
use tempfile::tempdir;

// The only test that installs the global subscriber. Logs go to a file so the
// rest of the suite stays quiet.
#[test]
fn test_init_file_logging_then_reinit_is_noop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("logs/spanfuse.log");
    let config = LoggingConfig {
        level: LogLevel::Debug,
        format: LogFormat::Development,
        file: Some(path.clone()),
        stderr: false,
    };

    let guard = init(&config).unwrap();
    assert!(guard.is_some());
    assert!(tracing::dispatcher::has_been_set());
    assert!(path.parent().unwrap().is_dir());

    let again = LoggingConfig {
        stderr: true,
        ..config
    };
    assert!(init(&again).unwrap().is_none());
}

#[test]
fn test_disabled_outputs_install_nothing() {
    let config = LoggingConfig {
        stderr: false,
        ..LoggingConfig::default()
    };
    assert!(init(&config).unwrap().is_none());
}

#[test]
fn test_level_conversion() {
    assert!(parse_log_level("trace").is_ok());
    assert!(parse_log_level("DEBUG").is_ok());
    assert!(parse_log_level("info").is_ok());
    assert!(parse_log_level("warn").is_ok());
    assert!(parse_log_level("error").is_ok());
    assert!(parse_log_level("invalid").is_err());

    assert_eq!(level_to_log_level(tracing::Level::TRACE), LogLevel::Trace);
    assert_eq!(level_to_log_level(tracing::Level::DEBUG), LogLevel::Debug);
    assert_eq!(level_to_log_level(tracing::Level::INFO), LogLevel::Info);
    assert_eq!(level_to_log_level(tracing::Level::WARN), LogLevel::Warn);
    assert_eq!(level_to_log_level(tracing::Level::ERROR), LogLevel::Error);

    for level in [LogLevel::Trace, LogLevel::Info, LogLevel::Error] {
        assert_eq!(level_to_log_level(log_level_to_level(level)), level);
    }
}

#[test]
fn test_format_parsing() {
    assert_eq!("dev".parse::<LogFormat>().unwrap(), LogFormat::Development);
    assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
    assert!("xml".parse::<LogFormat>().is_err());
}
