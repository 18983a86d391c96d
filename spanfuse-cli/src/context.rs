use spanfuse::config::{ConfigLoader, LogFormat, LogLevel, SpanfuseConfig};
use std::path::{Path, PathBuf};

/// How results and errors are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Options that shape logging, taken from the global flags.
#[derive(Debug, Clone, Default)]
pub struct LogOverrides {
    pub verbose: bool,
    pub quiet: bool,
    pub format: Option<LogFormat>,
}

pub struct CliContext {
    pub config: SpanfuseConfig,
    pub config_path: Option<PathBuf>,
    pub output_format: OutputFormat,
}

impl CliContext {
    /// Load configuration from `path`, or from the default locations, then
    /// the environment.
    pub fn load(
        path: Option<&Path>,
        overrides: &LogOverrides,
        output_format: OutputFormat,
    ) -> spanfuse::Result<Self> {
        let mut loader = ConfigLoader::new();
        match path {
            Some(path) => {
                loader.load_file(path)?;
            }
            None => {
                loader.load_default_files();
            }
        }
        loader.load_env();

        let mut config = loader.extract()?;
        apply_log_overrides(&mut config, overrides, output_format);

        Ok(Self {
            config,
            config_path: loader.loaded_from().map(Path::to_path_buf),
            output_format,
        })
    }
}

/// `--quiet` wins over `--verbose`. JSON output keeps stderr to errors only.
pub fn apply_log_overrides(
    config: &mut SpanfuseConfig,
    overrides: &LogOverrides,
    output_format: OutputFormat,
) {
    if overrides.quiet || output_format == OutputFormat::Json {
        config.logging.level = LogLevel::Error;
    } else if overrides.verbose {
        config.logging.level = LogLevel::Debug;
    }
    if let Some(format) = overrides.format {
        config.logging.format = format;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_verbose() {
        let mut config = SpanfuseConfig::default();
        let overrides = LogOverrides {
            verbose: true,
            quiet: true,
            format: Some(LogFormat::Compact),
        };
        apply_log_overrides(&mut config, &overrides, OutputFormat::Text);
        assert_eq!(config.logging.level, LogLevel::Error);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn verbose_enables_debug() {
        let mut config = SpanfuseConfig::default();
        let overrides = LogOverrides {
            verbose: true,
            ..LogOverrides::default()
        };
        apply_log_overrides(&mut config, &overrides, OutputFormat::Text);
        assert_eq!(config.logging.level, LogLevel::Debug);

        let mut config = SpanfuseConfig::default();
        apply_log_overrides(&mut config, &overrides, OutputFormat::Json);
        assert_eq!(config.logging.level, LogLevel::Error);
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spanfuse.toml");
        std::fs::write(&path, "[output]\nascii = false\n").unwrap();

        let ctx = CliContext::load(Some(&path), &LogOverrides::default(), OutputFormat::Text)
            .unwrap();
        assert!(!ctx.config.output.ascii);
        assert_eq!(ctx.config_path.as_deref(), Some(path.as_path()));
    }
}
