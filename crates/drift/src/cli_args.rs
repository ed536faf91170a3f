//! All the CLI arguments for Drift

/// The name of the config file that is created for the user the first time Drift runs.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "drift.toml";

/// Drifting, fading particles in your terminal.
#[derive(clap::Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
#[non_exhaustive]
pub struct CliArgs {
    /// Use a different config directory, rather than your OS's default.
    #[arg(long)]
    pub config_dir: Option<std::path::PathBuf>,

    /// The name of the config file, inside the config directory.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE_NAME)]
    pub main_config: std::path::PathBuf,

    /// Particle settings as JSON, eg: `{"particle": {"count": 200}}`. They take precedence over
    /// the `[settings]` table in the config file.
    #[arg(short, long)]
    pub settings: Option<String>,

    /// Override the log level from the config file.
    #[arg(long, value_enum)]
    pub log_level: Option<crate::config::main::LogLevel>,

    /// Override the log path from the config file.
    #[arg(long)]
    pub log_path: Option<std::path::PathBuf>,

    /// Don't draw to the terminal. Instead, render this many frames and save the last one.
    #[arg(long, requires = "screenshot")]
    pub frames: Option<u32>,

    /// Where to save the PNG rendered by `--frames`.
    #[arg(long, requires = "frames")]
    pub screenshot: Option<std::path::PathBuf>,
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests aren't so strict")]
mod test {
    use clap::Parser as _;

    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["drift"]).unwrap();
        assert_eq!(
            args.main_config,
            std::path::PathBuf::from(DEFAULT_CONFIG_FILE_NAME)
        );
        assert!(args.settings.is_none());
        assert!(args.frames.is_none());
    }

    #[test]
    fn headless_needs_both_frames_and_a_path() {
        assert!(CliArgs::try_parse_from(["drift", "--frames", "10"]).is_err());
        assert!(CliArgs::try_parse_from(["drift", "--screenshot", "out.png"]).is_err());

        let args =
            CliArgs::try_parse_from(["drift", "--frames", "10", "--screenshot", "out.png"])
                .unwrap();
        assert_eq!(args.frames, Some(10));
    }

    #[test]
    fn log_level_override() {
        let args = CliArgs::try_parse_from(["drift", "--log-level", "trace"]).unwrap();
        assert_eq!(args.log_level, Some(crate::config::main::LogLevel::Trace));
    }
}
