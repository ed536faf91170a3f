//! All of the user config for Drift.

use color_eyre::eyre::ContextCompat as _;
use color_eyre::eyre::Result;

use crate::shared_state::SharedState;

/// A copy of the default config file. It gets copied to the user's config folder the first time
/// they start Drift.
static DEFAULT_CONFIG: &str = include_str!("../../default_config.toml");

/// The most canvas pixels per terminal pixel. Much beyond this and a full screen canvas won't fit
/// in memory.
pub(crate) const MAX_RESOLUTION: u32 = 16;

/// The valid log levels. Based on our `tracing` crate.
#[derive(serde::Serialize, serde::Deserialize, clap::ValueEnum, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LogLevel {
    /// Error
    Error,
    /// Warnings
    Warn,
    /// Info
    Info,
    /// Debug
    Debug,
    /// Trace
    Trace,
    /// No logging
    Off,
}

/// Managing user config.
#[derive(serde::Deserialize, Debug, Clone)]
#[serde(default)]
pub(crate) struct Config {
    /// The maximum log level
    pub log_level: LogLevel,
    /// The location of the log file.
    pub log_path: std::path::PathBuf,
    /// Target frame rate
    pub frame_rate: u32,
    /// Canvas pixels per terminal pixel, along each axis.
    pub resolution: u32,
    /// The particle settings.
    pub settings: particle_field::settings::PartialSettings,
}

impl Default for Config {
    fn default() -> Self {
        let log_directory = match dirs::state_dir() {
            Some(directory) => directory,
            None => std::path::PathBuf::new().join("./"),
        };
        let log_path = log_directory.join("drift").join("drift.log");

        Self {
            log_level: LogLevel::Off,
            log_path,
            frame_rate: 60,
            resolution: 4,
            settings: particle_field::settings::PartialSettings::default(),
        }
    }
}

impl Config {
    /// Keep values that the host multiplies into sizes and intervals within workable limits.
    #[must_use]
    pub fn bound_checked(mut self) -> Self {
        let resolution = self.resolution.clamp(1, MAX_RESOLUTION);
        if resolution != self.resolution {
            tracing::warn!(
                "`resolution` of {} is out of range, using {resolution}",
                self.resolution
            );
            self.resolution = resolution;
        }
        if self.frame_rate == 0 {
            tracing::warn!("`frame_rate` of 0 is out of range, using 1");
            self.frame_rate = 1;
        }
        self
    }

    /// Canonical path to the config directory.
    pub async fn directory(state: &std::sync::Arc<SharedState>) -> std::path::PathBuf {
        state.config_path.read().await.clone()
    }

    /// Get the stable location of Drift's config directory on the user's system.
    pub fn default_directory() -> Result<std::path::PathBuf> {
        Ok(dirs::config_dir()
            .context("Couldn't get standard config directory")?
            .join("drift"))
    }

    /// Figure out where our config is being stored, and create the directory if needed.
    pub async fn setup_directory(
        maybe_custom_path: Option<std::path::PathBuf>,
        state: &std::sync::Arc<SharedState>,
    ) -> Result<()> {
        let path = match maybe_custom_path {
            None => Self::default_directory()?,
            Some(path_string) => std::path::PathBuf::new().join(path_string),
        };

        std::fs::create_dir_all(path.clone())?;
        *state.config_path.write().await = path;

        Ok(())
    }

    /// Canonical path to the main config file.
    pub async fn main_config_path(state: &std::sync::Arc<SharedState>) -> std::path::PathBuf {
        let directory = Self::directory(state).await;
        let main_config_file = state.main_config_file.read().await.clone();
        directory.join(main_config_file)
    }

    /// Load the main config. The default config is written out first if the user doesn't have
    /// one yet.
    pub async fn load(state: &std::sync::Arc<SharedState>) -> Result<Self> {
        let config_path = Self::main_config_path(state).await;
        let config_file_name = config_path
            .file_name()
            .context("Couldn't get file name from config path")?;
        let is_default_config = config_file_name == crate::cli_args::DEFAULT_CONFIG_FILE_NAME;
        if is_default_config && !config_path.exists() {
            tracing::info!("Writing default config to: {}", config_path.display());
            std::fs::write(config_path.clone(), DEFAULT_CONFIG)?;
        }

        tracing::info!("(Re)loading the main Drift config from: {config_path:?}");
        let result = std::fs::read_to_string(config_path.clone());
        match result {
            Ok(data) => {
                tracing::trace!("Using config file:\n{data}");
                let config = toml::from_str::<Self>(&data)?.bound_checked();
                Ok(config)
            }
            Err(err) => {
                tracing::error!("Loading config: {err:?}");
                color_eyre::eyre::bail!(
                    "Couldn't load config at {config_path:?}: {}",
                    err.to_string()
                );
            }
        }
    }

    /// Load the main config
    pub async fn load_config_into_shared_state(
        state: &std::sync::Arc<SharedState>,
    ) -> Result<Self> {
        let new_config = Self::load(state).await?;
        let mut config_state = state.config.write().await;
        *config_state = new_config.clone();
        drop(config_state);

        Ok(new_config)
    }

    /// Watch the config file for any changes and then automatically update the shared state with
    /// the contents of the new config file.
    pub fn watch(state: std::sync::Arc<SharedState>) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move {
            let path = Self::directory(&state).await;
            tracing::debug!("Watching config ({path:?}) for changes.");

            let (config_file_change_tx, mut config_file_change_rx) = tokio::sync::mpsc::channel(1);
            let mut protocol_rx = state.protocol_tx.subscribe();

            let mut debouncer = notify_debouncer_full::new_debouncer(
                std::time::Duration::from_millis(100),
                None,
                move |result: notify_debouncer_full::DebounceEventResult| match result {
                    Ok(events) => {
                        for event in events {
                            let send_result = config_file_change_tx.blocking_send(event.clone());
                            if let Err(error) = send_result {
                                tracing::error!(
                                    "Sending config file watcher notification: {error:?}"
                                );
                            }
                        }
                    }
                    Err(error) => tracing::error!("File watcher: {error:?}"),
                },
            )?;
            debouncer.watch(
                &path,
                notify_debouncer_full::notify::RecursiveMode::NonRecursive,
            )?;

            #[expect(
                clippy::integer_division_remainder_used,
                reason = "This is caused by the `tokio::select!`"
            )]
            loop {
                tokio::select! {
                    Some(event) = config_file_change_rx.recv() => {
                        Self::handle_file_change_event(event, &state).await;
                    },
                    Ok(message) = protocol_rx.recv() => {
                        if matches!(message, crate::run::Protocol::End) {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("Leaving config watcher loop");
            Ok(())
        })
    }

    /// Handle an event from the config file watcher. Should normally be a notification that the
    /// config file has changed.
    async fn handle_file_change_event(
        event: notify_debouncer_full::DebouncedEvent,
        state: &std::sync::Arc<SharedState>,
    ) {
        use notify_debouncer_full::notify::event as notify_event;
        let notify_event::EventKind::Modify(kind) = event.kind else {
            return;
        };
        let notify_event::ModifyKind::Data(_) = kind else {
            return;
        };

        tracing::debug!(
            "Config file change detected ({:?}), updating shared state.",
            event.paths
        );

        match Self::load_config_into_shared_state(state).await {
            Ok(config) => {
                let settings = state.partial_settings().await;
                for message in [
                    crate::run::Protocol::Config(config),
                    crate::run::Protocol::Settings(settings),
                ] {
                    state
                        .protocol_tx
                        .send(message)
                        .unwrap_or_else(|send_error| {
                            tracing::error!(
                                "Couldn't send config update on protocol channel: {send_error:?}"
                            );
                            0
                        });
                }
            }
            Err(error) => {
                tracing::warn!("Ignoring bad config update, keeping the previous one: {error:?}");
            }
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests aren't so strict")]
mod test {
    use super::*;

    async fn state_with_config_in(directory: &std::path::Path) -> std::sync::Arc<SharedState> {
        let state = SharedState::init();
        *state.main_config_file.write().await =
            crate::cli_args::DEFAULT_CONFIG_FILE_NAME.into();
        Config::setup_directory(Some(directory.to_path_buf()), &state)
            .await
            .unwrap();
        state
    }

    #[test]
    fn default_config_parses_to_the_defaults() {
        let config = toml::from_str::<Config>(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.resolution, 4);
        assert_eq!(config.log_level, LogLevel::Off);

        let settings = particle_field::settings::Settings::from_partial(&config.settings);
        assert_eq!(settings, particle_field::settings::Settings::default());
    }

    #[test]
    fn huge_resolutions_are_clamped() {
        let config = toml::from_str::<Config>("resolution = 100000")
            .unwrap()
            .bound_checked();
        assert_eq!(config.resolution, MAX_RESOLUTION);

        let config = toml::from_str::<Config>("resolution = 0\nframe_rate = 0")
            .unwrap()
            .bound_checked();
        assert_eq!(config.resolution, 1);
        assert_eq!(config.frame_rate, 1);
    }

    #[tokio::test]
    async fn out_of_range_resolutions_are_clamped_on_load() {
        let directory = tempfile::tempdir().unwrap();
        let state = state_with_config_in(directory.path()).await;
        std::fs::write(directory.path().join("drift.toml"), "resolution = 100000").unwrap();

        let config = Config::load_config_into_shared_state(&state).await.unwrap();
        assert_eq!(config.resolution, MAX_RESOLUTION);
        assert_eq!(state.config.read().await.resolution, MAX_RESOLUTION);
    }

    #[tokio::test]
    async fn writes_the_default_config_on_first_load() {
        let directory = tempfile::tempdir().unwrap();
        let state = state_with_config_in(directory.path()).await;

        let config = Config::load_config_into_shared_state(&state).await.unwrap();
        assert!(directory.path().join("drift.toml").exists());
        assert_eq!(config.frame_rate, 60);
        assert_eq!(state.config.read().await.resolution, 4);
    }

    #[tokio::test]
    async fn loads_users_settings() {
        let directory = tempfile::tempdir().unwrap();
        std::fs::write(
            directory.path().join("drift.toml"),
            r#"
                frame_rate = 30

                [settings.particle]
                count = 12

                [settings.opacity]
                minOpacity = 0.25
            "#,
        )
        .unwrap();
        let state = state_with_config_in(directory.path()).await;

        let config = Config::load(&state).await.unwrap();
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.resolution, 4);
        assert_eq!(config.settings.particle.count, Some(12));
        assert_eq!(config.settings.opacity.min_opacity, Some(0.25));
        assert_eq!(config.settings.canvas.width, None);
    }

    #[tokio::test]
    async fn bad_config_is_an_error() {
        let directory = tempfile::tempdir().unwrap();
        std::fs::write(
            directory.path().join("drift.toml"),
            "[settings.particle]\ncount = -1\n",
        )
        .unwrap();
        let state = state_with_config_in(directory.path()).await;

        assert!(Config::load(&state).await.is_err());
    }

    #[tokio::test]
    async fn missing_custom_config_is_an_error() {
        let directory = tempfile::tempdir().unwrap();
        let state = state_with_config_in(directory.path()).await;
        *state.main_config_file.write().await = "custom.toml".into();

        assert!(Config::load(&state).await.is_err());
        assert!(!directory.path().join("custom.toml").exists());
    }
}
