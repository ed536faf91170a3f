//! Here we store all the data that the app's tasks and threads share.
//! Access is mediated with locks to support asynchronicity

use std::sync::Arc;

use tokio::sync::RwLock;

/// The capacity of the protocol channel. Messages are small and infrequent.
const PROTOCOL_CHANNEL_SIZE: usize = 64;

/// All the shared data the app uses
#[non_exhaustive]
pub(crate) struct SharedState {
    /// The channel on which all Drift protocol messages are sent.
    pub protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
    /// Location of the config directory.
    pub config_path: RwLock<std::path::PathBuf>,
    /// Name of the main config file.
    pub main_config_file: RwLock<std::path::PathBuf>,
    /// User config
    pub config: RwLock<crate::config::main::Config>,
    /// Particle settings given on the command line. They're layered over the config file's
    /// settings, including every time the config file is reloaded.
    pub cli_settings: RwLock<particle_field::settings::PartialSettings>,
    /// Is the application logging?
    pub is_logging: RwLock<bool>,
}

impl SharedState {
    /// Initialise the shared state
    pub fn init() -> Arc<Self> {
        let (protocol_tx, _) = tokio::sync::broadcast::channel(PROTOCOL_CHANNEL_SIZE);
        Arc::new(Self {
            protocol_tx,
            config_path: RwLock::default(),
            main_config_file: RwLock::default(),
            config: RwLock::default(),
            cli_settings: RwLock::default(),
            is_logging: RwLock::default(),
        })
    }

    /// The config file's particle settings, with any settings from the command line on top.
    pub async fn partial_settings(&self) -> particle_field::settings::PartialSettings {
        let from_config = self.config.read().await.settings.clone();
        let from_cli = self.cli_settings.read().await;
        from_config.overlay(&from_cli)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests aren't so strict")]
mod test {
    use super::*;

    #[tokio::test]
    async fn cli_settings_win() {
        let state = SharedState::init();
        state.config.write().await.settings =
            serde_json::from_str(r#"{ "particle": { "count": 5, "color": "red" } }"#).unwrap();
        *state.cli_settings.write().await =
            serde_json::from_str(r#"{ "particle": { "count": 9 } }"#).unwrap();

        let partial = state.partial_settings().await;
        assert_eq!(partial.particle.count, Some(9));
        assert_eq!(partial.particle.colour.as_deref(), Some("red"));
    }
}
