//! Main entrypoint for running Drift

use std::sync::Arc;

use clap::Parser as _;
use color_eyre::eyre::{ContextCompat as _, Result};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

use crate::cli_args::CliArgs;
use crate::config::main::Config;
use crate::shared_state::SharedState;

/// The ENV variable for setting your own log filters.
const LOG_FILTER_ENV: &str = "DRIFT_LOG";

/// Commands to control the various tasks/threads
#[non_exhaustive]
#[derive(Clone, Debug)]
pub(crate) enum Protocol {
    /// The entire application is exiting.
    End,
    /// Drift's configuration was reloaded.
    Config(Config),
    /// New particle settings, to be merged over the current ones.
    Settings(particle_field::settings::PartialSettings),
}

/// Main entrypoint
pub(crate) async fn run(state_arc: &Arc<SharedState>) -> Result<()> {
    let protocol_tx = state_arc.protocol_tx.clone();
    let cli_args = setup(state_arc).await?;

    if let (Some(frames), Some(path)) = (cli_args.frames, cli_args.screenshot) {
        return crate::snapshot::render(state_arc, frames, &path).await;
    }

    let config_handle = Config::watch(Arc::clone(state_arc));
    let input_thread_handle = crate::input::Input::start(protocol_tx.clone());

    override_on_panic_behaviour();
    let animation_handle = crate::animation::start(Arc::clone(state_arc));

    let animation_result = animation_handle.await;
    tracing::debug!("🏁 left animation task, exiting Drift...");
    broadcast_protocol_end(&protocol_tx);
    animation_result??;

    if input_thread_handle.is_finished() {
        // The STDIN loop doesn't listen to the protocol, so it can't exit its loop. Therefore we
        // should only join it if it finished due of its own error.
        input_thread_handle
            .join()
            .map_err(|err| color_eyre::eyre::eyre!("STDIN handle: {err:?}"))??;
    }
    config_handle.await??;

    tracing::trace!("Leaving Drift's main `run()` function");
    Ok(())
}

/// The default behaviour prints all panics to the CLI. But that would end up in the middle of the
/// particles, and the user's terminal would still be in raw mode. So at least a log is made.
fn override_on_panic_behaviour() {
    std::panic::set_hook(Box::new(|info| {
        let message = if let Some(message) = info.payload().downcast_ref::<String>() {
            message
        } else if let Some(message) = info.payload().downcast_ref::<&str>() {
            message
        } else {
            "Caught a panic with an unknown type."
        };
        let location = match info.location() {
            Some(location) => format!(
                "{}@{}:{}",
                location.file(),
                location.line(),
                location.column()
            ),
            None => "Unknown location".to_owned(),
        };
        tracing::error!("Caught panic ({}): {message:?}", location);
    }));
}

/// Signal all task/thread loops to exit.
///
/// We keep it in its own function because we need to handle the error separately. If the error
/// were to be bubbled with `?` as usual, there's a chance it would never be logged, because the
/// protocol end signal is itself what allows the central error handler to even be reached.
pub(crate) fn broadcast_protocol_end(protocol_tx: &tokio::sync::broadcast::Sender<Protocol>) {
    tracing::debug!("Broadcasting the protocol `End` message to all listeners");
    let result = protocol_tx.send(Protocol::End);
    if let Err(error) = result {
        tracing::error!("{error:?}");
    }
}

/// Prepare the application to start.
async fn setup(state: &Arc<SharedState>) -> Result<CliArgs> {
    let cli_args = CliArgs::parse();

    let mut main_config_file = state.main_config_file.write().await;
    (*main_config_file).clone_from(&cli_args.main_config);
    drop(main_config_file);

    let directory_result = Config::setup_directory(cli_args.config_dir.clone(), state).await;
    if let Err(directory_error) = directory_result {
        color_eyre::eyre::bail!("Error setting up config directory: {directory_error:?}");
    }

    let config_result = Config::load_config_into_shared_state(state).await;
    if let Err(config_error) = config_result {
        let path = Config::main_config_path(state).await;
        color_eyre::eyre::bail!(
            "Bad config file: {config_error:?}\n\nConfig path: {}",
            path.display()
        );
    }

    if let Some(json) = &cli_args.settings {
        let settings = parse_cli_settings(json)?;
        *state.cli_settings.write().await = settings;
    }

    setup_logging(cli_args.clone(), state).await?;

    tracing::info!("Starting Drift");
    tracing::debug!("Loaded config: {:?}", state.config.read().await);

    Ok(cli_args)
}

/// Parse the particle settings given as JSON on the command line.
fn parse_cli_settings(json: &str) -> Result<particle_field::settings::PartialSettings> {
    match serde_json::from_str(json) {
        Ok(settings) => Ok(settings),
        Err(error) => color_eyre::eyre::bail!("Bad `--settings` JSON: {error}"),
    }
}

/// Setup logging
async fn setup_logging(cli_args: CliArgs, state: &Arc<SharedState>) -> Result<()> {
    let are_log_filters_manually_set = std::env::var(LOG_FILTER_ENV).is_ok();
    let mut path = state.config.read().await.log_path.clone();

    if let Some(cli_override_path) = cli_args.log_path {
        path = cli_override_path;
    }

    let mut level = state.config.read().await.log_level.clone();
    if let Some(cli_override_level) = cli_args.log_level {
        level = cli_override_level;
    }
    let level_as_string = format!("{level:?}").to_lowercase();

    let is_loggable =
        !matches!(level, crate::config::main::LogLevel::Off) || are_log_filters_manually_set;

    if !is_loggable {
        return Ok(());
    }

    let directory = path.parent().context("Couldn't get log path's parent")?;
    std::fs::create_dir_all(directory)?;
    let file = std::fs::File::create(path.clone())?;

    let filters = if are_log_filters_manually_set {
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("error".parse()?)
            .with_env_var(LOG_FILTER_ENV)
            .from_env_lossy()
    } else {
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("off".parse()?)
            .parse_lossy("")
            .add_directive(format!("drift={level_as_string}").parse()?)
            .add_directive(format!("particle_field={level_as_string}").parse()?)
    };

    // Logs only ever go to a file, the terminal is busy showing particles.
    let logfile_layer = tracing_subscriber::fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_filter(filters);

    tracing_subscriber::registry().with(logfile_layer).init();

    let mut is_logging = state.is_logging.write().await;
    *is_logging = true;
    drop(is_logging);

    // Make sure that the end of session message points at the file actually being used.
    state.config.write().await.log_path = path;

    Ok(())
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests aren't so strict")]
mod test {
    use super::*;

    #[test]
    fn parses_cli_settings() {
        let settings = parse_cli_settings(r#"{ "particle": { "count": 3 } }"#).unwrap();
        assert_eq!(settings.particle.count, Some(3));
    }

    #[test]
    fn negative_counts_are_rejected() {
        let result = parse_cli_settings(r#"{ "particle": { "count": -3 } }"#);
        assert!(result.is_err());
    }
}
