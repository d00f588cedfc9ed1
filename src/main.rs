use std::{error::Error, process, time::Duration};

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, LevelFilter};
use url::Url;

use spotimost::{
    config::{Config, MattermostConfig, Overlap, SpotifyConfig},
    mattermost::Mattermost,
    scheduler::Scheduler,
    signal,
    spotify::Spotify,
    sync::Synchronizer,
    tokens::{ChatToken, ClientSecret, RefreshToken},
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when built in release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
///
/// Every option can also be set through its environment variable, or in a
/// `.env` file in the working directory.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Spotify application client ID
    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    spotify_client_id: String,

    /// Spotify application client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    spotify_client_secret: ClientSecret,

    /// Spotify refresh token
    ///
    /// Obtain one with `spotimost-authorize`.
    #[arg(long, env = "SPOTIFY_REFRESH_TOKEN", hide_env_values = true)]
    spotify_refresh_token: RefreshToken,

    /// Mattermost server URL
    #[arg(long, env = "MATTERMOST_SERVER_URL", value_hint = ValueHint::Url)]
    mattermost_server_url: Url,

    /// Mattermost user ID whose custom status is set
    #[arg(long, env = "MATTERMOST_USER_ID")]
    mattermost_user_id: String,

    /// Mattermost personal access token
    ///
    /// Ensure that this token is kept secure and not shared publicly, as it
    /// grants access to your Mattermost account.
    #[arg(long, env = "MATTERMOST_TOKEN", hide_env_values = true)]
    mattermost_token: ChatToken,

    /// Name of the custom emoji that shows the artwork
    #[arg(long, env = "MATTERMOST_EMOJI_NAME", default_value = MattermostConfig::DEFAULT_EMOJI_NAME)]
    mattermost_emoji_name: String,

    /// Status text while nothing is playing
    #[arg(long, env = "IDLE_STATUS_TEXT", default_value = Config::DEFAULT_IDLE_STATUS)]
    idle_status_text: String,

    /// Seconds between polls
    #[arg(long, env = "POLL_INTERVAL", value_name = "SECONDS", default_value_t = Config::DEFAULT_INTERVAL.as_secs())]
    poll_interval: u64,

    /// Skip a poll while the previous one is still running
    #[arg(long, env = "SERIALIZE_CYCLES", default_value_t = false)]
    serialize_cycles: bool,

    /// Spotify accounts service URL
    #[arg(long, env = "SPOTIFY_ACCOUNTS_URL", value_hint = ValueHint::Url, default_value = SpotifyConfig::ACCOUNTS_URL, hide = true)]
    spotify_accounts_url: Url,

    /// Spotify Web API URL
    #[arg(long, env = "SPOTIFY_API_URL", value_hint = ValueHint::Url, default_value = SpotifyConfig::API_URL, hide = true)]
    spotify_api_url: Url,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Builds the configuration from the command line arguments.
fn config(args: Args) -> spotimost::error::Result<Config> {
    let mut spotify = SpotifyConfig::new(&args.spotify_client_id, args.spotify_client_secret)?;
    spotify.refresh_token = Some(args.spotify_refresh_token);
    spotify.accounts_url = args.spotify_accounts_url;
    spotify.api_url = args.spotify_api_url;

    let mattermost = MattermostConfig::new(
        args.mattermost_server_url,
        &args.mattermost_user_id,
        args.mattermost_token,
        &args.mattermost_emoji_name,
    )?;

    let mut config = Config::new(spotify, mattermost)?
        .with_interval(Duration::from_secs(args.poll_interval))?
        .with_idle_status(&args.idle_status_text)?;
    if args.serialize_cycles {
        config.overlap = Overlap::Skip;
    }

    Ok(config)
}

/// Main application loop.
///
/// Polls until Ctrl-C or `SIGTERM`. `SIGHUP` makes the next poll publish
/// the status again, even if the track did not change.
///
/// # Errors
///
/// Returns an error when the configuration is invalid or the clients or
/// signal handlers cannot be set up.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = config(args)?;
    debug!("{config:#?}");

    let spotify = Spotify::new(config.spotify.clone(), &config.user_agent)?;
    let mattermost = Mattermost::new(config.mattermost.clone(), &config.user_agent)?;
    let synchronizer = Synchronizer::new(
        mattermost,
        &config.mattermost.emoji_name,
        &config.idle_status,
    );
    let scheduler = Scheduler::new(spotify, synchronizer, config.interval, config.overlap);

    let mut signals = signal::Handler::new()?;
    let polling = scheduler.run();
    tokio::pin!(polling);

    loop {
        tokio::select! {
            // Prioritize signals.
            biased;

            signal = signals.recv() => {
                if signal.is_shutdown() {
                    info!("shutting down gracefully on {signal}");
                    break Ok(());
                }

                info!("{signal} received, republishing on next poll");
                scheduler.reset().await;
            }

            () = &mut polling => break Ok(()),
        }
    }
}

/// Main entry point of the application.
#[tokio::main]
async fn main() {
    // Variables already set in the environment take precedence.
    let dotenv = dotenv::dotenv();

    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    if let Err(e) = dotenv {
        debug!("no .env file loaded: {e}");
    }

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
