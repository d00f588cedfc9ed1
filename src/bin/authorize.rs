//! Obtains the Spotify refresh token that `spotimost` needs.
//!
//! Serves the authorization flow on localhost. Open it in a browser, grant
//! access and the refresh token is printed to standard output.

use std::{error::Error, net::SocketAddr, process};

use clap::{Parser, ValueHint};
use log::{debug, error, info, LevelFilter};
use tokio::{net::TcpListener, sync::oneshot};
use url::Url;

use spotimost::{
    authorize,
    config::{self, SpotifyConfig},
    spotify::Spotify,
    tokens::ClientSecret,
};

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Parser)]
#[command(name = "spotimost-authorize", author, version, about, long_about = None)]
struct Args {
    /// Spotify application client ID
    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    spotify_client_id: String,

    /// Spotify application client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    spotify_client_secret: ClientSecret,

    /// Redirect URI registered with the Spotify application
    ///
    /// Must point at the `/callback` path of this helper.
    #[arg(long, env = "SPOTIFY_REDIRECT_URI", value_hint = ValueHint::Url, default_value = "http://localhost:8888/callback")]
    spotify_redirect_uri: Url,

    /// Local port to listen on
    #[arg(short, long, env = "AUTH_PORT", default_value_t = 8888)]
    port: u16,

    /// Spotify accounts service URL
    #[arg(long, env = "SPOTIFY_ACCOUNTS_URL", value_hint = ValueHint::Url, default_value = SpotifyConfig::ACCOUNTS_URL, hide = true)]
    spotify_accounts_url: Url,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        logger
            .filter_module(module_path!(), level)
            .filter_module("spotimost", level);
    }

    logger.init();
}

/// Serves the authorization flow until a refresh token is obtained.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut spotify = SpotifyConfig::new(&args.spotify_client_id, args.spotify_client_secret)?;
    spotify.accounts_url = args.spotify_accounts_url;
    let spotify = Spotify::new(spotify, &config::user_agent()?)?;

    let (router, done) = authorize::router(spotify, args.spotify_redirect_uri);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = TcpListener::bind(addr).await?;
    info!("authorization server listening on http://{addr}");
    println!("\nOpen http://localhost:{} in your browser.\n", args.port);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    let refresh_token = tokio::select! {
        token = done => token?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted before authorization");
            let _ = stop_tx.send(());
            server.await??;
            return Ok(());
        }
    };

    println!("\n=== REFRESH TOKEN ===\n");
    println!("{refresh_token}");
    println!("\n=====================\n");

    let _ = stop_tx.send(());
    server.await??;
    Ok(())
}

#[tokio::main]
async fn main() {
    let dotenv = dotenv::dotenv();

    let args = Args::parse();
    init_logger(&args);

    if let Err(e) = dotenv {
        debug!("no .env file loaded: {e}");
    }
    debug!("Command {:#?}", args);

    info!("starting spotimost-authorize/{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
