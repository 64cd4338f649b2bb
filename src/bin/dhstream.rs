//! Write a device's raw real-time stream to stdout until interrupted.
//!
//! ```bash
//! dhstream 192.168.1.108 37777 -u admin -p secret -c 0 -s 0 > capture.dav
//!
//! # Settings from a file, diagnostics on stderr
//! RUST_LOG=debug dhstream --config camera.json 192.168.1.108 37777 > capture.dav
//! ```
//!
//! SIGINT, SIGTERM and SIGQUIT stop the stream and log out cleanly.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dhstream::{
    Authentication, Config, Credentials, Realplay, Session, Shutdown, StreamBridge, StreamRequest,
    Transport,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dhstream", author, version, about = "Stream raw real-time video to stdout")]
struct Args {
    /// The IP address of the device
    address: String,

    /// The port to connect to
    port: u16,

    /// Username [default: admin]
    #[arg(short, long)]
    username: Option<String>,

    /// Password [default: password]
    #[arg(short, long, env = "DHSTREAM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// The channel to use [default: 0]
    #[arg(short, long)]
    channel: Option<u32>,

    /// The stream type to use, 0 to 3 [default: 0]
    #[arg(short, long, allow_negative_numbers = true)]
    stream_type: Option<i32>,

    /// Enable debug messages
    #[arg(long)]
    debug: bool,

    /// JSON file with default settings
    #[arg(long, env = "DHSTREAM_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    /// Command line flags win over the config file, which wins over defaults.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(username) = &self.username {
            config.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(channel) = self.channel {
            config.channel = channel;
        }
        if let Some(stream_type) = self.stream_type {
            config.stream_type = stream_type;
        }
        config.debug |= self.debug;
        Ok(config)
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries the stream, diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "netsdk")]
fn sdk_transport() -> Result<Arc<dyn Transport>> {
    Ok(Arc::new(dhstream::transport::NetSdkTransport::new()))
}

#[cfg(not(feature = "netsdk"))]
fn sdk_transport() -> Result<Arc<dyn Transport>> {
    anyhow::bail!("built without the `netsdk` feature, rebuild with `--features netsdk`")
}

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;

/// `--help` and `--version` also arrive as parse errors, they exit cleanly.
fn parse_error_status(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    }
}

/// A signal-triggered stop is a success unless the sink broke on the way.
fn stream_status(sink_failed: bool) -> u8 {
    if sink_failed { EXIT_FAILURE } else { EXIT_SUCCESS }
}

async fn run(args: Args, config: Config) -> Result<ExitCode> {
    let transport = sdk_transport()?;
    let shutdown = Shutdown::new();
    let bridge = StreamBridge::new(std::io::stdout())
        .with_debug(config.debug)
        .with_shutdown(shutdown.clone());
    let mut session = Session::new(transport, bridge).context("failed to initialise the SDK")?;

    let credentials = Credentials::new(
        args.address,
        args.port,
        config.username.clone(),
        config.password.clone(),
    );
    session.login(&credentials).await?;
    session
        .start_stream(StreamRequest::new(config.channel, config.stream_type))
        .await?;

    shutdown
        .listen_for_signals()
        .context("failed to install signal handlers")?;
    shutdown.wait(config.poll_interval()).await;

    session.stop();
    let stats = session.bridge().stats();
    info!(frames = stats.frames, bytes = stats.bytes, "stream stopped");

    Ok(ExitCode::from(stream_status(session.bridge().has_failed())))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let status = parse_error_status(&e);
            let _ = e.print();
            return ExitCode::from(status);
        }
    };

    let config = args.resolve_config();
    init_tracing(args.debug || config.as_ref().is_ok_and(|c| c.debug));

    let result = match config {
        Ok(config) => run(args, config).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_classic_tool() {
        let args = Args::try_parse_from(["dhstream", "10.0.0.2", "37777"]).unwrap();
        let config = args.resolve_config().unwrap();

        assert_eq!(args.address, "10.0.0.2");
        assert_eq!(args.port, 37777);
        assert_eq!(config.username, "admin");
        assert_eq!(config.password, "password");
        assert_eq!(config.channel, 0);
        assert_eq!(config.stream_type, 0);
        assert!(!config.debug);
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"username": "viewer", "channel": 2, "stream_type": 1}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::try_parse_from([
            "dhstream", "10.0.0.2", "37777", "--config", path.as_str(), "-c", "5", "--debug",
        ])
        .unwrap();
        let config = args.resolve_config().unwrap();

        assert_eq!(config.username, "viewer");
        assert_eq!(config.channel, 5);
        assert_eq!(config.stream_type, 1);
        assert!(config.debug);
    }

    #[test]
    fn out_of_range_stream_type_parses() {
        let args =
            Args::try_parse_from(["dhstream", "10.0.0.2", "37777", "--stream-type", "-1"]).unwrap();
        assert_eq!(args.stream_type, Some(-1));
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(Args::try_parse_from(["dhstream", "10.0.0.2"]).is_err());
        assert!(Args::try_parse_from(["dhstream", "10.0.0.2", "port"]).is_err());
        assert!(Args::try_parse_from(["dhstream", "10.0.0.2", "37777", "-c", "-1"]).is_err());
    }

    #[test]
    fn help_and_version_exit_zero() {
        let err = Args::try_parse_from(["dhstream", "--help"]).unwrap_err();
        assert_eq!(parse_error_status(&err), 0);

        let err = Args::try_parse_from(["dhstream", "--version"]).unwrap_err();
        assert_eq!(parse_error_status(&err), 0);
    }

    #[test]
    fn argument_errors_exit_one() {
        let err = Args::try_parse_from(["dhstream", "10.0.0.2"]).unwrap_err();
        assert_eq!(parse_error_status(&err), 1);

        let err = Args::try_parse_from(["dhstream", "10.0.0.2", "notaport"]).unwrap_err();
        assert_eq!(parse_error_status(&err), 1);
    }

    #[test]
    fn broken_sink_exits_one() {
        assert_eq!(stream_status(false), 0);
        assert_eq!(stream_status(true), 1);
    }
}
