//! Command handlers for the wstest binary.
//!
//! `run` drives one session against the loopback transport; `check_profile`
//! loads and validates a release build profile.

use crate::config::Config;
use crate::metrics::{self, SessionMetricsGuard};
use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use wstest_core::page::package_of;
use wstest_core::{logging_listener, Bootstrapper, BuildProfile, SessionError};
use wstest_protocol::EventMessage;
use wstest_transport::{
    negotiate_connection_type, Listener, LogLevel, LoopbackTransport, CLIENT_CONNECTION_TYPES,
};

/// The module the page must load for the session to start.
const BOOT_MODULE: &str = "wstest";

/// Options for the `run` command.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Page origin, e.g. http://localhost:8080
    #[arg(long)]
    pub location: Option<String>,

    /// Channel to subscribe to
    #[arg(long)]
    pub channel: Option<String>,

    /// Transport log level (warn, info, debug)
    #[arg(long)]
    pub log_level: Option<LogLevel>,

    /// Make the loopback transport reject the handshake
    #[arg(long, default_value_t = false)]
    pub reject_handshake: bool,

    /// JSON batch of events to publish once subscribed
    #[arg(long)]
    pub publish_file: Option<PathBuf>,

    /// Unsubscribe and exit instead of waiting for Ctrl-C
    #[arg(long, default_value_t = false)]
    pub once: bool,
}

impl RunArgs {
    /// Apply command line overrides on top of the loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(location) = &self.location {
            config.session.location.clone_from(location);
        }
        if let Some(channel) = &self.channel {
            config.session.channel.clone_from(channel);
        }
        if let Some(level) = self.log_level {
            config.session.log_level = level;
        }
        if self.reject_handshake {
            config.loopback.accept_handshakes = false;
        }
    }
}

/// Listener that logs each message and counts it.
fn counting_listener() -> Listener {
    let log = logging_listener();
    Arc::new(move |msg: &EventMessage| {
        metrics::record_message(msg.channel.as_str());
        log(msg);
    })
}

/// Boot the page and run one session.
///
/// # Errors
///
/// Returns an error if the config is invalid, the handshake is rejected, or
/// the transport fails.
pub async fn run(mut config: Config, args: RunArgs) -> Result<()> {
    args.apply(&mut config);

    if config.metrics.enabled {
        metrics::init_metrics();
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let starts_session = config
        .page
        .boot(|deps| deps.iter().any(|dep| package_of(dep) == BOOT_MODULE))
        .context("Invalid page config")?;
    if !starts_session {
        warn!(deps = ?config.page.deps, "Page does not load {}, nothing to do", BOOT_MODULE);
        return Ok(());
    }

    let session = config
        .session
        .to_session_config()
        .context("Invalid session config")?;
    let loopback = Arc::new(LoopbackTransport::with_config(
        config.loopback.to_loopback_config(),
    ));
    let bootstrapper =
        Bootstrapper::new(session, loopback.clone()).with_listener(counting_listener());

    let handle = match bootstrapper.initialize().await {
        Ok(handle) => {
            metrics::record_handshake(true);
            metrics::record_subscription();
            handle
        }
        Err(e @ SessionError::HandshakeRejected { .. }) => {
            metrics::record_handshake(false);
            return Err(e).context("Session not established");
        }
        Err(e) => {
            metrics::record_error("transport");
            return Err(e).context("Session not established");
        }
    };
    let _guard = SessionMetricsGuard::new();

    if let Some(connection_type) =
        negotiate_connection_type(&CLIENT_CONNECTION_TYPES, &config.loopback.connection_types)
    {
        let reply = loopback.connect(connection_type).context("Failed to connect")?;
        if !reply.successful {
            metrics::record_error("connect");
            bail!(
                "Connect refused: {}",
                reply.error.as_deref().unwrap_or("connect unsuccessful")
            );
        }
        info!(connection_type = %connection_type, advice = ?reply.advice, "Connected");
    }

    if let Some(path) = &args.publish_file {
        let batch = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read events from {}", path.display()))?;
        let delivered = loopback
            .publish_batch(&batch)
            .with_context(|| format!("Failed to publish events from {}", path.display()))?;
        info!(file = %path.display(), delivered, "Published events");
    }

    if !args.once {
        info!(channel = %handle.channel(), "Session running, press Ctrl-C to stop");
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
    }

    handle.remove().await.context("Failed to unsubscribe")?;
    if let Some(reply) = loopback.disconnect() {
        info!(client = %reply.client_id, "Disconnected");
    }

    let stats = loopback.stats();
    info!(
        handshakes = stats.handshakes,
        subscribes = stats.subscribes,
        unsubscribes = stats.unsubscribes,
        delivered = stats.delivered,
        "Session finished"
    );
    Ok(())
}

/// Load and validate a build profile, then print a summary.
///
/// # Errors
///
/// Returns an error if the profile cannot be loaded or is invalid.
pub fn check_profile(path: &Path) -> Result<()> {
    let profile = BuildProfile::from_file(path)
        .with_context(|| format!("Failed to load profile {}", path.display()))?;
    profile
        .validate()
        .with_context(|| format!("Invalid profile {}", path.display()))?;

    println!("{}: ok", path.display());
    println!("  basePath: {}", profile.base_path);
    for (name, layer) in &profile.layers {
        let boot = if layer.boot { " (boot)" } else { "" };
        println!("  layer {}{}: {} module(s)", name, boot, layer.include.len());
    }
    for (flag, value) in &profile.static_has_features {
        println!("  has {} = {}", flag, value);
    }

    if profile.boot_layer().is_none() {
        bail!("Profile {} has no boot layer", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn once() -> RunArgs {
        RunArgs {
            once: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_args_override_config() {
        let mut config = Config::default();
        let args = RunArgs {
            location: Some("https://bus.example.com".into()),
            channel: Some("/scores".into()),
            log_level: Some(LogLevel::Debug),
            reject_handshake: true,
            ..Default::default()
        };
        args.apply(&mut config);

        assert_eq!(config.session.location, "https://bus.example.com");
        assert_eq!(config.session.channel, "/scores");
        assert_eq!(config.session.log_level, LogLevel::Debug);
        assert!(!config.loopback.accept_handshakes);
    }

    #[tokio::test]
    async fn test_run_once() {
        assert!(run(Config::default(), once()).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_rejected_handshake() {
        let args = RunArgs {
            reject_handshake: true,
            ..once()
        };
        let err = run(Config::default(), args).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::HandshakeRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_without_boot_module() {
        let mut config = Config::default();
        config.page.deps = vec!["dojo/domReady".into()];
        assert!(run(config, once()).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_publishes_batch() {
        let path = std::env::temp_dir().join(format!("wstest-events-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"channel": "/players", "data": {"name": "ana"}}, {"channel": "/players", "data": {"name": "bo"}}]"#,
        )
        .unwrap();

        let args = RunArgs {
            publish_file: Some(path.clone()),
            ..once()
        };
        let result = run(Config::default(), args).await;
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_missing_publish_file() {
        let args = RunArgs {
            publish_file: Some(PathBuf::from("/nonexistent/events.json")),
            ..once()
        };
        assert!(run(Config::default(), args).await.is_err());
    }

    #[test]
    fn test_check_profile() {
        let path = std::env::temp_dir().join(format!("wstest-profile-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "basePath = \".\"\n\n[layers.\"dojo/dojo\"]\ninclude = [\"wstest\"]\nboot = true\n",
        )
        .unwrap();
        let result = check_profile(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_ok());

        assert!(check_profile(Path::new("/nonexistent/profile.toml")).is_err());
    }
}
