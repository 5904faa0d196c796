//! Console chat front end for the dispatch engine.
//!
//! Reads one message per stdin line as `<identity>|<display name>|<message>`
//! and prints every outgoing chat message as `-> <recipient>: <text>`.

mod console;
mod conversation;
mod intent;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dispatch_core::logging::{init_logging, LogFormat};
use dispatch_core::{DispatchConfig, DispatchEngine};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::console::{write_outbox, ConsoleNotifier, Outgoing};
use crate::conversation::{ChatAdapter, Incoming};

#[derive(Parser, Debug)]
#[command(
    name = "dispatch",
    about = "Conversational ride dispatch over stdin/stdout",
    long_about = "Routes chat messages between clients and drivers.\n\
                  Input lines look like `<identity>|<display name>|<message>`."
)]
struct Args {
    /// JSON dispatch config (drivers, matching policy, timeouts)
    #[arg(long, env = "DISPATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Seconds a driver has to answer an offer
    #[arg(long, env = "DISPATCH_OFFER_TIMEOUT_SECS")]
    offer_timeout_secs: Option<u64>,
    /// Log output format: json or pretty
    #[arg(long, env = "DISPATCH_LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,
}

fn load_config(args: &Args) -> anyhow::Result<DispatchConfig> {
    let mut config = match &args.config {
        Some(path) => DispatchConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => DispatchConfig::default(),
    };
    if let Some(secs) = args.offer_timeout_secs {
        config = config.with_offer_timeout_secs(secs);
        config.validate().context("invalid --offer-timeout-secs")?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_format).context("installing log subscriber")?;

    let config = load_config(&args)?;
    if config.drivers.is_empty() {
        warn!("no drivers configured; every request will end without a driver");
    }

    let (outbox, outbox_rx) = mpsc::unbounded_channel::<Outgoing>();
    let writer = tokio::spawn(write_outbox(outbox_rx, tokio::io::stdout()));

    let engine = DispatchEngine::new(config, Arc::new(ConsoleNotifier::new(outbox.clone())))
        .context("building dispatch engine")?;
    let adapter = ChatAdapter::new(engine.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let Some(message) = Incoming::parse(&line) else {
            warn!(line = %line, "ignoring malformed input line");
            continue;
        };
        let answer = adapter.handle(&message).await;
        if outbox.send(Outgoing::new(message.identity, answer)).is_err() {
            break;
        }
    }

    let counts = engine.telemetry();
    info!(
        counts = %serde_json::to_string(&counts).unwrap_or_default(),
        acceptance_rate = counts.acceptance_rate().unwrap_or(0.0),
        "input closed, shutting down"
    );
    engine.shutdown();
    drop(adapter);
    drop(engine);
    drop(outbox);
    writer.await.context("console writer panicked")??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use dispatch_core::MatchingPolicyKind;

    use super::*;

    #[test]
    fn bundled_driver_config_is_valid() {
        let config =
            DispatchConfig::from_json_str(include_str!("../drivers.json")).expect("valid config");
        assert_eq!(config.drivers.len(), 3);
        assert_eq!(config.max_offer_attempts, Some(5));
        assert_eq!(
            config.matching,
            MatchingPolicyKind::Nearest {
                max_radius_km: Some(15.0)
            }
        );
    }

    #[test]
    fn timeout_flag_overrides_config() {
        let args = Args::parse_from(["dispatch", "--offer-timeout-secs", "30", "--log-format", "pretty"]);
        assert_eq!(args.log_format, LogFormat::Pretty);
        let config = load_config(&args).expect("config");
        assert_eq!(config.offer_timeout_secs, 30);

        let args = Args::parse_from(["dispatch", "--offer-timeout-secs", "0"]);
        assert!(load_config(&args).is_err());
    }
}
