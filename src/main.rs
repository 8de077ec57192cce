// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use myuplink2mqtt::Result;
use myuplink2mqtt::api::MyUplinkClient;
use myuplink2mqtt::auth::{self, OAuthSession};
use myuplink2mqtt::bridge::BridgeSession;
use myuplink2mqtt::config::BridgeConfig;
use myuplink2mqtt::export::{DEFAULT_EXPORT_PATH, save_snapshot};
use myuplink2mqtt::protocol::MqttPublisher;

/// Publish myUplink heat-pump telemetry to MQTT with Home Assistant
/// auto-discovery.
#[derive(Debug, Parser)]
#[command(name = "myuplink2mqtt", version, about)]
struct Cli {
    /// Only log warnings and errors.
    #[arg(short, long)]
    silent: bool,

    /// Verbose logging; nothing is published to the broker.
    #[arg(short, long)]
    debug: bool,

    /// Run a single poll cycle and exit.
    #[arg(long)]
    once: bool,

    /// Print the effective configuration and exit.
    #[arg(long)]
    show_config: bool,

    /// Save an API snapshot to FILE and exit (no broker involved).
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_EXPORT_PATH
    )]
    save: Option<PathBuf>,

    /// Poll interval in seconds.
    #[arg(short, long, value_name = "SECONDS")]
    poll: Option<u64>,

    /// MQTT broker host.
    #[arg(long, value_name = "HOST")]
    mqtt_host: Option<String>,

    /// MQTT broker port.
    #[arg(long, value_name = "PORT")]
    mqtt_port: Option<u16>,

    /// Home Assistant discovery prefix.
    #[arg(long, value_name = "PREFIX")]
    discovery_prefix: Option<String>,

    /// Publish parameters reported as "not used" too.
    #[arg(long)]
    send_all: bool,
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.silent {
        "warn"
    } else if cli.debug {
        "myuplink2mqtt=debug,info"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn effective_config(cli: &Cli) -> BridgeConfig {
    let mut config = BridgeConfig::from_env();
    if let Some(ref host) = cli.mqtt_host {
        config.mqtt_host.clone_from(host);
    }
    if let Some(port) = cli.mqtt_port {
        config.mqtt_port = port;
    }
    if let Some(ref prefix) = cli.discovery_prefix {
        config.discovery_prefix.clone_from(prefix);
    }
    if let Some(secs) = cli.poll {
        config.poll_interval = std::time::Duration::from_secs(secs);
    }
    config.send_all = cli.send_all;
    config
}

async fn run(cli: &Cli, config: BridgeConfig) -> Result<()> {
    auth::check_prerequisites()?;
    let api = MyUplinkClient::new(OAuthSession::from_files()?);

    if let Some(ref path) = cli.save {
        return save_snapshot(&api, path).await;
    }

    let publisher: Option<MqttPublisher> = if cli.debug {
        tracing::info!("Debug mode: not publishing to MQTT");
        None
    } else {
        let mut builder = MqttPublisher::builder()
            .host(&config.mqtt_host)
            .port(config.mqtt_port);
        if let (Some(user), Some(pass)) = (&config.mqtt_username, &config.mqtt_password) {
            builder = builder.credentials(user, pass);
        }
        Some(builder.build().await?)
    };

    let mut session = BridgeSession::new(api, publisher.clone(), &config);
    session.run(cli.once).await?;

    if let Some(publisher) = publisher {
        if let Err(e) = publisher.disconnect().await {
            tracing::warn!(error = %e, "MQTT disconnect failed");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = effective_config(&cli);
    if cli.show_config {
        println!("{}", config.render(cli.debug, cli.silent));
        return ExitCode::SUCCESS;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting myUplink2mqtt");
    match run(&cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
