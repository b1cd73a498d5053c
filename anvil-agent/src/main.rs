//! Anvil build agent.
//!
//! One invocation runs the sequential flow:
//! - Bootstrap trust with the coordination server if no material is
//!   stored yet (TOFU certificate probe + plaintext registration)
//! - Construct the mutual-TLS client from the stored material and verify
//!   the channel
//! - Optionally package a source path and upload it as a build artifact
//!
//! First run against a new server:
//! ```text
//! anvil-agent --server-host build.example.com
//! ```
//!
//! Uploading artifacts once registered:
//! ```text
//! anvil-agent --source target/dist --dest release \
//!             --dest-url https://build.example.com:8154/go/remoting/files/pipeline?buildId=42
//! ```

mod config;

use std::path::PathBuf;

use anvil_agent_lib::{AgentIdentity, CertStore, ServerConfig, TrustBootstrap, Uploader};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

/// Build agent for the Anvil coordination server
#[derive(Parser, Debug)]
#[command(name = "anvil-agent", version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: platform-specific config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server hostname (overrides the configured value)
    #[arg(long)]
    server_host: Option<String>,

    /// Artifact source path to upload after bootstrap
    #[arg(long, requires = "dest_url")]
    source: Option<PathBuf>,

    /// Destination path prefix inside the uploaded archive
    #[arg(long, default_value = "")]
    dest: String,

    /// Upload endpoint URL
    #[arg(long)]
    dest_url: Option<String>,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = if config_path.exists() {
        info!("Loading config from: {}", config_path.display());
        Config::load(&config_path)?
    } else {
        Config::default()
    };
    if let Some(host) = args.server_host {
        config.server.host = host;
    }
    if !config_path.exists() {
        config.save(&config_path)?;
        info!("Saved config to: {}", config_path.display());
    }

    let server = ServerConfig::new(
        config.server.host.clone(),
        config.server.ssl_port,
        config.server.http_port,
    );
    let store = CertStore::new(config.tls.certs_dir.clone());
    let bootstrap = TrustBootstrap::new(server.clone());

    let material = if store.has_material() {
        info!("Using stored trust material from {:?}", store.base_dir());
        store.load()?
    } else {
        info!("No trust material found, bootstrapping against {}", server.ssl_addr());
        bootstrap.run(&store, &build_identity(&config))?
    };

    let client = TrustBootstrap::build_client(&material)?;
    bootstrap.verify_channel(&client)?;
    info!("Mutual-TLS channel to {} established", server.ssl_addr());

    if let (Some(source), Some(dest_url)) = (args.source, args.dest_url) {
        let uploader = Uploader::new(client, server.https_url("/go/remoting/files"));
        uploader.upload(&source, &args.dest, &dest_url)?;
        info!("Artifact upload complete");
    }

    Ok(())
}

/// Detect the local identity and apply the configured registration fields.
fn build_identity(config: &Config) -> AgentIdentity {
    let mut identity = AgentIdentity::detect();
    identity.auto_register_key = config.agent.auto_register_key.clone();
    identity.auto_register_resources = config.agent.auto_register_resources.clone();
    identity.auto_register_environments = config.agent.auto_register_environments.clone();
    identity.auto_register_hostname = config.agent.auto_register_hostname.clone();
    identity.elastic_agent_id = config.agent.elastic_agent_id.clone();
    identity.elastic_plugin_id = config.agent.elastic_plugin_id.clone();
    identity
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
