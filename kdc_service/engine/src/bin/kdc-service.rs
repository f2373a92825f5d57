//! Run a throwaway Kerberos KDC until interrupted.
//!
//! Options come from a YAML file (`--config` or `KDC_SERVICE_CONFIG`) and are
//! overridden by flags. Once the KDC listens, the variables a client needs are
//! printed as `KEY=VALUE` lines on stdout.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use kdc_engine::domain::constants::DEFAULT_TAG;
use kdc_engine::infrastructure::config::OPTIONS_PATH_ENV;
use kdc_engine::infrastructure::KdcOptions;
use kdc_engine::ProviderRegistry;
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser, Debug)]
#[command(name = "kdc-service")]
#[command(about = "Start an ephemeral Kerberos KDC and stop it on Ctrl-C")]
struct Args {
    /// YAML options file
    #[arg(short, long, env = OPTIONS_PATH_ENV)]
    config: Option<PathBuf>,

    /// Registry tag for this instance
    #[arg(long, default_value = DEFAULT_TAG)]
    tag: String,

    #[arg(long)]
    realm: Option<String>,

    /// Exact port; overrides --port-range
    #[arg(long)]
    port: Option<u16>,

    /// Inclusive range searched for a free port, e.g. 2222-3333
    #[arg(long)]
    port_range: Option<String>,

    /// Managing directory for krb5.conf, kdc.conf and the database
    #[arg(long)]
    config_path: Option<PathBuf>,

    /// Principal to add once the KDC listens (`name` or `name:password`)
    #[arg(long = "principal")]
    principals: Vec<String>,

    /// Also export the client variables into this process
    #[arg(long)]
    change_env_vars: bool,

    #[arg(short, long)]
    quiet: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn options(&self) -> anyhow::Result<KdcOptions> {
        let mut options = match &self.config {
            Some(path) => KdcOptions::load_from_path(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => KdcOptions::default(),
        };

        if let Some(realm) = &self.realm {
            options.realm = realm.clone();
        }
        if self.port.is_some() {
            options.port = self.port;
        }
        if let Some(range) = &self.port_range {
            options.port_range = range.clone();
        }
        if self.config_path.is_some() {
            options.config_path = self.config_path.clone();
        }
        options.principals.extend(self.principals.iter().cloned());
        options.change_env_vars |= self.change_env_vars;
        options.quiet |= self.quiet;
        options.verbose |= self.verbose;
        options.debug |= self.debug;

        options.validate()?;
        Ok(options)
    }

    /// RUST_LOG wins; otherwise the verbosity flags, otherwise info
    fn log_filter(&self) -> tracing_subscriber::EnvFilter {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if self.quiet || self.verbose || self.debug {
                let level =
                    kdc_engine::domain::KdcLogLevel::from_flags(self.quiet, self.verbose, self.debug, false);
                tracing_subscriber::EnvFilter::new(level.filter_directive())
            } else {
                tracing_subscriber::EnvFilter::new("info")
            }
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(args.log_filter())
        .with_writer(std::io::stderr)
        .init();

    let options = args.options()?;
    let registry = ProviderRegistry::new();
    let provider = registry.create(&args.tag, options).await?;

    let started = provider.lock().await.start_service().await;
    if let Err(e) = started {
        let report = registry.dispose(&args.tag).await?;
        if !report.is_clean() {
            tracing::warn!(diagnostics = %report, "Cleanup after failed start was incomplete");
        }
        return Err(e).context("starting the KDC");
    }

    {
        let provider = provider.lock().await;
        if let Some(address) = provider.address() {
            tracing::info!(tag = %args.tag, address = %address, realm = %provider.realm(), "KDC ready");
        }
        for (key, value) in provider
            .client_environment()
            .into_iter()
            .chain(provider.build_environment())
        {
            println!("{}={}", key, value);
        }
    }

    wait_for_shutdown().await?;

    let report = registry.dispose_all().await;
    if report.is_clean() {
        tracing::info!("KDC stopped");
    } else {
        tracing::warn!(diagnostics = %report, "KDC stopped with cleanup problems");
    }
    Ok(())
}

async fn wait_for_shutdown() -> anyhow::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, stopping the KDC");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, stopping the KDC");
        }
    }
    Ok(())
}
