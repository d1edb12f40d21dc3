//! # Keycloak Config Operator
//!
//! A Kubernetes operator that keeps Keycloak realms and clients in line with
//! `Realm` and `Client` custom resources.
//!
//! ## Overview
//!
//! 1. **Watching resources** - Realms and Clients in one or all namespaces
//! 2. **Resolving credentials** - admin passwords and client secrets are read from Kubernetes Secrets
//! 3. **Importing** - each resource is created or updated in Keycloak and its id recorded in status
//! 4. **Cleanup** - a finalizer removes the Keycloak object before the resource goes away
//!
//! Secret changes re-trigger every resource that references the changed Secret.

use anyhow::Result;
use clap::Parser;
use keycloak_config_operator::config::ControllerConfig;
use keycloak_config_operator::runtime::initialization::{initialize, init_tracing};
use keycloak_config_operator::runtime::watch_loop::run_watch_loop;

/// Command line flags; each one falls back to its environment variable
#[derive(Debug, Parser)]
#[command(name = "keycloak-config-operator", version, about)]
struct Args {
    /// Port for `/metrics`, `/healthz` and `/readyz`
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Only watch resources in this namespace
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let mut config = ControllerConfig::from_env();
    if let Some(port) = args.metrics_port {
        config.metrics_port = port;
    }
    if args.namespace.is_some() {
        config.watch_namespace = args.namespace;
    }

    let init = initialize(config).await?;
    run_watch_loop(init.ctx, init.server_state, init.config).await
}
