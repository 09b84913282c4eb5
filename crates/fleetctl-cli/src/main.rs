//! fleetctl controller-manager.
//!
//! Reconciles Machines, MachineSets, and MachineDeployments against a cloud
//! provider and a cluster, the way a Kubernetes controller-manager
//! reconciles its own built-in controllers.
//!
//! # Quick Start
//!
//! ```bash
//! # Run the controller-manager with defaults
//! fleetctl run
//!
//! # Show version information
//! fleetctl version
//! ```

mod commands;
mod environment;
mod health;
mod style;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fleetctl_config::FleetctlConfig;

/// fleetctl - declarative machine lifecycle controller.
#[derive(Parser)]
#[command(name = "fleetctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Run the controller-manager (spec.md §6 CLI surface).
    Run {
        /// Path to a kubeconfig file for the target cluster.
        #[arg(long)]
        kubeconfig: Option<PathBuf>,

        /// Cluster API server address, overriding the kubeconfig context.
        #[arg(long)]
        master: Option<String>,

        /// Machine reconciler worker pool size.
        #[arg(long)]
        machine_workers: Option<u32>,

        /// MachineSet reconciler worker pool size.
        #[arg(long)]
        machine_set_workers: Option<u32>,

        /// MachineDeployment reconciler worker pool size.
        #[arg(long)]
        machine_deployment_workers: Option<u32>,

        /// Metrics listen address (`/metrics`).
        #[arg(long)]
        metrics_listen_address: Option<String>,

        /// Health-probe listen address (`/healthz`, `/readyz`).
        #[arg(long)]
        health_listen_address: Option<String>,

        /// Disable leader election (run as a single, always-active replica).
        #[arg(long)]
        no_leader_election: bool,

        /// Namespace the leader-election lease is created in.
        #[arg(long)]
        leader_election_namespace: Option<String>,

        /// Worker-class shard name, for running multiple controller-manager
        /// fleets against disjoint machine pools.
        #[arg(long)]
        worker_class: Option<String>,

        /// Seconds to wait for a created Machine to join the cluster before
        /// marking it failed.
        #[arg(long)]
        join_cluster_timeout_secs: Option<u64>,

        /// Seconds to wait for graceful pod eviction before deleting a node
        /// unconditionally.
        #[arg(long)]
        skip_eviction_timeout_secs: Option<u64>,

        /// Assume the cluster runs an external cloud-controller-manager.
        #[arg(long)]
        external_cloud_provider: bool,

        /// Container runtime new nodes are bootstrapped with.
        #[arg(long)]
        container_runtime: Option<String>,

        /// Cluster DNS service IP(s) passed to new nodes' kubelets.
        #[arg(long)]
        cluster_dns_ip: Vec<String>,

        /// HTTP proxy passed to new nodes.
        #[arg(long)]
        http_proxy: Option<String>,

        /// HTTPS proxy passed to new nodes.
        #[arg(long)]
        https_proxy: Option<String>,

        /// Hosts excluded from proxying on new nodes.
        #[arg(long)]
        no_proxy: Vec<String>,

        /// Insecure (HTTP or self-signed) registries new nodes trust.
        #[arg(long)]
        insecure_registry: Vec<String>,

        /// Pause container image new nodes use.
        #[arg(long)]
        pause_image: Option<String>,

        /// Kubelet feature gate, `name=true` or `name=false`; repeatable.
        #[arg(long = "kubelet-feature-gate", value_parser = parse_feature_gate)]
        kubelet_feature_gates: Vec<(String, bool)>,
    },
}

fn parse_feature_gate(raw: &str) -> Result<(String, bool), String> {
    let (name, value) = raw.split_once('=').ok_or_else(|| format!("expected name=true|false, got {raw:?}"))?;
    let value = value.parse::<bool>().map_err(|_| format!("expected true or false, got {value:?}"))?;
    Ok((name.to_string(), value))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Run {
            kubeconfig,
            master,
            machine_workers,
            machine_set_workers,
            machine_deployment_workers,
            metrics_listen_address,
            health_listen_address,
            no_leader_election,
            leader_election_namespace,
            worker_class,
            join_cluster_timeout_secs,
            skip_eviction_timeout_secs,
            external_cloud_provider,
            container_runtime,
            cluster_dns_ip,
            http_proxy,
            https_proxy,
            no_proxy,
            insecure_registry,
            pause_image,
            kubelet_feature_gates,
        } => {
            let mut config = FleetctlConfig::load()?;

            if kubeconfig.is_some() {
                config.store.kubeconfig = kubeconfig;
            }
            if master.is_some() {
                config.store.master = master;
            }
            if let Some(n) = machine_workers {
                config.worker_pools.machine = n;
            }
            if let Some(n) = machine_set_workers {
                config.worker_pools.machine_set = n;
            }
            if let Some(n) = machine_deployment_workers {
                config.worker_pools.machine_deployment = n;
            }
            if let Some(addr) = metrics_listen_address {
                config.observability.metrics_listen_address = addr;
            }
            if let Some(addr) = health_listen_address {
                config.observability.health_listen_address = addr;
            }
            if no_leader_election {
                config.leader_election.enabled = false;
            }
            if let Some(ns) = leader_election_namespace {
                config.leader_election.namespace = ns;
            }
            if worker_class.is_some() {
                config.leader_election.worker_class = worker_class;
            }
            if let Some(secs) = join_cluster_timeout_secs {
                config.lifecycle.join_cluster_timeout_secs = secs;
            }
            if let Some(secs) = skip_eviction_timeout_secs {
                config.lifecycle.skip_eviction_timeout_secs = secs;
            }
            if external_cloud_provider {
                config.node.external_cloud_provider = true;
            }
            if let Some(runtime) = container_runtime {
                config.node.container_runtime = runtime;
            }
            if !cluster_dns_ip.is_empty() {
                config.node.cluster_dns_ips = cluster_dns_ip;
            }
            if http_proxy.is_some() {
                config.node.proxy.http_proxy = http_proxy;
            }
            if https_proxy.is_some() {
                config.node.proxy.https_proxy = https_proxy;
            }
            if !no_proxy.is_empty() {
                config.node.proxy.no_proxy = no_proxy;
            }
            if !insecure_registry.is_empty() {
                config.node.insecure_registries = insecure_registry;
            }
            if let Some(image) = pause_image {
                config.node.pause_image = image;
            }
            for (name, value) in kubelet_feature_gates {
                config.node.kubelet_feature_gates.insert(name, value);
            }

            style::banner::print_banner();

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::run::run(config))
        }
    }
}
