//! A small command-line front end over the topology engine: load a GML
//! file, validate it, and report what the engine learned about it. This is
//! the ambient CLI surface the library itself doesn't need.

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::{error, info};
use rand::SeedableRng;

use topology::attach::AttachmentHints;
use topology::{NullWorker, Topology, TopologyOptions};

#[derive(Debug, Parser)]
#[command(name = "topology-cli", version, about = "Load and inspect a network topology graph")]
struct CliOptions {
    /// Path to a GML network graph file.
    graph_file: PathBuf,

    /// Route every pair via a direct edge instead of shortest path.
    /// Requires a complete graph (self-loop at every vertex, direct edge
    /// between every pair).
    #[arg(long)]
    use_direct_paths: bool,

    /// An IPv4 address to probe attachment for.
    #[arg(long, value_name = "ip")]
    probe_ip: Option<Ipv4Addr>,

    /// City hint passed alongside `--probe-ip`, matched against vertices'
    /// `city_code` attribute.
    #[arg(long, value_name = "city", requires = "probe_ip")]
    probe_city: Option<String>,

    /// Country hint passed alongside `--probe-ip`, matched against
    /// vertices' `country_code` attribute.
    #[arg(long, value_name = "country", requires = "probe_ip")]
    probe_country: Option<String>,

    /// Seed for the attachment policy's RNG.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

/// Read the graph file from disk. The only I/O boundary in this crate, so
/// it's the only place `anyhow` is used: everything past this point reports
/// through `TopologyError`, which already knows which specific kind applies.
fn read_graph_file(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read graph file {}", path.display()))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = CliOptions::parse();

    let gml_text = match read_graph_file(&options.graph_file) {
        Ok(text) => text,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    let topology_options = TopologyOptions {
        use_shortest: !options.use_direct_paths,
    };

    let topology = match Topology::new(&gml_text, topology_options, Box::new(NullWorker)) {
        Ok(t) => t,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let properties = topology.properties();
    info!(
        "loaded graph: directed={} clusters={} complete={}",
        properties.is_directed, properties.cluster_count, properties.is_complete
    );

    if let Some(ip) = options.probe_ip {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(options.seed);
        let hints = AttachmentHints {
            ip: Some(ip),
            city: options.probe_city.as_deref(),
            country: options.probe_country.as_deref(),
        };
        let attachment = topology.attach(ip, &hints, &mut rng);
        info!(
            "attached {ip} to vertex {:?}: down={:.1} KiB/s up={:.1} KiB/s",
            attachment.vertex, attachment.bandwidth_down_kibps, attachment.bandwidth_up_kibps
        );
    }

    ExitCode::SUCCESS
}
