use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use coda::io::{load_matrix, read_edge_list, read_labels, save_matrix};
use coda::model::{AffiliationModel, SeedStrategy, TrainConfig};
use coda::{DirectedGraph, GraphFormat};

#[derive(Parser)]
#[command(name = "coda")]
#[command(about = "Overlapping community detection in directed graphs", long_about = None)]
struct Cli {
    /// Log optimizer progress at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an edge-list text file into a binary graph
    Build {
        /// Edge list, one `source<sep>dest` pair per line
        #[arg(long)]
        edges: PathBuf,

        /// Single-byte separator between the two identifiers
        #[arg(long, default_value = "\t", value_parser = parse_separator)]
        separator: u8,

        /// Binary graph to write
        #[arg(long)]
        output: PathBuf,

        /// Store raw arrays instead of the compressed encoding
        #[arg(long, default_value_t = false)]
        plain: bool,
    },

    /// Print node and edge counts of a binary graph
    Info {
        #[arg(long)]
        graph: PathBuf,

        /// Emit JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Seed, fit and dump the affinity matrices
    Train {
        #[arg(long)]
        graph: PathBuf,

        /// JSON training configuration; missing fields take defaults
        #[arg(long)]
        config: Option<PathBuf>,

        /// Overrides `clusters` from the configuration
        #[arg(long)]
        clusters: Option<usize>,

        /// Overrides `threads` from the configuration
        #[arg(long)]
        threads: Option<usize>,

        /// Overrides `seed` from the configuration
        #[arg(long)]
        seed: Option<u64>,

        /// Output path of the out-affinity matrix
        #[arg(long)]
        affi_out: PathBuf,

        /// Output path of the in-affinity matrix
        #[arg(long)]
        affi_in: PathBuf,

        /// Start from a previous out-affinity dump instead of seeding
        #[arg(long, requires = "resume_in")]
        resume_out: Option<PathBuf>,

        /// Start from a previous in-affinity dump instead of seeding
        #[arg(long, requires = "resume_out")]
        resume_in: Option<PathBuf>,
    },

    /// Count how many nodes a label file resolves
    Labels {
        #[arg(long)]
        graph: PathBuf,

        #[arg(long)]
        labels: PathBuf,
    },
}

#[derive(Serialize)]
struct GraphInfo {
    nodes: u32,
    edges: u64,
    reciprocal_edges: u64,
    labeled: bool,
}

fn parse_separator(raw: &str) -> std::result::Result<u8, String> {
    match raw.as_bytes() {
        [b] => Ok(*b),
        _ => Err(format!("separator must be a single byte, got {raw:?}")),
    }
}

fn load_graph(path: &Path) -> Result<DirectedGraph> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    DirectedGraph::load(&mut BufReader::new(file)).with_context(|| format!("loading graph {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Build {
            edges,
            separator,
            output,
            plain,
        } => {
            let graph = read_edge_list(&edges, separator)
                .with_context(|| format!("parsing edge list {}", edges.display()))?;
            let format = if plain { GraphFormat::Plain } else { GraphFormat::Compressed };
            let file = File::create(&output).with_context(|| format!("creating {}", output.display()))?;
            graph.save(&mut BufWriter::new(file), format)?;
            info!(
                nodes = graph.node_num(),
                edges = graph.edge_num(),
                ?format,
                "wrote {}",
                output.display()
            );
        }
        Commands::Info { graph, json } => {
            let g = load_graph(&graph)?;
            let summary = GraphInfo {
                nodes: g.node_num(),
                edges: g.edge_num(),
                reciprocal_edges: g.bi_degree_sum(),
                labeled: g.labels().is_some(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "{} nodes, {} edges ({} reciprocal){}",
                    summary.nodes,
                    summary.edges,
                    summary.reciprocal_edges,
                    if summary.labeled { ", labeled" } else { "" }
                );
            }
        }
        Commands::Train {
            graph,
            config,
            clusters,
            threads,
            seed,
            affi_out,
            affi_in,
            resume_out,
            resume_in,
        } => {
            let mut cfg = match config {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    TrainConfig::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
                }
                None => TrainConfig::default(),
            };
            cfg.clusters = clusters.unwrap_or(cfg.clusters);
            cfg.threads = threads.unwrap_or(cfg.threads);
            cfg.seed = seed.unwrap_or(cfg.seed);
            if cfg.threads == 0 {
                bail!("threads must be > 0");
            }

            let g = load_graph(&graph)?;
            info!(nodes = g.node_num(), edges = g.edge_num(), "loaded graph");
            let mut model = AffiliationModel::new(&g, cfg.clusters, cfg.threads)?;

            match (resume_out, resume_in) {
                (Some(out_path), Some(in_path)) => {
                    let (n, k) = (model.node_num(), model.cluster_num());
                    let out = load_matrix(&mut BufReader::new(File::open(&out_path)?), n, k)
                        .with_context(|| format!("reading {}", out_path.display()))?;
                    let inc = load_matrix(&mut BufReader::new(File::open(&in_path)?), n, k)
                        .with_context(|| format!("reading {}", in_path.display()))?;
                    model.set_affinities(&out, &inc)?;
                    info!("resumed from affinity dumps");
                }
                _ => match cfg.seeding {
                    SeedStrategy::Random => model.init_random(cfg.seed),
                    SeedStrategy::Neighborhood => model.init_neighborhood(None),
                    SeedStrategy::MinNeighborhood => model.init_min_neighborhood(None),
                },
            }

            let improve = model.converge(&cfg.optimizer, None);
            info!(improve, likelihood = model.likelihood(), "training finished");

            for (path, data) in [(&affi_out, model.affinity_out()), (&affi_in, model.affinity_in())] {
                let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
                save_matrix(&mut BufWriter::new(file), data)?;
            }
        }
        Commands::Labels { graph, labels } => {
            let g = load_graph(&graph)?;
            if g.labels().is_none() {
                bail!("graph {} carries no identifier table", graph.display());
            }
            let resolved = read_labels(&g, &labels)?;
            let hits = resolved.iter().filter(|l| l.is_some()).count();
            println!("{hits} of {} nodes labeled", g.node_num());
        }
    }

    Ok(())
}
