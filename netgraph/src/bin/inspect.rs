use std::{
    fs::File,
    io::{self, BufReader, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use netgraph::{graph::OutputSlotRef, BindingEntry, Deserializer, DeserializerOptions, Network};
use serde::Serialize;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Builds a serialized network and prints its bindings and nodes.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to the serialized network.
    #[arg(short, long, env = "NETGRAPH_MODEL")]
    model: PathBuf,

    /// How to print the network.
    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,

    /// Refuse models larger than this many bytes.
    #[arg(long, default_value_t = DeserializerOptions::default().max_buffer_size)]
    max_buffer_size: u64,
}

fn setup_logging(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    if json {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_level(true)
            .with_target(true)
            .with_writer(io::stderr)
            .with_env_filter(filter)
            .finish();
        tracing::subscriber::set_global_default(subscriber).context("Setting up logging failed")
    } else {
        let subscriber = tracing_subscriber::fmt()
            .compact()
            .with_level(true)
            .with_target(false)
            .without_time()
            .with_writer(io::stderr)
            .with_env_filter(filter)
            .finish();
        tracing::subscriber::set_global_default(subscriber).context("Setting up logging failed")
    }
}

#[derive(Serialize)]
struct NodeSummary<'a> {
    id: usize,
    name: &'a str,
    operation: String,
    inputs: Vec<Option<OutputSlotRef>>,
    outputs: Vec<Option<Vec<u32>>>,
}

#[derive(Serialize)]
struct Summary<'a> {
    inputs: &'a [BindingEntry],
    outputs: &'a [BindingEntry],
    nodes: Vec<NodeSummary<'a>>,
}

fn summarize<'a>(deserializer: &'a Deserializer, network: &'a Network) -> Summary<'a> {
    let nodes = network
        .nodes()
        .map(|(id, node)| NodeSummary {
            id,
            name: node.name(),
            operation: node.operation().describe(),
            inputs: node.inputs().iter().map(|slot| slot.connection()).collect(),
            outputs: node
                .outputs()
                .iter()
                .map(|slot| slot.tensor_info().map(|info| info.shape().dims().to_vec()))
                .collect(),
        })
        .collect();
    Summary {
        inputs: deserializer.input_bindings(),
        outputs: deserializer.output_bindings(),
        nodes,
    }
}

fn print_text(out: &mut impl Write, summary: &Summary<'_>) -> io::Result<()> {
    for (label, bindings) in [("input", summary.inputs), ("output", summary.outputs)] {
        for entry in bindings {
            let info = &entry.info.tensor_info;
            writeln!(
                out,
                "{label} '{}' binding {}: {:?} {:?}",
                entry.name,
                entry.info.binding_id,
                info.data_type(),
                info.shape().dims()
            )?;
        }
    }
    for node in &summary.nodes {
        let inputs = node
            .inputs
            .iter()
            .map(|producer| match producer {
                Some(producer) => format!("{}:{}", producer.node, producer.slot),
                None => "-".to_string(),
            })
            .collect::<Vec<_>>();
        writeln!(
            out,
            "#{} {} [{}] <- ({}) -> {:?}",
            node.id,
            node.name,
            node.operation,
            inputs.join(", "),
            node.outputs
        )?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(args.json_logs)?;

    let file = File::open(&args.model)
        .with_context(|| format!("opening model at {}", args.model.display()))?;
    let mut deserializer = Deserializer::with_options(DeserializerOptions {
        max_buffer_size: args.max_buffer_size,
        ..Default::default()
    });
    let network = deserializer
        .build_from_reader(BufReader::new(file))
        .with_context(|| format!("deserializing {}", args.model.display()))?;
    info!(nodes = network.len(), "loaded {}", args.model.display());

    let summary = summarize(&deserializer, &network);
    let mut out = io::stdout().lock();
    match args.format {
        Format::Text => print_text(&mut out, &summary)?,
        Format::Json => {
            serde_json::to_writer_pretty(&mut out, &summary)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
