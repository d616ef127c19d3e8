use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use apollo_compiler::NodeStr;
use clap::Parser;
use federation_query_graph::build_federated_query_graph;
use federation_query_graph::build_query_graph;
use federation_query_graph::query_graph::output;
use federation_query_graph::schema::ValidFederationSchema;
use federation_query_graph::QueryGraph;
use federation_query_graph::Supergraph;

/// Renders query graphs out of GraphQL schemas.
#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print the query graph as Graphviz DOT
    Dot(GraphArgs),
    /// Print the query graph as a Mermaid flowchart
    Mermaid(GraphArgs),
}

#[derive(clap::Args)]
struct GraphArgs {
    /// A single schema file, or `name=file` subgraph pairs when --supergraph is given
    inputs: Vec<String>,
    /// Build a federated query graph; the value is the supergraph schema file
    #[arg(long)]
    supergraph: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let (graph_args, render): (&GraphArgs, fn(&QueryGraph) -> String) = match &args.command {
        Command::Dot(graph_args) => (graph_args, output::to_dot),
        Command::Mermaid(graph_args) => (graph_args, output::to_mermaid),
    };
    match build(graph_args) {
        Ok(graph) => {
            println!("{}", render(&graph));
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn build(args: &GraphArgs) -> Result<QueryGraph, Box<dyn std::error::Error>> {
    if let Some(supergraph_path) = &args.supergraph {
        let supergraph_sdl = fs::read_to_string(supergraph_path)?;
        let mut subgraphs = Vec::new();
        for input in &args.inputs {
            let Some((name, path)) = input.split_once('=') else {
                return Err(
                    format!("expected a `name=file` subgraph argument, got \"{input}\"").into(),
                );
            };
            subgraphs.push((name.to_owned(), fs::read_to_string(path)?));
        }
        let subgraph_refs: Vec<(&str, &str)> = subgraphs
            .iter()
            .map(|(name, sdl)| (name.as_str(), sdl.as_str()))
            .collect();
        let supergraph = Supergraph::parse(&supergraph_sdl, &subgraph_refs)?;
        Ok(build_federated_query_graph(&supergraph)?)
    } else {
        let [path] = args.inputs.as_slice() else {
            return Err("expected exactly one schema file".into());
        };
        let sdl = fs::read_to_string(path)?;
        let schema = ValidFederationSchema::parse(&sdl, path)?;
        let name = Path::new(path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("graph");
        Ok(build_query_graph(NodeStr::new(name), schema)?)
    }
}
