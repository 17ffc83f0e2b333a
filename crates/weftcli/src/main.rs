use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use weftcore::{
    ArcSpec, Graph, GraphSpec, NodeSpec, NodeTypeRegistry, ProcessEvent, Value,
};
use weftruntime::{RuntimeConfig, WorkflowRuntime};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Weft workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a process on a graph file and run it to quiescence
    Run {
        /// Path to graph JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Process payload as JSON string
        #[arg(short, long)]
        input: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a graph file
    Validate {
        /// Path to graph JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example graph
    Init {
        /// Output file path
        #[arg(short, long, default_value = "graph.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            verbose,
        } => {
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::INFO)
                    .init();
            }

            run_graph(file, input).await?;
        }

        Commands::Validate { file } => {
            validate_graph_file(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_graph(output)?;
        }
    }

    Ok(())
}

fn standard_registry() -> NodeTypeRegistry {
    let mut registry = NodeTypeRegistry::standard();
    weftnodes::register_all(&mut registry);
    registry
}

fn load_graph(file: &PathBuf) -> Result<Graph> {
    let graph_json = std::fs::read_to_string(file)?;
    let spec: GraphSpec = serde_json::from_str(&graph_json)?;
    Ok(Graph::from_spec(spec)?)
}

async fn run_graph(file: PathBuf, input: Option<String>) -> Result<()> {
    println!("🚀 Loading graph from: {}", file.display());

    let graph = load_graph(&file)?;
    println!("📋 Graph: {}", graph.name());
    println!("   Nodes: {}", graph.node_count());
    println!("   Arcs: {}", graph.arc_count());
    println!();

    let payload = match input {
        Some(input_str) => {
            let json: serde_json::Value = serde_json::from_str(&input_str)?;
            Value::from_json(json)
        }
        None => Value::Null,
    };

    let runtime = WorkflowRuntime::with_registry(
        Arc::new(standard_registry()),
        RuntimeConfig::default(),
    );

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ProcessEvent::ProcessStarted { graph_name, .. } => {
                    println!("▶️  Process started on '{}'", graph_name);
                }
                ProcessEvent::NodeTokenCreated {
                    node_name,
                    node_type,
                    token_id,
                    ..
                } => {
                    println!("  ⚡ Token {} entered '{}' ({})", token_id, node_name, node_type);
                }
                ProcessEvent::NodeTokenCompleted {
                    token_id, label, ..
                } => {
                    if label.is_empty() {
                        println!("  ✅ Token {} completed", token_id);
                    } else {
                        println!("  ✅ Token {} completed along '{}'", token_id, label);
                    }
                }
                ProcessEvent::NodeParked {
                    node_name,
                    token_id,
                    ..
                } => {
                    println!("  ⏸️  Token {} parked at '{}'", token_id, node_name);
                }
                ProcessEvent::NodeDiscarded { token_id, .. } => {
                    println!("  🚫 Token {} discarded", token_id);
                }
                ProcessEvent::NodeSkipped {
                    token_id, label, ..
                } => {
                    println!("  ⏭️  Token {} skipped along '{}'", token_id, label);
                }
                ProcessEvent::ProcessCompleted { .. } => {
                    println!("✨ Process completed");
                }
                _ => {}
            }
        }
    });

    let graph_id = runtime
        .register_graph(graph)
        .await
        .map_err(|issues| anyhow::anyhow!(render_issues(&issues)))?;
    let view = runtime.start_process(graph_id, payload).await?;

    // Wait for events to finish printing
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Process Summary:");
    println!("   Process ID: {}", view.id);
    println!("   Complete: {}", view.complete);

    if !view.node_tokens.is_empty() {
        println!();
        println!("⏸️  Parked tokens:");
        for token in &view.node_tokens {
            println!(
                "   Token {} at '{}' ({})",
                token.token_id, token.node_name, token.node_type
            );
        }
    }
    if !view.arc_tokens.is_empty() {
        println!();
        println!("🕐 Waiting arc tokens:");
        for token in &view.arc_tokens {
            println!("   Token {} on arc {} ('{}')", token.token_id, token.arc_id, token.label);
        }
    }

    Ok(())
}

fn render_issues(issues: &[weftruntime::ValidationIssue]) -> String {
    let mut out = String::from("graph failed validation:");
    for issue in issues {
        out.push_str(&format!("\n  - {}", issue));
    }
    out
}

fn validate_graph_file(file: PathBuf) -> Result<()> {
    println!("🔍 Validating graph: {}", file.display());

    let graph = load_graph(&file)?;
    let registry = standard_registry();
    let issues = weftruntime::validate_graph(&graph, &registry);

    println!("   Name: {}", graph.name());
    println!("   Nodes: {}", graph.node_count());
    println!("   Arcs: {}", graph.arc_count());

    if issues.is_empty() {
        println!("✅ Graph is valid");
    } else {
        for issue in &issues {
            println!("   {}", issue);
        }
        if weftruntime::has_errors(&issues) {
            anyhow::bail!("graph has validation errors");
        }
        println!("✅ Graph is runnable (with warnings)");
    }

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = standard_registry();
    for node_type in registry.list_type_names() {
        println!("  • {}", node_type);
    }
}

fn create_example_graph(output: PathBuf) -> Result<()> {
    let spec = GraphSpec::new("Example Approval Flow")
        .with_node(NodeSpec::new(1, "default", "start"))
        .with_node(
            NodeSpec::new(2, "attr.set", "stamp")
                .with_extra("set", stamp_extra())
                .with_extra("label", ""),
        )
        .with_node(NodeSpec::new(3, "task.manual", "review"))
        .with_node(NodeSpec::new(4, "debug.log", "publish"))
        .with_node(NodeSpec::new(5, "debug.log", "archive"))
        .with_arc(ArcSpec::new(1, 1, 2, ""))
        .with_arc(ArcSpec::new(2, 2, 3, ""))
        .with_arc(ArcSpec::new(3, 3, 4, "approved"))
        .with_arc(ArcSpec::new(4, 3, 5, "rejected"));

    let json = serde_json::to_string_pretty(&spec)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example graph: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  weft run --file {}", output.display());

    Ok(())
}

fn stamp_extra() -> Value {
    let mut set = std::collections::HashMap::new();
    set.insert("status".to_string(), Value::from("new"));
    Value::Object(set)
}
