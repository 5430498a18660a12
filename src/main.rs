use anyhow::Result;
use cartful::config::EngineConfig;
use cartful::state::{FinalList, SharedState};
use cartful::supervisor::LoggingObserver;
use cartful::{ShoppingEngine, ShoppingRequest};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Turn a grocery request into a priced, budget-aware shopping list
#[derive(Parser)]
#[command(name = "cartful")]
#[command(about = "Grocery shopping assistant", long_about = None)]
struct Cli {
    /// What to shop for, in plain language
    request: String,

    /// Spending limit in dollars
    #[arg(short, long, value_parser = parse_budget)]
    budget: Option<f64>,

    /// Number of people to shop for
    #[arg(short, long)]
    people: Option<u32>,

    /// Cuisine hint (e.g. "italian")
    #[arg(long)]
    cuisine: Option<String>,

    /// Path to a cartful.toml configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit the full final state as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_budget(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("invalid budget: {e}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err("budget must be a non-negative number of dollars".to_string());
    }
    Ok(value)
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "cartful=info",
        1 => "cartful=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_list(state: &SharedState) {
    let Some(list) = &state.final_list else {
        println!("no shopping list produced");
        return;
    };

    println!("SHOPPING LIST");
    println!("{}", "=".repeat(50));
    print_by_category(list);
    println!();
    println!("TOTAL: ${:.2}", list.grand_total);
    match state.request.budget {
        Some(budget) if list.grand_total <= budget => {
            println!("within budget (${budget:.2}), ${:.2} remaining", budget - list.grand_total);
        }
        Some(budget) => {
            println!("over budget (${budget:.2}) by ${:.2}", list.grand_total - budget);
        }
        None => println!("no budget specified"),
    }
    for note in &list.notes {
        println!("note: {note}");
    }
}

fn print_by_category(list: &FinalList) {
    let mut by_category: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for line in &list.lines {
        let marker = if line.note.is_some() { " (est.)" } else { "" };
        by_category
            .entry(format!("{}", line.category))
            .or_default()
            .push(format!(
                "  {} x{} - ${:.2}{marker}",
                line.display_name, line.quantity, line.line_total
            ));
    }
    for (category, lines) in by_category {
        println!("\n{}:", category.to_uppercase());
        for line in lines {
            println!("{line}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = EngineConfig::load(cli.config.as_deref())?;
    let engine = ShoppingEngine::new(config).with_observer(Arc::new(LoggingObserver));

    let mut request = ShoppingRequest::new(cli.request);
    request.budget = cli.budget;
    request.people = cli.people;
    request.cuisine = cli.cuisine;

    let state = engine.run(request).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_list(&state);
        if cli.verbose > 0 {
            println!("\nstep log:");
            for entry in &state.step_log {
                println!("  {} [{:?}]: {}", entry.step, entry.status, entry.message);
            }
        }
    }
    Ok(())
}
