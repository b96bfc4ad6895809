//! Rank tune titles for a query without running the server.
//!
//! Titles come from a saved SPARQL JSON result of the title listing query,
//! or straight from the endpoint.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tune_graph_api::backend::{parse_title_rows, HttpSparqlBackend};
use tune_graph_api::matcher::{best_matches, MatchOptions, DEFAULT_LIMIT, DEFAULT_MAX_RETRIES};
use tune_graph_api::models::{MatchResult, TitleRecord, TitleSnapshot};
use tune_graph_api::queries;
use tune_graph_api::scoring::DEFAULT_CUTOFF;
use tune_graph_api::title_index::TitleSource;

#[derive(Parser, Debug)]
#[command(name = "title-probe")]
#[command(about = "Print ranked fuzzy title matches for one or more queries")]
struct Args {
    /// Queries to run (one search each)
    #[arg(required = true)]
    queries: Vec<String>,

    /// SPARQL JSON result file holding `title` and `id` bindings
    #[arg(long, conflicts_with = "endpoint")]
    file: Option<PathBuf>,

    /// Fetch titles from this SPARQL endpoint instead
    #[arg(long, env = "SPARQL_ENDPOINT")]
    endpoint: Option<String>,

    #[arg(long, default_value_t = DEFAULT_CUTOFF)]
    cutoff: u8,

    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Print the SPARQL query the server would send for each result set
    #[arg(long)]
    show_query: bool,
}

async fn load_records(args: &Args) -> Result<Vec<TitleRecord>> {
    if let Some(path) = &args.file {
        println!("Reading titles from {:?}", path);
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let json: serde_json::Value = serde_json::from_str(&text).context("Title file is not valid JSON")?;
        return parse_title_rows(&json).context("Title file is not a title listing");
    }
    let Some(endpoint) = &args.endpoint else {
        bail!("either --file or --endpoint is required");
    };
    println!("Fetching titles from {}", endpoint);
    let backend = HttpSparqlBackend::new(endpoint.clone(), Duration::from_secs(60))?;
    Ok(backend.fetch_all_titles().await?)
}

fn print_matches(query: &str, matches: &[MatchResult]) {
    println!("\nMatches for '{}':", query);
    println!("{:-<80}", "");
    for m in matches {
        println!("[{}] {} score={}", m.id, m.title, m.score);
    }
    if matches.is_empty() {
        println!("No match found.");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let start = Instant::now();

    let records = load_records(&args).await?;
    let snapshot = TitleSnapshot::build(records, 1);
    println!(
        "Indexed {} titles in {:.2}s",
        snapshot.len(),
        start.elapsed().as_secs_f64()
    );

    let options = MatchOptions {
        cutoff: args.cutoff,
        limit: args.limit,
        max_retries: args.max_retries,
    };

    for query in &args.queries {
        let started = Instant::now();
        let matches = best_matches(query, &snapshot, options);
        print_matches(query, &matches);
        println!("({:.1} ms)", started.elapsed().as_secs_f64() * 1000.0);
        if args.show_query && !matches.is_empty() {
            println!("\n{}", queries::tune_by_title(&matches));
        }
    }

    Ok(())
}
