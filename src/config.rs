//! Server configuration from flags and environment.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::matcher::{MatchOptions, DEFAULT_LIMIT, DEFAULT_MAX_RETRIES};
use crate::scoring::DEFAULT_CUTOFF;

pub const DEFAULT_ENDPOINT: &str = "https://polifonia.disi.unibo.it/fonn/sparql";

#[derive(Parser, Debug, Clone)]
#[command(name = "tune-graph-api")]
#[command(about = "Search API over a folk tune knowledge graph")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "TUNE_API_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// SPARQL endpoint of the knowledge graph
    #[arg(long, env = "SPARQL_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[arg(long, env = "SPARQL_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Seconds between title index refreshes (0 disables)
    #[arg(long, env = "TITLE_REFRESH_SECS", default_value_t = 3600)]
    pub refresh_interval_secs: u64,

    /// Minimum fuzzy score (0-100) for the first search pass
    #[arg(long, default_value_t = DEFAULT_CUTOFF, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub cutoff: u8,

    /// Maximum title matches handed to a query
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    /// Times the cutoff is halved before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            cutoff: self.cutoff,
            limit: self.limit,
            max_retries: self.max_retries,
        }
    }
}
