use clap::{Parser, Subcommand};
use std::path::PathBuf;

use page_recall::crawlers::web::DEFAULT_WEBDRIVER_URL;

#[derive(Parser, Debug)]
#[command(name = "page-recall")]
#[command(about = "Collects page text on a schedule and stores it in a memory backend")]
#[command(version)]
pub struct Args {
    /// JSON file holding the plugin state (currentConfig, memoryConfig, ...)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show whether a URL would be collected, and which pattern blocks it
    Check { url: String },

    /// Collect a single page now
    Scrape {
        url: String,

        #[arg(long, env = "WEBDRIVER_URL", default_value = DEFAULT_WEBDRIVER_URL)]
        webdriver: String,
    },

    /// Collect the given pages on every scheduled tick until interrupted
    Watch {
        #[arg(required = true)]
        urls: Vec<String>,

        #[arg(long, env = "WEBDRIVER_URL", default_value = DEFAULT_WEBDRIVER_URL)]
        webdriver: String,
    },

    /// Check that the memory backend is reachable
    TestConnection,

    /// Look up stored pages in the memory backend
    Search {
        query: String,

        /// Maximum number of results (default 10)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print the schedule status
    Schedule,
}
