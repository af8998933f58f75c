use clap::Parser;
use std::error::Error;
use std::sync::Arc;

use page_recall::collector::{CollectOutcome, Collector};
use page_recall::config::PluginState;
use page_recall::crawlers::PageLoader;
use page_recall::crawlers::web::WebDriverLoader;
use page_recall::filter::UrlMatcher;
use page_recall::host::{HostMessage, HostMessaging, LocalHost};
use page_recall::scheduler::Scheduler;

mod args;
use args::{Args, Command};

#[tokio::main]
async fn main() {
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        ::log::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let state = match &args.config {
        Some(path) => {
            ::log::info!("Loading configuration from {}", path.display());
            PluginState::from_file(path)?
        }
        None => PluginState::default(),
    };

    match args.command {
        Command::Check { url } => check(&state, &url),
        Command::Scrape { url, webdriver } => scrape(state, &url, &webdriver).await,
        Command::Watch { urls, webdriver } => watch(state, urls, &webdriver).await,
        Command::TestConnection => test_connection(state).await,
        Command::Search { query, limit } => search(state, &query, limit).await,
        Command::Schedule => {
            let scheduler = Scheduler::new(state.current_config.schedule)?;
            println!("{}", serde_json::to_string_pretty(&scheduler.status())?);
            Ok(())
        }
    }
}

fn check(state: &PluginState, url: &str) -> Result<(), Box<dyn Error>> {
    if !state.current_config.enabled {
        println!("{}: scraping is disabled", url);
        return Ok(());
    }

    let matcher = UrlMatcher::new(&state.current_config.blacklist);
    match matcher.matching_pattern(url) {
        Some(pattern) => println!("{}: blocked by '{}'", url, pattern),
        None => println!("{}: allowed", url),
    }
    Ok(())
}

async fn scrape(state: PluginState, url: &str, webdriver: &str) -> Result<(), Box<dyn Error>> {
    let host = Arc::new(LocalHost::new());
    let collector = Collector::from_state(state, host)?;
    collector.connect().await?;

    println!("Note: scraping requires a WebDriver server (e.g., ChromeDriver) at {}", webdriver);
    let loader = WebDriverLoader::new(webdriver);
    let page = loader.load(url).await?;
    let outcome = collector.collect(page.as_ref()).await;
    loader.shutdown().await;

    match outcome? {
        CollectOutcome::Saved(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        CollectOutcome::Skipped(reason) => {
            println!("{}: skipped ({})", url, serde_json::to_string(&reason)?);
        }
    }
    Ok(())
}

async fn watch(state: PluginState, urls: Vec<String>, webdriver: &str) -> Result<(), Box<dyn Error>> {
    let host = Arc::new(LocalHost::new());
    let schedule = state.current_config.schedule.clone();

    let loader = Arc::new(WebDriverLoader::new(webdriver));
    let collector = Arc::new(
        Collector::from_state(state, host.clone())?.with_watch_list(urls, loader.clone()),
    );
    collector.connect().await?;

    let mut messages = host.on_message();
    let reporter = tokio::spawn(async move {
        while let Ok(message) = messages.recv().await {
            match message {
                HostMessage::PageSaved { url, .. } => ::log::info!("Saved {}", url),
                HostMessage::PageSkipped { url, reason } => {
                    ::log::info!("Skipped {}: {:?}", url, reason)
                }
                HostMessage::Error { url, message } => {
                    ::log::warn!("Error on {}: {}", url.unwrap_or_default(), message)
                }
            }
        }
    });

    let mut scheduler = Scheduler::with_trigger(schedule, collector.clone())?;
    collector.set_active(true);
    scheduler.start();
    println!("{}", serde_json::to_string_pretty(&scheduler.status())?);

    tokio::signal::ctrl_c().await?;
    ::log::info!("Interrupted, shutting down");

    scheduler.stop();
    collector.set_active(false);
    loader.shutdown().await;
    reporter.abort();

    println!("{}", serde_json::to_string_pretty(&collector.stats().await)?);
    Ok(())
}

async fn search(state: PluginState, query: &str, limit: Option<usize>) -> Result<(), Box<dyn Error>> {
    let collector = Collector::from_state(state, Arc::new(LocalHost::new()))?;
    collector.connect().await?;

    let pages = collector.search(query, limit).await?;
    ::log::info!("{} stored pages match '{}'", pages.len(), query);
    println!("{}", serde_json::to_string_pretty(&pages)?);
    Ok(())
}

async fn test_connection(state: PluginState) -> Result<(), Box<dyn Error>> {
    let host = Arc::new(LocalHost::new());
    let provider = state.memory_config.provider.clone();
    let collector = Collector::from_state(state, host)?;

    if !collector.test_connection().await {
        return Err(format!("{} backend is not reachable", provider).into());
    }

    collector.connect().await?;
    let stats = collector.memory_stats().await?;
    println!("{} backend reachable: {}", provider, serde_json::to_string(&stats)?);
    Ok(())
}
