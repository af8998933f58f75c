//! Collects the text of visited web pages on a schedule, redacts sensitive
//! substrings and stores the result in a pluggable memory backend.

pub mod collector;
pub mod config;
pub mod crawlers;
pub mod error;
pub mod filter;
pub mod host;
pub mod memory;
pub mod parsers;
pub mod results;
pub mod scheduler;
pub mod sensitive;
pub mod utils;

// Re-export commonly used types for convenience
pub use collector::{CollectOutcome, Collector};
pub use config::{MemoryConfig, MemoryProvider, PluginState, ScheduleConfig, ScrapingConfig};
pub use crawlers::{ContentScraper, PageSource, StaticPage};
pub use error::{MemoryError, ScheduleError};
pub use filter::UrlMatcher;
pub use host::{HostMessage, HostMessaging, LocalHost};
pub use memory::{MemoryAdapter, MemoryAdapterFactory};
pub use results::{PageMetadata, WebPageContent};
pub use scheduler::Scheduler;
pub use sensitive::SensitiveFilter;
