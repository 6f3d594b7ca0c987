#![warn(missing_docs)]
//! Core library entry points for the boardcrawl forum harvester.

pub mod cleaner;
pub mod controls;
pub mod dataset;
pub mod discover;
pub mod error;
pub mod extract;
pub mod renderer;
pub mod scheduler;

pub use cleaner::{CleanConfig, Cleaner};
pub use controls::{Board, Cli, CrawlControls};
pub use discover::{discover_links, CandidateLink};
pub use error::{CrawlError, Result};
pub use extract::{extract_content, ProcessedLinks, RawRecord};
pub use renderer::Renderer;
pub use scheduler::crawl_boards;
