//! Crawl timing, sizing, and output controls shared across components.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of concurrent extraction workers.
pub const DEFAULT_MAX_WORKERS: usize = 5;
/// Default ceiling on listing-page scroll steps per board.
pub const DEFAULT_MAX_SCROLL: usize = 1000;
/// Forum root used to build board listing URLs.
pub const DEFAULT_BASE_URL: &str = "https://www.dcard.tw";
/// Boards harvested when the caller does not name any.
pub const DEFAULT_BOARDS: &str = "travel,food,job,graduate_school,exam";
/// Boilerplate phrase scrubbed from titles and bodies during cleaning.
pub const DEFAULT_SCRUB_PHRASE: &str = "Dcard 需要確認您的連線是安全的";

/// A topic board paired with its output dataset file name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    /// Board key as it appears in the listing URL.
    pub name: String,
    /// Dataset file name inside the output directory.
    pub file: String,
}

impl Board {
    /// Builds a board whose dataset file is derived from its name.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            file: format!("{name}.csv"),
        }
    }
}

/// Tunable knobs that bound crawl behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrawlControls {
    wait_timeout: Duration,
    short_wait: Duration,
    medium_wait: Duration,
    max_workers: usize,
    max_scroll: usize,
    base_url: String,
    data_dir: PathBuf,
    boards: Vec<Board>,
    scrub_phrases: Vec<String>,
    drop_undated: bool,
}

impl CrawlControls {
    /// Bound on explicit element and readiness waits.
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Pause after each scroll step while lazy content settles.
    pub fn short_wait(&self) -> Duration {
        self.short_wait
    }

    /// Settle pause after the initial board navigation.
    pub fn medium_wait(&self) -> Duration {
        self.medium_wait
    }

    /// Size of the extraction worker pool.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Ceiling on scroll steps during link discovery.
    pub fn max_scroll(&self) -> usize {
        self.max_scroll
    }

    /// Boards to harvest, in discovery order.
    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    /// Boilerplate phrases removed from titles and bodies when cleaning.
    pub fn scrub_phrases(&self) -> &[String] {
        &self.scrub_phrases
    }

    /// Whether posts without a parseable date are excluded instead of being
    /// treated as fresh.
    pub fn drop_undated(&self) -> bool {
        self.drop_undated
    }

    /// Listing URL for a board.
    pub fn board_url(&self, board: &Board) -> String {
        format!("{}/f/{}", self.base_url.trim_end_matches('/'), board.name)
    }

    /// Dataset path for a board inside the output directory.
    pub fn output_path(&self, board: &Board) -> PathBuf {
        self.data_dir.join(&board.file)
    }

    /// Output directory holding all board datasets.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

impl Default for CrawlControls {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(1),
            short_wait: Duration::from_secs(1),
            medium_wait: Duration::from_secs(1),
            max_workers: DEFAULT_MAX_WORKERS,
            max_scroll: DEFAULT_MAX_SCROLL,
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: PathBuf::from("data"),
            boards: split_list(DEFAULT_BOARDS).map(Board::named).collect(),
            scrub_phrases: vec![DEFAULT_SCRUB_PHRASE.to_string()],
            drop_undated: false,
        }
    }
}

/// Command-line interface shared by binaries that want crawl controls.
#[derive(Parser, Debug, Clone)]
#[command(name = "boardcrawl", about = "Forum board crawler with CSV dataset output")]
pub struct Cli {
    /// Seconds to wait for explicit element and readiness checks
    #[arg(long, env = "BOARDCRAWL_WAIT_TIMEOUT", default_value_t = 1)]
    pub wait_timeout_secs: u64,

    /// Seconds to pause after each scroll step
    #[arg(long, env = "BOARDCRAWL_SHORT_WAIT", default_value_t = 1)]
    pub short_wait_secs: u64,

    /// Seconds to let a board listing settle after navigation
    #[arg(long, env = "BOARDCRAWL_MEDIUM_WAIT", default_value_t = 1)]
    pub medium_wait_secs: u64,

    /// Number of concurrent extraction workers
    #[arg(long, env = "BOARDCRAWL_MAX_WORKERS", default_value_t = DEFAULT_MAX_WORKERS)]
    pub max_workers: usize,

    /// Maximum scroll steps per board listing
    #[arg(long, env = "BOARDCRAWL_MAX_SCROLL", default_value_t = DEFAULT_MAX_SCROLL)]
    pub max_scroll: usize,

    /// Forum root URL
    #[arg(long, env = "BOARDCRAWL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Output directory for board datasets
    #[arg(long, env = "BOARDCRAWL_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Boards to harvest, comma separated
    #[arg(long, env = "BOARDCRAWL_BOARDS", default_value = DEFAULT_BOARDS)]
    pub boards: String,

    /// Additional boilerplate phrase to scrub; repeatable
    #[arg(long = "scrub-phrase")]
    pub scrub_phrases: Vec<String>,

    /// Exclude posts whose date cannot be parsed instead of keeping them
    #[arg(long, env = "BOARDCRAWL_DROP_UNDATED", default_value_t = false)]
    pub drop_undated: bool,
}

impl Cli {
    /// Converts the parsed CLI into `CrawlControls`.
    pub fn build_controls(&self) -> CrawlControls {
        let mut scrub_phrases = vec![DEFAULT_SCRUB_PHRASE.to_string()];
        scrub_phrases.extend(
            self.scrub_phrases
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        );

        CrawlControls {
            wait_timeout: Duration::from_secs(self.wait_timeout_secs),
            short_wait: Duration::from_secs(self.short_wait_secs),
            medium_wait: Duration::from_secs(self.medium_wait_secs),
            max_workers: self.max_workers.max(1),
            max_scroll: self.max_scroll,
            base_url: self.base_url.clone(),
            data_dir: self.data_dir.clone(),
            boards: split_list(&self.boards).map(Board::named).collect(),
            scrub_phrases,
            drop_undated: self.drop_undated,
        }
    }
}

fn split_list(input: &str) -> impl Iterator<Item = &str> + '_ {
    input.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_boards_map_to_csv_files() {
        let controls = CrawlControls::default();
        assert_eq!(controls.boards().len(), 5);
        assert_eq!(controls.boards()[0], Board::named("travel"));
        assert_eq!(
            controls.output_path(&controls.boards()[0]),
            PathBuf::from("data/travel.csv")
        );
    }

    #[test]
    fn board_url_joins_root_and_name() {
        let controls = CrawlControls::default();
        let board = Board::named("food");
        assert_eq!(controls.board_url(&board), "https://www.dcard.tw/f/food");
    }

    #[test]
    fn cli_board_list_tolerates_whitespace_and_blanks() {
        let cli = Cli::parse_from(["boardcrawl", "--boards", " travel, ,exam "]);
        let controls = cli.build_controls();
        let names: Vec<&str> = controls.boards().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["travel", "exam"]);
    }

    #[test]
    fn extra_scrub_phrases_keep_the_default() {
        let cli = Cli::parse_from(["boardcrawl", "--scrub-phrase", "advertisement"]);
        let controls = cli.build_controls();
        assert_eq!(controls.scrub_phrases().len(), 2);
        assert_eq!(controls.scrub_phrases()[0], DEFAULT_SCRUB_PHRASE);
        assert_eq!(controls.scrub_phrases()[1], "advertisement");
    }

    #[test]
    fn worker_pool_never_drops_to_zero() {
        let cli = Cli::parse_from(["boardcrawl", "--max-workers", "0"]);
        assert_eq!(cli.build_controls().max_workers(), 1);
    }
}
