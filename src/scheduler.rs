//! Crawl runner coordinating discovery, extraction workers, and persistence.
//!
//! Discovery runs one board at a time because a single renderer session
//! serves the whole run. Extraction fans the flattened work list out to a
//! fixed-size worker pool; renderer access is serialized inside each task,
//! so the pool size is a submission ceiling rather than true parallelism.

use crate::controls::CrawlControls;
use crate::dataset::write_raw_dataset;
use crate::discover::discover_links;
use crate::error::Result;
use crate::extract::{extract_content, ProcessedLinks, RawRecord};
use crate::renderer::Renderer;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

const PROGRESS_EVERY: usize = 10;

struct ExtractJob {
    board: usize,
    url: String,
}

struct JobOutcome {
    board: usize,
    record: Option<RawRecord>,
}

/// Crawls every configured board and writes one dataset per board.
///
/// An individual extraction failure or skip never aborts the run; boards
/// with zero surviving records produce no file and that is not an error.
pub async fn crawl_boards(renderer: Arc<Renderer>, controls: Arc<CrawlControls>) -> Result<()> {
    let start = Instant::now();
    let metrics = Arc::new(Metrics::default());

    // Phase 1: discovery, sequential across boards on the shared session.
    let mut work = Vec::new();
    for (index, board) in controls.boards().iter().enumerate() {
        let links = discover_links(&renderer, &controls, board).await;
        info!(board = %board.name, links = links.len(), "link discovery finished");
        metrics.record_links_discovered(links.len());
        work.extend(links.into_iter().map(|link| ExtractJob {
            board: index,
            url: link.url,
        }));
    }

    // Phase 2: one global work list drained by the worker pool.
    let total = work.len();
    let (job_tx, job_rx) = mpsc::channel(total.max(1));
    for job in work {
        if job_tx.send(job).await.is_err() {
            break;
        }
    }
    drop(job_tx);

    let jobs = Arc::new(Mutex::new(job_rx));
    let processed = Arc::new(ProcessedLinks::new());
    let (outcome_tx, mut outcome_rx) = mpsc::channel(controls.max_workers());

    let mut workers = Vec::with_capacity(controls.max_workers());
    for id in 0..controls.max_workers() {
        workers.push(spawn_worker(
            id,
            Arc::clone(&jobs),
            outcome_tx.clone(),
            Arc::clone(&renderer),
            Arc::clone(&controls),
            Arc::clone(&processed),
        ));
    }
    drop(outcome_tx);

    let mut results: Vec<Vec<RawRecord>> =
        controls.boards().iter().map(|_| Vec::new()).collect();
    let mut done = 0usize;
    while let Some(outcome) = outcome_rx.recv().await {
        done += 1;
        match outcome.record {
            Some(record) => {
                metrics.record_extracted();
                results[outcome.board].push(record);
            }
            None => metrics.record_skip(),
        }
        if done % PROGRESS_EVERY == 0 || done == total {
            info!(done, total, "extraction progress");
        }
    }
    join_all(workers).await;

    // Phase 3: persist every board with at least one surviving record.
    for (board, records) in controls.boards().iter().zip(&results) {
        if records.is_empty() {
            info!(board = %board.name, "no records survived, no dataset written");
            continue;
        }
        let path = controls.output_path(board);
        write_raw_dataset(&path, records)?;
        metrics.record_rows_saved(records.len());
        info!(
            board = %board.name,
            rows = records.len(),
            path = %path.display(),
            "dataset saved"
        );
    }

    metrics.report(start.elapsed());
    Ok(())
}

fn spawn_worker(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<ExtractJob>>>,
    outcomes: mpsc::Sender<JobOutcome>,
    renderer: Arc<Renderer>,
    controls: Arc<CrawlControls>,
    processed: Arc<ProcessedLinks>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let job = {
                let mut queue = jobs.lock().await;
                queue.recv().await
            };
            let Some(job) = job else {
                break;
            };

            let record = extract_content(&renderer, &processed, &controls, &job.url).await;
            let outcome = JobOutcome {
                board: job.board,
                record,
            };
            if outcomes.send(outcome).await.is_err() {
                break;
            }
        }
        debug!(worker = id, "worker drained");
    })
}

#[derive(Default)]
struct Metrics {
    links_discovered: AtomicUsize,
    records_extracted: AtomicUsize,
    skips: AtomicUsize,
    rows_saved: AtomicUsize,
}

impl Metrics {
    fn record_links_discovered(&self, count: usize) {
        self.links_discovered.fetch_add(count, Ordering::Relaxed);
    }

    fn record_extracted(&self) {
        self.records_extracted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skip(&self) {
        self.skips.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rows_saved(&self, count: usize) {
        self.rows_saved.fetch_add(count, Ordering::Relaxed);
    }

    fn report(&self, elapsed: Duration) {
        info!(
            elapsed_secs = format_args!("{:.2}", elapsed.as_secs_f32()),
            links_discovered = self.links_discovered.load(Ordering::Relaxed),
            records_extracted = self.records_extracted.load(Ordering::Relaxed),
            skips = self.skips.load(Ordering::Relaxed),
            rows_saved = self.rows_saved.load(Ordering::Relaxed),
            "crawl finished"
        );
    }
}
