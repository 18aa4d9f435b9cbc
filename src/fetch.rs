use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::FetchSettings;
use crate::parser::html::LinkCandidate;
use crate::parser::FetchedPage;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(u16),
    #[error("response too short: {0} bytes")]
    TooShort(usize),
}

/// Raw outcome of a single GET, before any success policy is applied.
#[derive(Debug, Clone)]
pub struct Probe {
    pub status: u16,
    pub bytes: usize,
    pub text: String,
}

/// Fetch stats returned after completion.
pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Shared HTTP client with the crawler's user agent and timeout.
pub struct Fetcher {
    client: reqwest::Client,
    min_page_bytes: usize,
}

impl Fetcher {
    pub fn new(user_agent: &str, timeout: Duration, min_page_bytes: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            min_page_bytes,
        })
    }

    pub fn from_settings(settings: &FetchSettings) -> Result<Self, FetchError> {
        Self::new(
            &settings.user_agent,
            Duration::from_secs(settings.timeout_secs),
            settings.min_page_bytes,
        )
    }

    /// Shorter timeout, no size floor: verification wants to see every response.
    pub fn for_verification(settings: &FetchSettings) -> Result<Self, FetchError> {
        Self::new(
            &settings.user_agent,
            Duration::from_secs(settings.verify_timeout_secs),
            0,
        )
    }

    /// Page body as text. Non-2xx and near-empty responses are errors.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let probe = self.probe(url).await?;
        if !(200..300).contains(&probe.status) {
            return Err(FetchError::Status(probe.status));
        }
        if probe.bytes < self.min_page_bytes {
            return Err(FetchError::TooShort(probe.bytes));
        }
        Ok(probe.text)
    }

    pub async fn probe(&self, url: &str) -> Result<Probe, FetchError> {
        let start = Instant::now();
        let resp = self.client.get(url).send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        debug!(url, status, bytes = body.len(), latency_ms, "fetched");
        Ok(Probe {
            status,
            bytes: body.len(),
            text: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

pub fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
        .map(|s| s.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Fetch detail pages concurrently. Results arrive in completion order;
/// failures are logged and counted, never retried.
pub async fn fetch_pages(
    fetcher: Arc<Fetcher>,
    links: Vec<LinkCandidate>,
    concurrency: usize,
) -> (Vec<FetchedPage>, FetchStats) {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let total = links.len();
    let pb = progress_bar(total);

    // Channel: workers send results, main loop collects them
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Result<FetchedPage, FetchError>>(concurrency.max(1) * 2);

    for link in links {
        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let result = match fetcher.fetch(&link.url).await {
                Ok(html) => Ok(FetchedPage {
                    url: link.url,
                    link_title: link.title,
                    html,
                }),
                Err(e) => {
                    warn!(url = %link.url, "fetch failed: {}", e);
                    Err(e)
                }
            };
            let _ = tx.send(result).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut pages = Vec::with_capacity(total);
    let mut errors = 0usize;
    while let Some(result) = rx.recv().await {
        match result {
            Ok(page) => pages.push(page),
            Err(_) => errors += 1,
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    let ok = pages.len();
    info!("Fetched {} pages ({} ok, {} errors)", total, ok, errors);

    (pages, FetchStats { total, ok, errors })
}
