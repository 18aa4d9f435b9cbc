use std::collections::HashSet;

use reqwest::Url;
use tracing::{info, warn};

use crate::config::Settings;
use crate::fetch::Fetcher;
use crate::parser::html::{self, LinkCandidate};

/// Walk the seed listing pages and return talent-related detail links,
/// deduplicated and capped at `fetch.max_details`.
pub async fn discover_links(fetcher: &Fetcher, settings: &Settings) -> Vec<LinkCandidate> {
    let mut batches = Vec::with_capacity(settings.seeds.len());

    for seed in &settings.seeds {
        let base = match Url::parse(seed) {
            Ok(u) => u,
            Err(e) => {
                warn!(seed = %seed, "invalid seed URL: {}", e);
                continue;
            }
        };

        info!("Fetching listing: {}", seed);
        match fetcher.fetch(seed).await {
            Ok(page) => {
                let links = html::policy_links(&page, &base, |t| settings.is_talent_related(t));
                info!(seed = %seed, found = links.len(), "listing scanned");
                batches.push(links);
            }
            Err(e) => warn!(seed = %seed, "listing fetch failed: {}", e),
        }
    }

    let links = merge_links(batches, settings.fetch.max_details);
    info!("Talent-related links after dedupe: {}", links.len());
    links
}

/// Concatenate per-seed batches, keep the first occurrence of each URL,
/// stop at `limit`.
pub fn merge_links(batches: Vec<Vec<LinkCandidate>>, limit: usize) -> Vec<LinkCandidate> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|l| seen.insert(l.url.clone()))
        .take(limit)
        .collect()
}
