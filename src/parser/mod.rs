pub mod extract;
pub mod html;

use crate::record::PolicyRecord;
use extract::Engine;

/// A detail page as it came off the wire.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    /// Anchor text of the link that led here.
    pub link_title: String,
    pub html: String,
}

/// Body length bounds, in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLimits {
    /// Bodies not longer than this are dropped.
    pub min_chars: usize,
    /// Bodies are cut to this length before extraction.
    pub max_chars: usize,
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self {
            min_chars: 200,
            max_chars: 8000,
        }
    }
}

/// HTML → page text → engine. `None` when the page has too little text to
/// be a policy document.
pub fn process_page(page: &FetchedPage, engine: &Engine, limits: ContentLimits) -> Option<PolicyRecord> {
    let text = html::page_text(&page.html);

    let body: String = text.body.chars().take(limits.max_chars).collect();
    if body.chars().count() <= limits.min_chars {
        return None;
    }

    let title = if text.title.is_empty() {
        page.link_title.trim()
    } else {
        text.title.as_str()
    };

    Some(engine.extract(&page.url, title, &body))
}
