use std::collections::HashSet;
use std::sync::LazyLock;

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

fn selectors(list: &[&str]) -> Vec<Selector> {
    list.iter().map(|s| Selector::parse(s).unwrap()).collect()
}

static TITLE_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        "h1", "h2", "h3", ".title", ".art-title", ".page-title",
        "[class*=\"title\"]", "[class*=\"head\"]", ".main-title", ".news-title",
    ])
});

static CONTENT_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        ".content", ".art-content", ".main-content", ".policy-content",
        "[class*=\"content\"]", ".main", "article", ".detail", ".text", ".body",
    ])
});

static LINK_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        "a[href*=\"detail\"]", "a[href*=\"article\"]", "a[href*=\"policy\"]",
        "a[href*=\"talent\"]", "a[href*=\"人才\"]", ".list-item a", ".title a",
        ".policy-title a", ".news-title a", "li a", ".content a",
    ])
});

/// Chrome inside a content block.
static CONTENT_CHROME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("nav, .nav, .menu, .breadcrumb, .pagination, .sidebar, script, style, noscript")
        .unwrap()
});

/// Chrome around the whole page, used when no content block is found.
static PAGE_CHROME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "nav, .nav, .menu, .sidebar, .footer, .header, .breadcrumb, script, style, noscript",
    )
    .unwrap()
});

static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "tr", "table", "section", "article",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "footer", "blockquote", "pre",
];

const TITLE_MIN_CHARS: usize = 5;
const TITLE_MAX_CHARS: usize = 200;
const CONTENT_ACCEPT_CHARS: usize = 200;
const CONTENT_FALLBACK_CHARS: usize = 100;

/// Title and plain-text body recovered from a detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageText {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    pub title: String,
    pub url: String,
}

pub fn page_text(html: &str) -> PageText {
    let document = Html::parse_document(html);
    PageText {
        title: probe_title(&document).unwrap_or_default(),
        body: probe_body(&document),
    }
}

/// First title candidate of plausible length, in selector order.
fn probe_title(document: &Html) -> Option<String> {
    TITLE_SELECTORS.iter().find_map(|sel| {
        let elem = document.select(sel).next()?;
        let text: String = elem.text().map(str::trim).collect();
        let len = text.chars().count();
        (len > TITLE_MIN_CHARS && len < TITLE_MAX_CHARS).then_some(text)
    })
}

fn probe_body(document: &Html) -> String {
    let mut content = String::new();
    for sel in CONTENT_SELECTORS.iter() {
        if let Some(elem) = document.select(sel).next() {
            content = element_text(elem, &CONTENT_CHROME);
            if content.chars().count() > CONTENT_ACCEPT_CHARS {
                break;
            }
        }
    }

    if content.chars().count() < CONTENT_FALLBACK_CHARS {
        if let Some(body) = document.select(&BODY).next() {
            content = element_text(body, &PAGE_CHROME);
        }
    }
    content
}

/// Visible text under `root`, skipping `skip` subtrees. Block elements
/// become line breaks so sentence splitting sees paragraph boundaries.
pub fn element_text(root: ElementRef<'_>, skip: &Selector) -> String {
    let mut out = String::new();
    collect_text(root, skip, &mut out);
    out.trim().to_string()
}

fn collect_text(element: ElementRef<'_>, skip: &Selector, out: &mut String) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if skip.matches(&el) {
                continue;
            }
            let block = BLOCK_TAGS.contains(&el.value().name());
            if block {
                line_break(out);
            }
            collect_text(el, skip, out);
            if block {
                line_break(out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text.trim());
        }
    }
}

fn line_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Anchors that look like policy links, resolved against `base` and
/// deduplicated by href, in selector order.
pub fn policy_links(html: &str, base: &Url, is_relevant: impl Fn(&str) -> bool) -> Vec<LinkCandidate> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for sel in LINK_SELECTORS.iter() {
        for a in document.select(sel) {
            let Some(href) = a.value().attr("href").map(str::trim) else {
                continue;
            };
            if href.is_empty() || seen.contains(href) {
                continue;
            }
            let title: String = a.text().map(str::trim).collect();
            if title.chars().count() <= 3 || !is_relevant(&title) {
                continue;
            }
            let Ok(url) = base.join(href) else {
                continue;
            };
            if !matches!(url.scheme(), "http" | "https") {
                continue;
            }
            seen.insert(href.to_string());
            links.push(LinkCandidate {
                title,
                url: url.to_string(),
            });
        }
    }

    links
}

// ── Tests ──
