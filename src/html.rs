//! Fetching and structural extraction over third-party HTML pages.
//!
//! The sources this crate scrapes serve markup that is occasionally
//! malformed; parsing is delegated to `scraper`, which never fails on bad
//! input, and individual selector misses degrade to absent fields rather
//! than failing a whole extraction. Retrieval problems — transport errors,
//! non-2xx statuses, empty bodies — all collapse into a single failure
//! outcome; callers never distinguish further.

use crate::Result;
use ohno::EnrichableExt;
use ohno::app_err;
use scraper::{ElementRef, Html, Selector};

const LOG_TARGET: &str = "      html";

/// Fetch a URL, treating transport errors, non-2xx responses, and empty
/// bodies as one and the same retrieval failure.
pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ohno::AppError::new(e).enrich_with(|| format!("retrieval failed for '{url}'")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(app_err!("retrieval failed for '{url}': status {status}"));
    }

    let body = response
        .text()
        .await
        .map_err(|e| ohno::AppError::new(e).enrich_with(|| format!("retrieval failed for '{url}'")))?;

    if body.is_empty() {
        return Err(app_err!("retrieval failed for '{url}': empty body"));
    }

    Ok(body)
}

/// A parsed HTML document with lenient structural query helpers.
///
/// Not `Send`; parse results must be extracted into owned data before the
/// caller's next await point.
pub struct Document {
    html: Html,
}

impl core::fmt::Debug for Document {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Document").finish_non_exhaustive()
    }
}

impl Document {
    /// Parse a document. Malformed markup is tolerated; the parser recovers
    /// the way browsers do.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }

    /// Cleaned text content of the first node matching `selector`, if any.
    #[must_use]
    pub fn text(&self, selector: &str) -> Option<String> {
        let sel = compile(selector)?;
        self.html.select(&sel).next().map(element_text)
    }

    /// An attribute of the first node matching `selector`, if present.
    #[must_use]
    pub fn attr(&self, selector: &str, name: &str) -> Option<String> {
        let sel = compile(selector)?;
        self.html
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr(name))
            .map(str::to_owned)
    }

    /// Cleaned text content of every node matching `selector`.
    #[must_use]
    pub fn texts(&self, selector: &str) -> Vec<String> {
        let Some(sel) = compile(selector) else {
            return Vec::new();
        };
        self.html.select(&sel).map(element_text).collect()
    }

    /// The value of `name` on every node matching `selector`, skipping nodes
    /// where the attribute is absent.
    #[must_use]
    pub fn attrs(&self, selector: &str, name: &str) -> Vec<String> {
        let Some(sel) = compile(selector) else {
            return Vec::new();
        };
        self.html
            .select(&sel)
            .filter_map(|el| el.value().attr(name))
            .map(str::to_owned)
            .collect()
    }

    /// All elements matching `selector`, for callers that need per-item
    /// sub-queries.
    #[must_use]
    pub fn elements(&self, selector: &str) -> Vec<ElementRef<'_>> {
        let Some(sel) = compile(selector) else {
            return Vec::new();
        };
        self.html.select(&sel).collect()
    }
}

/// Compile a CSS selector, logging and yielding `None` on syntax errors so a
/// bad query degrades to an absent field instead of a panic.
#[must_use]
pub fn compile(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            log::debug!(target: LOG_TARGET, "Invalid selector '{selector}': {e}");
            None
        }
    }
}

/// Cleaned text content of an element: concatenated text nodes, trimmed,
/// with internal tab runs collapsed away.
#[must_use]
pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// An attribute of the first child of `element` matching `selector`.
#[must_use]
pub fn child_attr(element: ElementRef<'_>, selector: &str, name: &str) -> Option<String> {
    let sel = compile(selector)?;
    element
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr(name))
        .map(str::to_owned)
}

/// Cleaned text of the first child of `element` matching `selector`.
#[must_use]
pub fn child_text(element: ElementRef<'_>, selector: &str) -> Option<String> {
    let sel = compile(selector)?;
    element.select(&sel).next().map(element_text)
}

/// Trim and collapse internal tab runs out of scraped text.
#[must_use]
pub fn clean_text(raw: &str) -> String {
    raw.replace('\t', "").trim().to_owned()
}

/// Parse a number leniently: every non-digit character (thousands
/// separators, labels, whitespace) is stripped first; unparseable input
/// yields 0.
#[must_use]
pub fn lenient_number(raw: &str) -> u64 {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}
