pub mod fragment;
pub mod numeric;
pub mod progress;
pub mod summary;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::model::ProjectRecord;

static LISTING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a.project-widget").unwrap());

/// Records extracted from one listing page.
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub records: Vec<ProjectRecord>,
    /// Listings skipped for lacking a required anchor.
    pub dropped: usize,
}

/// Markup → records. One malformed listing never aborts the page.
pub fn parse_page(html: &str, base: &Url) -> PageExtraction {
    let document = Html::parse_document(html);
    let mut out = PageExtraction::default();

    for (index, listing) in document.select(&LISTING).enumerate() {
        match fragment::extract(listing, base) {
            Ok(record) => out.records.push(record),
            Err(e) => {
                warn!(index, "Skipping listing: {}", e);
                out.dropped += 1;
            }
        }
    }

    debug!(
        records = out.records.len(),
        dropped = out.dropped,
        "Parsed listing page"
    );
    out
}

pub(crate) fn has_class(el: ElementRef, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Element text with whitespace runs collapsed and trimmed.
pub(crate) fn text_of(el: ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
