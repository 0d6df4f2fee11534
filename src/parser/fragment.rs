use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::numeric::parse_numeric;
use super::progress::extract_capacity;
use super::summary::price_texts;
use super::{has_class, text_of};
use crate::model::{ProjectRecord, ProjectStatus};

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3.project-title").unwrap());
static MAIN_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.project-image img").unwrap());
static CONTRACTOR_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.contractor-wrapper img").unwrap());
static INFO_WRAPPER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.project-info-wrapper").unwrap());

const SOLD_MARKER: &str = "project-status-sold";

/// A listing that lacks a structural anchor and cannot become a record.
#[derive(Debug, Error, PartialEq)]
pub enum ExtractionError {
    #[error("listing has no title")]
    MissingTitle,
    #[error("listing {title:?} has no info wrapper")]
    MissingInfoWrapper { title: String },
}

pub fn extract(fragment: ElementRef, base: &Url) -> Result<ProjectRecord, ExtractionError> {
    let status = if has_class(fragment, SOLD_MARKER) {
        ProjectStatus::SoldOut
    } else {
        ProjectStatus::Available
    };

    let title = fragment
        .select(&TITLE)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
        .ok_or(ExtractionError::MissingTitle)?;

    let wrapper = fragment
        .select(&INFO_WRAPPER)
        .next()
        .ok_or_else(|| ExtractionError::MissingInfoWrapper {
            title: title.clone(),
        })?;

    let prices = price_texts(wrapper);
    let price = |text: Option<String>| text.map(|t| parse_numeric(&t, 0.0));

    let capacity = extract_capacity(fragment, &title);

    Ok(ProjectRecord {
        image_url: image_url(fragment, &MAIN_IMAGE, base),
        thumbnail_url: image_url(fragment, &CONTRACTOR_IMAGE, base),
        purchase_price: price(prices.purchase),
        old_price: price(prices.old),
        maintenance_price: price(prices.maintenance),
        status,
        total_capacity_kw: capacity.total_kw,
        progress_percentage: capacity.progress_percentage,
        reserved_percentage: capacity.reserved_percentage,
        reserved_kw: capacity.reserved_kw,
        remaining_percentage: capacity.remaining_percentage,
        remaining_kw: capacity.remaining_kw,
        title,
    })
}

/// Absolute URL of the first image under `selector`, or empty.
fn image_url(fragment: ElementRef, selector: &Selector, base: &Url) -> String {
    let Some(src) = fragment
        .select(selector)
        .find_map(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        return String::new();
    };

    match base.join(src) {
        Ok(url) => url.to_string(),
        Err(e) => {
            debug!(src, error = %e, "Unresolvable image URL");
            String::new()
        }
    }
}
