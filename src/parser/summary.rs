//! Price columns of a listing's info wrapper.
//!
//! The wrapper holds an ordered list of `div.project-summary-col` blocks.
//! Roles are assigned by marker and position, never by re-querying shape:
//! the block marked `summary-with-discount` (else the first block) carries
//! the purchase price, the second block carries the yearly maintenance price.
//! The struck-through old price may sit anywhere under the wrapper.

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{has_class, text_of};

static SUMMARY_COL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.project-summary-col").unwrap());
static INFO: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.project-info").unwrap());
static OLD_PRICE_INFO: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.old-price-line div.project-info").unwrap());

const DISCOUNT_MARKER: &str = "summary-with-discount";
const OLD_PRICE_LINE: &str = "old-price-line";

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryBlock {
    pub discounted: bool,
    /// Text of the block's current value, excluding any old-price line.
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTexts {
    pub purchase: Option<String>,
    pub old: Option<String>,
    pub maintenance: Option<String>,
}

/// Price texts of one info wrapper.
pub fn price_texts(wrapper: ElementRef) -> PriceTexts {
    let old = wrapper.select(&OLD_PRICE_INFO).next().map(text_of);
    assign_roles(&summary_blocks(wrapper), old)
}

pub fn summary_blocks(wrapper: ElementRef) -> Vec<SummaryBlock> {
    wrapper
        .select(&SUMMARY_COL)
        .map(|col| SummaryBlock {
            discounted: has_class(col, DISCOUNT_MARKER),
            value: col
                .select(&INFO)
                .find(|info| !inside_old_price_line(*info, col))
                .map(text_of),
        })
        .collect()
}

pub fn assign_roles(blocks: &[SummaryBlock], old: Option<String>) -> PriceTexts {
    let purchase_block = blocks
        .iter()
        .find(|b| b.discounted)
        .or_else(|| blocks.first());

    PriceTexts {
        purchase: purchase_block.and_then(|b| b.value.clone()),
        old,
        maintenance: blocks.get(1).and_then(|b| b.value.clone()),
    }
}

fn inside_old_price_line(node: ElementRef, stop: ElementRef) -> bool {
    node.ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|el| el.id() != stop.id())
        .any(|el| has_class(el, OLD_PRICE_LINE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn with_wrapper<T>(html: &str, f: impl FnOnce(ElementRef) -> T) -> T {
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("div.project-info-wrapper").unwrap();
        f(doc.select(&sel).next().unwrap())
    }

    fn blocks_of(html: &str) -> Vec<SummaryBlock> {
        with_wrapper(html, summary_blocks)
    }

    fn prices_of(html: &str) -> PriceTexts {
        with_wrapper(html, price_texts)
    }

    #[test]
    fn plain_columns_take_roles_by_position() {
        let html = r#"<div class="project-info-wrapper tree-colums">
                 <div class="project-summary-col"><div class="project-info">1 140,00 €</div></div>
                 <div class="project-summary-col"><div class="project-info">24,50 €</div></div>
               </div>"#;
        assert_eq!(blocks_of(html).len(), 2);
        let roles = prices_of(html);
        assert_eq!(roles.purchase.as_deref(), Some("1 140,00 €"));
        assert_eq!(roles.maintenance.as_deref(), Some("24,50 €"));
        assert_eq!(roles.old, None);
    }

    #[test]
    fn discounted_column_wins_and_skips_old_price_line() {
        let html = r#"<div class="project-info-wrapper tree-colums">
                 <div class="project-summary-col summary-with-discount">
                   <div class="old-price-line"><div class="project-info">1 050,00 €</div></div>
                   <div class="project-info">949,99 €</div>
                 </div>
                 <div class="project-summary-col"><div class="project-info">19,90 €</div></div>
               </div>"#;
        assert!(blocks_of(html)[0].discounted);
        let roles = prices_of(html);
        assert_eq!(roles.purchase.as_deref(), Some("949,99 €"));
        assert_eq!(roles.old.as_deref(), Some("1 050,00 €"));
        // Maintenance is the second column, not the discounted one again.
        assert_eq!(roles.maintenance.as_deref(), Some("19,90 €"));
    }

    #[test]
    fn single_column_has_no_maintenance() {
        let roles = prices_of(
            r#"<div class="project-info-wrapper">
                 <div class="project-summary-col"><div class="project-info">500 €</div></div>
               </div>"#,
        );
        assert_eq!(roles.purchase.as_deref(), Some("500 €"));
        assert_eq!(roles.maintenance, None);
    }

    #[test]
    fn empty_wrapper_yields_nothing() {
        let roles = prices_of(r#"<div class="project-info-wrapper"></div>"#);
        assert_eq!(roles, PriceTexts::default());
    }

    #[test]
    fn old_price_line_outside_columns_is_found() {
        let roles = prices_of(
            r#"<div class="project-info-wrapper tree-colums">
                 <div class="old-price-line"><div class="project-info">1 050,00 €</div></div>
                 <div class="project-summary-col summary-with-discount">
                   <div class="project-info">949,99 €</div>
                 </div>
                 <div class="project-summary-col"><div class="project-info">19,90 €</div></div>
               </div>"#,
        );
        assert_eq!(roles.purchase.as_deref(), Some("949,99 €"));
        assert_eq!(roles.old.as_deref(), Some("1 050,00 €"));
        assert_eq!(roles.maintenance.as_deref(), Some("19,90 €"));
    }
}
