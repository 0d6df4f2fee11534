use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::warn;

use super::numeric::parse_numeric;
use super::text_of;

static PROGRESS_BAR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.progress-bar").unwrap());
static TOTAL_TEXT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.total-text").unwrap());
static PROGRESS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.project-progress").unwrap());
static LEFT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.project-info-wrapper-stats p.left").unwrap());
static RIGHT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.project-info-wrapper-stats p.right").unwrap());
static DESC: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.desc").unwrap());

static WIDTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|;)\s*width\s*:\s*([^;]*)").unwrap());

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Capacity {
    pub total_kw: f64,
    pub progress_percentage: f64,
    pub reserved_percentage: f64,
    pub reserved_kw: f64,
    pub remaining_percentage: f64,
    pub remaining_kw: f64,
}

/// Read the capacity block of a listing. Missing pieces degrade to zero
/// with a warning naming the listing.
pub fn extract_capacity(fragment: ElementRef, title: &str) -> Capacity {
    let Some(bar) = fragment.select(&PROGRESS_BAR).next() else {
        warn!(title, "Listing has no progress bar, capacity set to 0");
        return Capacity::default();
    };

    let total_kw = match bar.select(&TOTAL_TEXT).next() {
        Some(el) => parse_numeric(&text_of(el), 0.0),
        None => {
            warn!(title, "Progress bar has no total text");
            0.0
        }
    };

    let progress_percentage = match bar
        .select(&PROGRESS)
        .next()
        .and_then(|el| el.value().attr("style"))
        .and_then(style_width)
    {
        Some(width) => parse_numeric(&width, 0.0),
        None => {
            warn!(title, "Progress element has no width style");
            0.0
        }
    };

    let (reserved_percentage, reserved_kw) = stat_pair(bar.select(&LEFT).next(), "reserved", title);
    let (remaining_percentage, remaining_kw) =
        stat_pair(bar.select(&RIGHT).next(), "remaining", title);

    Capacity {
        total_kw,
        progress_percentage,
        reserved_percentage,
        reserved_kw,
        remaining_percentage,
        remaining_kw,
    }
}

/// Value of the `width` declaration of an inline style, e.g. `"62.5%"` for
/// `"width: 62.5%"`.
pub fn style_width(style: &str) -> Option<String> {
    WIDTH_RE
        .captures(style)
        .map(|caps| caps[1].trim().to_string())
}

/// Percentage from the paragraph's own text, kW from its `span.desc`.
fn stat_pair(p: Option<ElementRef>, label: &str, title: &str) -> (f64, f64) {
    let Some(p) = p else {
        warn!(title, label, "Listing has no {} stats", label);
        return (0.0, 0.0);
    };

    let own_text: String = p
        .children()
        .filter_map(|child| child.value().as_text().map(|t| (**t).to_string()))
        .collect();
    let kw = p
        .select(&DESC)
        .next()
        .map(|desc| parse_numeric(&text_of(desc), 0.0))
        .unwrap_or(0.0);

    (parse_numeric(own_text.trim(), 0.0), kw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn capacity_of(html: &str) -> Capacity {
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("a.project-widget").unwrap();
        extract_capacity(doc.select(&sel).next().unwrap(), "test")
    }

    #[test]
    fn width_is_read_from_style() {
        assert_eq!(style_width("width: 62.5%").as_deref(), Some("62.5%"));
        assert_eq!(style_width("width:40%").as_deref(), Some("40%"));
        assert_eq!(
            style_width("background: red; WIDTH : 7% ; height: 3px").as_deref(),
            Some("7%")
        );
        assert_eq!(style_width("max-width: 10%"), None);
        assert_eq!(style_width("height: 3px"), None);
    }

    #[test]
    fn full_progress_block() {
        let c = capacity_of(
            r#"<a class="project-widget info-button">
                 <div class="progress-bar">
                   <div class="total-text">Iš viso: 1 250 kW</div>
                   <div class="project-progress" style="width: 62.5%"></div>
                   <div class="project-info-wrapper-stats">
                     <p class="left">62,5 % <span class="desc">781,25 kW</span></p>
                     <p class="right">37,5 % <span class="desc">468,75 kW</span></p>
                   </div>
                 </div>
               </a>"#,
        );
        assert_eq!(
            c,
            Capacity {
                total_kw: 1250.0,
                progress_percentage: 62.5,
                reserved_percentage: 62.5,
                reserved_kw: 781.25,
                remaining_percentage: 37.5,
                remaining_kw: 468.75,
            }
        );
    }

    #[test]
    fn missing_progress_bar_degrades_to_zero() {
        let c = capacity_of(r#"<a class="project-widget"><h3>no bar</h3></a>"#);
        assert_eq!(c, Capacity::default());
    }

    #[test]
    fn missing_stats_keep_total() {
        let c = capacity_of(
            r#"<a class="project-widget">
                 <div class="progress-bar">
                   <div class="total-text">300 kW</div>
                   <div class="project-progress"></div>
                 </div>
               </a>"#,
        );
        assert_eq!(c.total_kw, 300.0);
        assert_eq!(c.progress_percentage, 0.0);
        assert_eq!(c.reserved_kw, 0.0);
        assert_eq!(c.remaining_percentage, 0.0);
    }
}
