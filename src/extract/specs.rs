//! Structured specification extraction from detail pages.
//!
//! The site renders vehicle attributes as definition-list pairs with the
//! label in `<dd>` and the value in the following `<dt>` (inverted from the
//! HTML convention, but that is what ships). Each field falls back to a
//! free-text regex over the whole page when the labeled pair is missing.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

pub const LABEL_DATE_ON_ROAD: &str = "תאריך עליה לכביש";
pub const LABEL_MILEAGE: &str = "קילומטראז׳";
pub const LABEL_FUEL: &str = "סוג מנוע";
pub const LABEL_TRANSMISSION: &str = "תיבת הילוכים";
pub const LABEL_ENGINE_SIZE: &str = "נפח מנוע";
pub const LABEL_COLOR: &str = "צבע";
pub const LABEL_CONDITION: &str = "מצב";
pub const LABEL_CURRENT_OWNERSHIP: &str = "בעלות נוכחית";
pub const LABEL_PREVIOUS_OWNERSHIP: &str = "בעלות קודמת";
pub const LABEL_SEATS: &str = "מושבים";
pub const LABEL_OWNER: &str = "יד";

static DATE_ON_ROAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2})/(\d{4})").unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").unwrap());
static MILEAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\d,]+)\s*ק"מ"#).unwrap());
static TRANSMISSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(אוטומטית|אוטומט|רובוטית|ידנית|ידני)").unwrap());
static FUEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(בנזין|דיזל|היברידי|חשמלי)").unwrap());
static COLOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(לבן|שחור|כסוף|כסף|אפור|כחול|אדום|ירוק|צהוב|חום|בז')").unwrap()
});
static OWNER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"יד\s*(\d+)").unwrap());

/// Value of the definition-list pair whose label contains `label`.
pub fn labeled_value(document: &Html, label: &str) -> Option<String> {
    let dd_sel = Selector::parse("dd").expect("static selector");
    for dd in document.select(&dd_sel) {
        let dd_text: String = dd.text().collect();
        if !dd_text.contains(label) {
            continue;
        }
        if let Some(value) = next_element_named(dd, "dt") {
            let text = normalized_text(value);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Registration date in `MM/YYYY` form, from its labeled pair.
pub fn date_on_road(document: &Html) -> Option<String> {
    let value = labeled_value(document, LABEL_DATE_ON_ROAD)?;
    DATE_ON_ROAD_RE
        .find(&value)
        .map(|m| m.as_str().to_string())
}

/// Year component of an `MM/YYYY` registration date.
pub fn year_from_date_on_road(date: &str) -> Option<u32> {
    DATE_ON_ROAD_RE
        .captures(date)
        .and_then(|cap| cap.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// First plausible model year anywhere in the page text.
pub fn free_text_year(text: &str) -> Option<u32> {
    YEAR_RE
        .captures(text)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn mileage(document: &Html, page_text: &str) -> Option<u32> {
    if let Some(value) = labeled_value(document, LABEL_MILEAGE) {
        if let Some(km) = parse_grouped_number(&value) {
            return Some(km);
        }
    }
    MILEAGE_RE
        .captures(page_text)
        .and_then(|cap| cap.get(1))
        .and_then(|m| parse_grouped_number(m.as_str()))
}

pub fn fuel_type(document: &Html, page_text: &str) -> Option<String> {
    labeled_value(document, LABEL_FUEL)
        .or_else(|| regex_match(&FUEL_RE, page_text))
}

pub fn transmission(document: &Html, page_text: &str) -> Option<String> {
    labeled_value(document, LABEL_TRANSMISSION)
        .or_else(|| regex_match(&TRANSMISSION_RE, page_text))
}

/// Engine displacement, kept as text. Shown grouped ("1,600"); separators
/// are stripped.
pub fn engine_size(document: &Html) -> Option<String> {
    labeled_value(document, LABEL_ENGINE_SIZE).map(|v| v.replace(',', ""))
}

pub fn color(document: &Html, page_text: &str) -> Option<String> {
    labeled_value(document, LABEL_COLOR)
        .or_else(|| regex_match(&COLOR_RE, page_text))
}

pub fn condition(document: &Html) -> Option<String> {
    labeled_value(document, LABEL_CONDITION)
}

pub fn current_ownership(document: &Html) -> Option<String> {
    labeled_value(document, LABEL_CURRENT_OWNERSHIP)
}

pub fn previous_ownership(document: &Html) -> Option<String> {
    labeled_value(document, LABEL_PREVIOUS_OWNERSHIP)
}

pub fn seats(document: &Html) -> Option<u32> {
    labeled_value(document, LABEL_SEATS).and_then(|v| v.trim().parse().ok())
}

/// Owner ordinal ("יד 2" means second owner). The term/value span pair is
/// preferred; a free-text sweep catches it when the markup shifts.
pub fn owner_number(document: &Html, page_text: &str) -> Option<u32> {
    let span_sel = Selector::parse("span").expect("static selector");
    for span in document.select(&span_sel) {
        let text: String = span.text().collect();
        if text.trim() != LABEL_OWNER {
            continue;
        }
        if let Some(value) = next_element_named(span, "span") {
            if let Some(n) = first_integer(&normalized_text(value)) {
                return Some(n);
            }
        }
    }
    OWNER_RE
        .captures(page_text)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn next_element_named<'a>(element: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == name)
}

fn normalized_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn regex_match(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

fn parse_grouped_number(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn first_integer(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
