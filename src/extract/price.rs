//! Price disambiguation.
//!
//! Detail pages frequently show a monthly financing figure next to the sale
//! price. Candidates are partitioned by digit count and validated against
//! the car's age to tell the two apart. The thresholds below are behavioral
//! constants tuned against the live site; they are preserved exactly, not
//! re-derived.

use std::sync::LazyLock;

use regex::Regex;

/// A price with at most this many digits is a "short" candidate, which on
/// a young car is almost certainly a monthly payment.
const SHORT_CANDIDATE_MAX_DIGITS: usize = 4;
/// Cars younger than this cannot plausibly sell for a 4-digit price.
const YOUNG_CAR_AGE: u32 = 10;
/// Cars at least this old can legitimately be cheap.
const OLD_CAR_AGE: u32 = 20;
/// Below this, an old car's price is accepted without the range check.
const OLD_CAR_CHEAP_CEILING: u32 = 10_000;
/// General plausible sale-price range.
const PRICE_MIN: u32 = 1_000;
const PRICE_MAX: u32 = 2_000_000;
/// Tighter range for the last-resort JSON-pattern price.
const JSON_PRICE_MIN: u32 = 10_000;
const JSON_PRICE_MAX: u32 = 1_000_000;

static JSON_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""price":(\d+)"#).unwrap());

/// Validate a price candidate against the car's age.
///
/// Unknown age always validates: the rule exists to reject financing
/// figures, and without an age there is nothing to reject against.
pub fn is_valid_price_for_age(price: u32, car_age: Option<u32>) -> bool {
    let Some(age) = car_age else {
        return true;
    };

    if age < YOUNG_CAR_AGE && digit_count(price) <= SHORT_CANDIDATE_MAX_DIGITS {
        return false;
    }
    if age >= OLD_CAR_AGE && price < OLD_CAR_CHEAP_CEILING {
        return true;
    }
    (PRICE_MIN..=PRICE_MAX).contains(&price)
}

/// Extract the sale price from the price element's text, falling back to a
/// JSON `"price":<n>` pattern anywhere in the page.
pub fn extract_price(price_text: &str, full_html: &str, car_age: Option<u32>) -> Option<u32> {
    if let Some(price) = price_from_text(price_text, car_age) {
        return Some(price);
    }
    price_from_json(full_html)
}

fn price_from_text(price_text: &str, car_age: Option<u32>) -> Option<u32> {
    let candidates = numeric_candidates(price_text);

    match candidates.len() {
        0 => None,
        1 => {
            let price = candidates[0];
            is_valid_price_for_age(price, car_age).then_some(price)
        }
        _ => {
            // Long candidates are sale prices; short ones financing figures.
            let long: Vec<u32> = candidates
                .iter()
                .copied()
                .filter(|p| digit_count(*p) > SHORT_CANDIDATE_MAX_DIGITS)
                .collect();

            let valid_long = long
                .iter()
                .copied()
                .filter(|p| is_valid_price_for_age(*p, car_age))
                .max();
            if let Some(price) = valid_long {
                return Some(price);
            }
            // Age may simply be wrong; a long candidate still beats nothing.
            if let Some(price) = long.into_iter().max() {
                return Some(price);
            }
            candidates
                .into_iter()
                .filter(|p| is_valid_price_for_age(*p, car_age))
                .max()
        }
    }
}

/// Harvest whitespace-separated numbers, ignoring currency symbols and
/// thousands separators.
fn numeric_candidates(text: &str) -> Vec<u32> {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_digit() || c.is_whitespace() {
                c
            } else if c == ',' {
                '\u{0}' // joins digit groups: "85,000" -> "85000"
            } else {
                ' '
            }
        })
        .filter(|c| *c != '\u{0}')
        .collect();

    cleaned
        .split_whitespace()
        .filter_map(|s| s.parse::<u32>().ok())
        .collect()
}

/// Last-resort price from an embedded JSON pattern. Accepted in a tight
/// range without age validation.
fn price_from_json(html: &str) -> Option<u32> {
    let price: u32 = JSON_PRICE_RE
        .captures(html)?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    (JSON_PRICE_MIN..=JSON_PRICE_MAX)
        .contains(&price)
        .then_some(price)
}

fn digit_count(n: u32) -> usize {
    if n == 0 {
        1
    } else {
        (n.ilog10() + 1) as usize
    }
}
