//! Listing token validation and URL normalization.

use url::Url;

/// Path segment that marks a listing detail URL.
pub const LISTING_PATH: &str = "/item/";

/// Check whether a token looks like a supported listing identifier.
///
/// Valid tokens are short alphanumeric codes, 4-10 characters, with at
/// least one letter. Long pure-numeric identifiers belong to a different,
/// unsupported URL scheme.
pub fn is_likely_valid_identifier(token: &str) -> bool {
    let len = token.chars().count();
    if !(4..=10).contains(&len) {
        return false;
    }
    if !token.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    // Reject pure numerics.
    token.chars().any(|c| c.is_ascii_alphabetic())
}

/// Extract the listing token from a URL or path containing `/item/`.
///
/// Query parameters and fragments are dropped; the token is not validated.
pub fn token_from_url(url: &str) -> Option<&str> {
    let idx = url.find(LISTING_PATH)?;
    let rest = &url[idx + LISTING_PATH.len()..];
    let end = rest
        .find(['?', '#', '/'])
        .unwrap_or(rest.len());
    let token = &rest[..end];
    (!token.is_empty()).then_some(token)
}

/// Normalize a listing URL to its canonical `{base}/item/{token}` form.
///
/// The same listing reached through different marketing parameters collapses
/// to one entry. Inside the pipeline that collapse happens at the token
/// level (`token_from_url` plus the discovery dedup set); this is the URL
/// form of the same guarantee for callers that persist or compare listing
/// URLs rather than tokens. Idempotent; URLs without a listing path pass
/// through unchanged.
pub fn normalize_listing_url(url: &str) -> String {
    let Some(token) = token_from_url(url) else {
        return url.to_string();
    };
    let base = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.host_str()
                .map(|host| format!("{}://{}", u.scheme(), host))
        })
        .unwrap_or_else(|| "https://www.yad2.co.il".to_string());
    format!("{}{}{}", base, LISTING_PATH, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_short_alphanumeric_tokens() {
        for token in ["7liq5ya4", "6f8xhc0x", "nipalgim", "lnlj3vvb", "kii3ai7e"] {
            assert!(is_likely_valid_identifier(token), "{token}");
        }
    }

    #[test]
    fn rejects_unsupported_identifiers() {
        // Long pure-numeric: different URL scheme.
        assert!(!is_likely_valid_identifier("8648660090940"));
        // Short pure-numeric.
        assert!(!is_likely_valid_identifier("1234"));
        assert!(!is_likely_valid_identifier("12"));
        // Too short / too long.
        assert!(!is_likely_valid_identifier("ab"));
        assert!(!is_likely_valid_identifier("abcdefghijk"));
        // Non-alphanumeric.
        assert!(!is_likely_valid_identifier("ab-c12"));
        assert!(!is_likely_valid_identifier(""));
    }

    #[test]
    fn extracts_token_from_urls_and_paths() {
        assert_eq!(
            token_from_url("https://www.yad2.co.il/item/abc123?x=1"),
            Some("abc123")
        );
        assert_eq!(token_from_url("/item/abc123#gallery"), Some("abc123"));
        assert_eq!(token_from_url("/vehicles/cars?manufacturer=19"), None);
    }

    #[test]
    fn normalization_strips_query_parameters() {
        let a = normalize_listing_url("https://www.yad2.co.il/item/abc123?opened-from=feed&spot=platinum");
        let b = normalize_listing_url("https://www.yad2.co.il/item/abc123?utm_source=x");
        assert_eq!(a, "https://www.yad2.co.il/item/abc123");
        assert_eq!(a, b);
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_listing_url("https://www.yad2.co.il/item/7liq5ya4?y=2");
        assert_eq!(normalize_listing_url(&once), once);

        let passthrough = normalize_listing_url("https://www.yad2.co.il/vehicles/cars");
        assert_eq!(passthrough, "https://www.yad2.co.il/vehicles/cars");
    }

    #[test]
    fn relative_paths_normalize_against_site_base() {
        assert_eq!(
            normalize_listing_url("/item/abc123?x=1"),
            "https://www.yad2.co.il/item/abc123"
        );
    }
}
