use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

// Layered validation: cheap high-confidence patterns first, then URL parsing
// for absolute targets, which must share the application's origin.

static PATH_TRAVERSAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\.").unwrap_or_else(|e| unreachable!("static regex: {e}")));

// Scheme prefix or a run of slashes that a browser would read as an authority
static PROTOCOL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:[a-z][a-z0-9+.-]*:)|(?:/{2,})")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

// Control characters, dangerous escapes, backslashes and look-alike prefixes
static SUSPICIOUS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[\x00-\x1F\x7F-\x9F]|%(?:00|0[aAdD]|09|5c)|^[.@〱〵ゝーｰ]|\\|[\u{200E}\u{200F}\u{2060}-\u{2064}\u{2000}-\u{200A}]")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

const MAX_REDIRECT_LENGTH: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RedirectError {
    #[error("redirect target is too long")]
    TooLong,
    #[error("redirect target contains a forbidden pattern")]
    ForbiddenPattern,
    #[error("redirect target is not a valid URL")]
    Unparseable,
    #[error("redirect target is not on the application origin")]
    CrossOrigin,
}

/// Validate a post-login or post-logout redirect target.
///
/// Relative paths are returned unchanged. Absolute URLs are accepted only when
/// they share scheme, host and port with `base_url`.
///
/// # Errors
///
/// Returns a [`RedirectError`] describing the first failed check.
pub fn validate_return_to(target: &str, base_url: &Url) -> Result<String, RedirectError> {
    debug!("Validating redirect target: {target}");

    if target.len() > MAX_REDIRECT_LENGTH {
        warn!("Excessively long redirect target: {} characters", target.len());
        return Err(RedirectError::TooLong);
    }

    if is_relative_url(target) {
        validate_relative(target)?;
        return Ok(target.to_string());
    }

    validate_absolute(target, base_url)
}

/// Check if URL is relative (starts with /, not //, no backslash)
fn is_relative_url(url: &str) -> bool {
    url.starts_with('/') && !url.starts_with("//") && !url.starts_with("/\\")
}

fn path_portion(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn validate_relative(target: &str) -> Result<(), RedirectError> {
    for variant in decoded_variants(target) {
        let path = path_portion(&variant);

        if PATH_TRAVERSAL_PATTERN.is_match(path) {
            warn!("Path traversal in redirect target: {target}");
            return Err(RedirectError::ForbiddenPattern);
        }
        if PROTOCOL_PATTERN.is_match(path) {
            warn!("Protocol or authority injection in redirect target: {target}");
            return Err(RedirectError::ForbiddenPattern);
        }
        if SUSPICIOUS_PATTERN.is_match(&variant) {
            warn!("Suspicious pattern in redirect target: {target}");
            return Err(RedirectError::ForbiddenPattern);
        }
        if contains_dangerous_protocol(&path.to_lowercase()) {
            warn!("Dangerous protocol in redirect target: {target}");
            return Err(RedirectError::ForbiddenPattern);
        }
    }
    Ok(())
}

fn validate_absolute(target: &str, base_url: &Url) -> Result<String, RedirectError> {
    if SUSPICIOUS_PATTERN.is_match(target) || target.matches('@').count() > 1 {
        warn!("Suspicious pattern in absolute redirect target: {target}");
        return Err(RedirectError::ForbiddenPattern);
    }

    let parsed = Url::parse(target).map_err(|e| {
        warn!("Failed to parse redirect target '{target}': {e}");
        RedirectError::Unparseable
    })?;

    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        warn!("Invalid scheme '{}' in redirect target", parsed.scheme());
        return Err(RedirectError::ForbiddenPattern);
    }

    if parsed.origin() != base_url.origin() {
        warn!(
            "Cross-origin redirect target rejected: {} (expected {})",
            parsed.origin().ascii_serialization(),
            base_url.origin().ascii_serialization()
        );
        return Err(RedirectError::CrossOrigin);
    }

    Ok(parsed.to_string())
}

/// The input plus up to two rounds of percent-decoding
fn decoded_variants(target: &str) -> Vec<String> {
    let mut variants = Vec::with_capacity(3);
    variants.push(target.to_string());

    if let Ok(decoded) = urlencoding::decode(target) {
        let decoded = decoded.into_owned();
        if decoded != target {
            if let Ok(double) = urlencoding::decode(&decoded) {
                let double = double.into_owned();
                if double != decoded {
                    variants.push(double);
                }
            }
            variants.push(decoded);
        }
    }

    variants
}

fn contains_dangerous_protocol(text: &str) -> bool {
    const DANGEROUS_PROTOCOLS: &[&str] = &["javascript:", "vbscript:", "data:", "file:"];
    DANGEROUS_PROTOCOLS.iter().any(|protocol| text.contains(protocol))
}
