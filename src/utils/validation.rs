// src/utils/validation.rs

use std::sync::OnceLock;

use regex::Regex;
use url::Url;
use validator::ValidationError;

fn letter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z]").unwrap())
}

fn digit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]").unwrap())
}

/// Password strength check used at registration: length is enforced by the
/// DTO's `length` attribute; this requires at least one letter and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if letter_re().is_match(password) && digit_re().is_match(password) {
        Ok(())
    } else {
        Err(ValidationError::new("password_too_weak"))
    }
}

/// Accepts only absolute http(s) URLs (thumbnails, external links).
pub fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        _ => Err(ValidationError::new("invalid_url")),
    }
}

/// Clean user-authored HTML using the ammonia library.
///
/// Whitelist-based sanitization: safe tags (like <b>, <p>) survive, dangerous
/// tags (like <script>, <iframe>) and attributes (like onclick) are stripped.
/// Serves as a fail-safe against stored XSS in course descriptions and
/// review comments.
pub fn sanitize_html(input: &str) -> String {
    ammonia::clean(input)
}
