// src/utils/html.rs

use ammonia;

/// Clean user-supplied free text before it is stored.
///
/// Whitelist-based: safe inline tags survive, `<script>`/`<iframe>` and event
/// handler attributes are stripped. Applied to requirements, messages,
/// reviews, listing descriptions and bios, all of which are rendered by the
/// web client.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Trims and sanitizes a required text field. Returns `None` when nothing is
/// left, so callers can reject blank input.
pub fn clean_required(input: &str) -> Option<String> {
    let cleaned = clean_html(input.trim());
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
