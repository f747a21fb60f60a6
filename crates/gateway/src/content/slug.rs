//! Slug derivation for catalog entries.

use serde_json::Value;

/// Convert text into a URL-safe slug.
///
/// Lowercases, replaces every run of characters outside `[a-z0-9]` with a
/// single hyphen, and trims leading/trailing hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut prev_was_hyphen = true; // Start true to skip leading hyphens
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            prev_was_hyphen = false;
        } else if !prev_was_hyphen {
            slug.push('-');
            prev_was_hyphen = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Fill `slug` from `title` when the payload has no usable slug.
///
/// Leaves the payload untouched when it is not an object, when a non-empty
/// slug is present, or when there is no non-empty string title.
pub fn derive_slug(data: &mut Value) {
    let Some(fields) = data.as_object_mut() else {
        return;
    };

    let has_slug = match fields.get("slug") {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    };
    if has_slug {
        return;
    }

    let Some(title) = fields
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
    else {
        return;
    };

    let slug = slugify(title);
    fields.insert("slug".to_string(), Value::String(slug));
}
