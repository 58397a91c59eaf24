//! Lexical markup stripping.
//!
//! Three passes applied in a fixed order, each `&str -> String`:
//! 1. drop `<script>` / `<style>` elements with their contents
//! 2. replace every remaining `<...>` tag with a single space
//! 3. collapse whitespace runs and trim
//!
//! There is no DOM here. Malformed markup degrades to extra whitespace or
//! literal `<` characters; no input makes these passes fail.

/// Elements whose inner text must never leak into prose.
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

/// Run the full stripping pipeline on raw markup.
pub fn strip_markup(raw: &str) -> String {
    let mut result = raw.to_string();

    for name in RAW_TEXT_ELEMENTS {
        result = remove_element(&result, name);
    }
    result = strip_tags(&result);
    collapse_whitespace(&result)
}

// ---------------------------------------------------------------------------
// Pass 1: Remove raw-text elements
// ---------------------------------------------------------------------------

/// Remove every `<name ...>...</name>` span, matching the tag name
/// case-insensitively. The body may span lines; it ends at the first
/// `</name>`. An opening tag with no closing tag is left for [`strip_tags`].
pub fn remove_element(input: &str, name: &str) -> String {
    let open = format!("<{}", name.to_ascii_lowercase());
    let close = format!("</{}>", name.to_ascii_lowercase());

    // ASCII lowercasing keeps byte offsets identical to `input`.
    let lower = input.to_ascii_lowercase();

    let mut out = String::with_capacity(input.len());
    let mut copied = 0;
    let mut search = 0;

    while let Some(rel) = lower[search..].find(&open) {
        let start = search + rel;
        let after_name = start + open.len();

        // `<scripts>` or `<style_x>` are different tags.
        if input[after_name..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            search = after_name;
            continue;
        }

        let Some(gt) = lower[after_name..].find('>') else {
            break;
        };
        let body_start = after_name + gt + 1;

        let Some(close_rel) = lower[body_start..].find(&close) else {
            break;
        };
        let end = body_start + close_rel + close.len();

        out.push_str(&input[copied..start]);
        copied = end;
        search = end;
    }

    out.push_str(&input[copied..]);
    out
}

// ---------------------------------------------------------------------------
// Pass 2: Strip tags
// ---------------------------------------------------------------------------

/// Replace every `<...>` token (at least one character between the brackets)
/// with a single space. A `<` with no later `>` is kept as text, as is `<>`.
pub fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(lt) = rest.find('<') {
        let after = &rest[lt + 1..];
        match after.find('>') {
            Some(0) => {
                out.push_str(&rest[..=lt]);
                rest = after;
            }
            Some(gt) => {
                out.push_str(&rest[..lt]);
                out.push(' ');
                rest = &after[gt + 1..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Pass 3: Collapse whitespace
// ---------------------------------------------------------------------------

/// Collapse every whitespace run (spaces, tabs, newlines) to one space and trim.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
