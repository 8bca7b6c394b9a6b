//! Text processing for the catalog index: tokenization, schema flattening
//! and bounded edit distance.

use serde_json::Value;

use super::types::JsonObject;

/// Split text into lowercase terms.
///
/// Splits on every non-alphanumeric character and on camelCase boundaries,
/// so `getWeather`, `get_weather` and `get weather` tokenize identically.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in text.chars() {
        if !ch.is_alphanumeric() {
            flush(&mut current, &mut terms);
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower {
            flush(&mut current, &mut terms);
        }
        prev_lower = ch.is_lowercase() || ch.is_numeric();
        current.extend(ch.to_lowercase());
    }
    flush(&mut current, &mut terms);
    terms
}

fn flush(current: &mut String, terms: &mut Vec<String>) {
    if !current.is_empty() {
        terms.push(std::mem::take(current));
    }
}

/// Collect every parameter `description` in a JSON schema, space-joined.
///
/// Walks `properties` recursively, including array `items`.
pub fn flatten_parameter_descriptions(schema: &JsonObject) -> String {
    let mut out = Vec::new();
    collect_descriptions(schema, &mut out);
    out.join(" ")
}

fn collect_descriptions(schema: &JsonObject, out: &mut Vec<String>) {
    if let Some(Value::Object(properties)) = schema.get("properties") {
        for property in properties.values() {
            let Value::Object(property) = property else {
                continue;
            };
            if let Some(Value::String(description)) = property.get("description") {
                out.push(description.clone());
            }
            collect_descriptions(property, out);
        }
    }
    if let Some(Value::Object(items)) = schema.get("items") {
        collect_descriptions(items, out);
    }
}

/// Whether the edit distance between `a` and `b` is at most `max`.
///
/// Single-row Levenshtein over chars with an early exit once every cell in a
/// row exceeds `max`.
pub fn within_edit_distance(a: &str, b: &str, max: usize) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.len().abs_diff(b.len()) > max {
        return false;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1) // deletion
                .min(curr[j] + 1) // insertion
                .min(prev[j] + cost); // substitution
            row_min = row_min.min(curr[j + 1]);
        }
        if row_min > max {
            return false;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()] <= max
}
