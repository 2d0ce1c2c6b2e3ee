use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

const CANONICAL_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];
const DEFAULT_MARKS: f64 = 1.0;

/// Canonicalizes one raw option token.
///
/// Digits `1..4` map to `A..D`, otherwise the first `A..D` letter inside the
/// token wins (`"(b)"` becomes `B`). Tokens with neither are kept as-is after
/// trimming and upper-casing. Blank tokens are dropped. Applying the function to
/// its own output returns the same label.
pub(crate) fn normalize_label(raw: &str) -> Option<String> {
    let cleaned = raw.trim().to_uppercase();
    if cleaned.is_empty() {
        return None;
    }

    let digit_label = match cleaned.as_str() {
        "1" => Some('A'),
        "2" => Some('B'),
        "3" => Some('C'),
        "4" => Some('D'),
        _ => None,
    };
    if let Some(label) = digit_label {
        return Some(label.to_string());
    }

    if let Some(label) = cleaned.chars().find(|ch| CANONICAL_LABELS.contains(ch)) {
        return Some(label.to_string());
    }

    Some(cleaned)
}

pub(crate) fn normalize_options<I, S>(raw: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter().filter_map(|item| normalize_label(item.as_ref())).collect()
}

/// Splits `A,B`, `A B`, `A;B` and `{A,B}` into a normalized set.
pub(crate) fn parse_options_string(value: &str) -> BTreeSet<String> {
    let trimmed = value.trim().trim_start_matches('{').trim_end_matches('}');
    normalize_options(
        trimmed
            .split(|ch: char| ch == ',' || ch == ';' || ch.is_whitespace())
            .filter(|item| !item.is_empty()),
    )
}

/// Normalizes labels that may arrive packed into one string (`"A, C"`).
pub(crate) fn normalize_answer_labels<I, S>(raw: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut labels = BTreeSet::new();
    for item in raw {
        let item = item.as_ref();
        if item.contains([',', ';', '{']) {
            labels.extend(parse_options_string(item));
        } else if let Some(label) = normalize_label(item) {
            labels.insert(label);
        }
    }
    labels
}

fn marks_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"marks?[-=:\s]+(\d+(?:\.\d+)?)",
            r"(\d+(?:\.\d+)?)\s*marks?",
            r"mar\s*[-=:\s]*(\d+(?:\.\d+)?)",
            r"max\s*[-=:\s]*(\d+(?:\.\d+)?)",
            r"\[(\d+(?:\.\d+)?)\]",
            r"\((\d+(?:\.\d+)?)\)",
            r"(\d+(?:\.\d+)?)\s*pts?\b",
            r"(\d+(?:\.\d+)?)\s*points?",
            r"worth\s+(\d+(?:\.\d+)?)",
            r"(\d+(?:\.\d+)?)\s*m\b",
            r"^(\d+(?:\.\d+)?)$",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

/// Reads a question weight out of free-form text written next to an answer
/// (`"marks-2"`, `"(3)"`, `"worth 1.5"`). Falls back to one mark.
pub(crate) fn extract_marks_from_text(text: &str) -> f64 {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return DEFAULT_MARKS;
    }

    for pattern in marks_patterns() {
        let Some(captures) = pattern.captures(&lowered) else {
            continue;
        };
        let Some(value) = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) else {
            continue;
        };
        if value > 0.0 {
            return value;
        }
    }

    DEFAULT_MARKS
}
