//! Alphabet-index navigation over the flattened row list.

use crate::catalog::strip_leading_article;
use crate::protocol::{DisplayItem, DisplayPayload};

/// Buckets a title to its index letter: `'A'..='Z'`, or `'#'` for titles
/// that do not start with an ASCII letter after article stripping.
pub fn sort_letter(title: &str) -> char {
    let stripped = strip_leading_article(title);
    match stripped.chars().next() {
        Some(first) if first.is_ascii_alphabetic() => first.to_ascii_uppercase(),
        _ => '#',
    }
}

/// Ordered distinct letters present in the row list. Section headers and
/// notice rows carry no letter.
pub fn present_letters(rows: &[DisplayItem]) -> Vec<char> {
    let mut letters = Vec::new();
    for row in rows {
        if !matches!(row.payload, DisplayPayload::Entry(_)) {
            continue;
        }
        let letter = sort_letter(&row.title);
        if !letters.contains(&letter) {
            letters.push(letter);
        }
    }
    letters
}

/// Index of the first entry row whose computed letter matches `letter`.
pub fn jump_row(rows: &[DisplayItem], letter: char) -> Option<usize> {
    let target = if letter.is_ascii_alphabetic() {
        letter.to_ascii_uppercase()
    } else {
        '#'
    };
    rows.iter().position(|row| {
        matches!(row.payload, DisplayPayload::Entry(_)) && sort_letter(&row.title) == target
    })
}
