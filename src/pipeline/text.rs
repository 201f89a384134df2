//! Cleanup of extracted or recognised page text.
//!
//! PDF text layers and OCR output share the same quirks: CR/CRLF line
//! endings, words hyphenated across a line break, stray zero-width
//! characters and long runs of blank lines. [`paragraphs`] normalises all of
//! that and splits the result into paragraphs on blank lines. Lines inside
//! a paragraph are kept, joined with `\n`.
//!
//! Rules run in order: line endings first so the later patterns only see
//! `\n`, hyphen joins before blank-line collapsing.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean `input` and split it into non-empty paragraphs.
pub(crate) fn paragraphs(input: &str) -> Vec<String> {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = join_hyphenated(&s);
    let s = trim_lines(&s);
    let s = collapse_blank_lines(&s);
    s.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// U+00AD is kept here: it marks a hyphenation point handled below.
static RE_INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new("[\u{200B}\u{200C}\u{200D}\u{2060}\u{FEFF}]").unwrap());

fn remove_invisible_chars(input: &str) -> String {
    RE_INVISIBLE.replace_all(input, "").into_owned()
}

// `exam-\nple` and `exam\u{AD}\nple` both become `example`. A soft hyphen not
// followed by a break is simply dropped.
static RE_HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})[-\u{00AD}][ \t]*\n[ \t]*(\p{Ll})").unwrap());

fn join_hyphenated(input: &str) -> String {
    RE_HYPHEN_BREAK
        .replace_all(input, "$1$2")
        .replace('\u{00AD}', "")
}

fn trim_lines(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}
