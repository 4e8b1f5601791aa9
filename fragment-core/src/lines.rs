use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

use crate::sjis;
use crate::table::Record;

/// One occurrence of a text line inside an input file. This is a row of
/// `gamelines.csv`.
///
/// `offset` is the first byte of the run. `length` covers every source byte
/// of the line, including the null separators absorbed by
/// [`merge_continuations`], so a patch never touches anything outside
/// `offset..=offset + length`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedLine {
    #[serde(rename = "FILE")]
    pub file: String,
    #[serde(rename = "OFFSET")]
    pub offset: usize,
    #[serde(rename = "LENGTH")]
    pub length: usize,
    #[serde(rename = "ORIGINAL_TEXT")]
    pub original_text: String,
    #[serde(rename = "TRANSLATED_TEXT", default)]
    pub translated_text: String,
    #[serde(rename = "STATUS", default)]
    pub status: String,
    #[serde(rename = "TL_LENGTH", default, deserialize_with = "csv::invalid_option")]
    pub tl_length: Option<usize>,
    #[serde(rename = "NOTES", default)]
    pub notes: String,
    #[serde(rename = "TEXT_KEY", default)]
    pub text_key: String,
}

impl ExtractedLine {
    pub fn new(file: &str, offset: usize, length: usize, text: String) -> Self {
        Self {
            file: file.to_string(),
            offset,
            length,
            original_text: text,
            ..Self::default()
        }
    }

    /// The stored key, or one computed from the original text when the table
    /// came without a `TEXT_KEY` column.
    pub fn key(&self) -> String {
        if self.text_key.is_empty() {
            text_key(&self.original_text)
        } else {
            self.text_key.clone()
        }
    }
}

impl Record for ExtractedLine {
    const COLUMNS: &'static [&'static str] = &[
        "FILE",
        "OFFSET",
        "LENGTH",
        "ORIGINAL_TEXT",
        "TRANSLATED_TEXT",
        "STATUS",
        "TL_LENGTH",
        "NOTES",
        "TEXT_KEY",
    ];
}

/// One distinct original text. This is a row of `tllines.csv`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationUnit {
    #[serde(rename = "TEXT_KEY")]
    pub text_key: String,
    #[serde(rename = "LENGTH")]
    pub length: usize,
    #[serde(rename = "TL_LENGTH", default, deserialize_with = "csv::invalid_option")]
    pub tl_length: Option<usize>,
    #[serde(rename = "ORIGINAL_TEXT")]
    pub original_text: String,
    #[serde(rename = "TRANSLATED_TEXT", default)]
    pub translated_text: String,
    #[serde(rename = "NOTES", default)]
    pub notes: String,
    #[serde(rename = "STATUS", default)]
    pub status: String,
    #[serde(rename = "TL_CREDIT", default)]
    pub tl_credit: String,
    #[serde(rename = "ORIG_LINES", default, deserialize_with = "csv::invalid_option")]
    pub orig_lines: Option<usize>,
    #[serde(rename = "TL_LINES", default, deserialize_with = "csv::invalid_option")]
    pub tl_lines: Option<usize>,
    #[serde(rename = "LINE_STATUS", default)]
    pub line_status: String,
}

impl Record for TranslationUnit {
    const COLUMNS: &'static [&'static str] = &[
        "TEXT_KEY",
        "LENGTH",
        "TL_LENGTH",
        "ORIGINAL_TEXT",
        "TRANSLATED_TEXT",
        "NOTES",
        "STATUS",
        "TL_CREDIT",
        "ORIG_LINES",
        "TL_LINES",
        "LINE_STATUS",
    ];
}

pub const LINE_STATUS_OK: &str = "OK";
pub const LINE_STATUS_MISMATCH: &str = "MISMATCH";

impl TranslationUnit {
    pub fn key(&self) -> String {
        if self.text_key.is_empty() {
            text_key(&self.original_text)
        } else {
            self.text_key.clone()
        }
    }

    /// Recompute the derived columns from the two texts.
    ///
    /// Newlines in a translation turn into null separators when patched, so a
    /// translation with a different line count than the original changes the
    /// run layout the game reads.
    pub fn refresh_counts(&mut self) {
        self.orig_lines = Some(line_count(&self.original_text));
        if self.translated_text.is_empty() {
            self.tl_length = None;
            self.tl_lines = None;
            self.line_status.clear();
            return;
        }

        self.tl_length = sjis::encode(&self.translated_text).ok().map(|b| b.len());
        let tl_lines = line_count(&self.translated_text);
        self.tl_lines = Some(tl_lines);
        self.line_status = if Some(tl_lines) == self.orig_lines {
            LINE_STATUS_OK
        } else {
            LINE_STATUS_MISMATCH
        }
        .to_string();
    }
}

fn line_count(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        text.split('\n').count()
    }
}

/// Lowercase hex SHA-256 of the text.
pub fn text_key(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Fold each line into its predecessor when it starts exactly one byte (the
/// separating null) after the predecessor ends. Chains collapse into a single
/// line. Input must be ordered by file and ascending offset.
pub fn merge_continuations(lines: Vec<ExtractedLine>) -> Vec<ExtractedLine> {
    let mut merged: Vec<ExtractedLine> = Vec::with_capacity(lines.len());

    for line in lines {
        if let Some(prev) = merged.last_mut() {
            if prev.file == line.file && prev.offset + prev.length + 1 == line.offset {
                tracing::trace!(
                    file = %line.file,
                    offset = line.offset,
                    into = prev.offset,
                    "merging continuation"
                );
                prev.original_text.push('\n');
                prev.original_text.push_str(&line.original_text);
                prev.length += line.length + 1;
                continue;
            }
        }
        merged.push(line);
    }

    merged
}

pub fn assign_keys(lines: &mut [ExtractedLine]) {
    for line in lines {
        line.text_key = text_key(&line.original_text);
    }
}

/// One unit per distinct original text, in order of first occurrence.
pub fn translation_units(lines: &[ExtractedLine]) -> Vec<TranslationUnit> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut units = Vec::new();

    for line in lines {
        if !seen.insert(line.original_text.as_str()) {
            continue;
        }
        let mut unit = TranslationUnit {
            text_key: line.key(),
            length: line.length,
            original_text: line.original_text.clone(),
            ..TranslationUnit::default()
        };
        unit.refresh_counts();
        units.push(unit);
    }

    units
}

/// Give every untranslated occurrence the translation of its unit, matched by
/// text key. Occurrences that already carry a translation keep it. Returns the
/// number of rows filled.
pub fn fill_from_units(lines: &mut [ExtractedLine], units: &[TranslationUnit]) -> usize {
    let by_key: HashMap<String, &str> = units
        .iter()
        .filter(|u| !u.translated_text.is_empty())
        .map(|u| (u.key(), u.translated_text.as_str()))
        .collect();

    let mut filled = 0;
    for line in lines.iter_mut().filter(|l| l.translated_text.is_empty()) {
        if let Some(text) = by_key.get(&line.key()) {
            line.translated_text = text.to_string();
            filled += 1;
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(file: &str, offset: usize, length: usize, text: &str) -> ExtractedLine {
        ExtractedLine::new(file, offset, length, text.to_string())
    }

    #[test]
    fn merges_chains_into_one_line() {
        let lines = vec![
            line("A", 10, 4, "ab"),
            line("A", 15, 6, "cde"),
            line("A", 22, 2, "f"),
        ];
        let merged = merge_continuations(lines);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].original_text, "ab\ncde\nf");
        assert_eq!(merged[0].offset, 10);
        assert_eq!(merged[0].length, 4 + 6 + 2 + 2);
    }

    #[test]
    fn leaves_gaps_and_other_files_alone() {
        let lines = vec![
            line("A", 0, 4, "one"),
            line("A", 6, 4, "two"),
            line("B", 11, 4, "three"),
            line("B", 16, 4, "four"),
        ];
        let merged = merge_continuations(lines);
        let texts: Vec<_> = merged.iter().map(|l| l.original_text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three\nfour"]);
        assert_eq!(merged[2].length, 9);
    }

    #[test]
    fn text_key_is_stable_sha256() {
        assert_eq!(
            text_key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(text_key("あい"), text_key("あい"));
        assert_ne!(text_key("あい"), text_key("あい\n"));
    }

    #[test]
    fn duplicates_share_one_unit() {
        let mut lines = vec![
            line("A", 0, 4, "あい"),
            line("A", 8, 6, "うえお"),
            line("B", 0, 4, "あい"),
        ];
        assign_keys(&mut lines);
        assert_eq!(lines[0].text_key, lines[2].text_key);

        let units = translation_units(&lines);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].original_text, "あい");
        assert_eq!(units[0].text_key, lines[0].text_key);
        assert_eq!(units[1].original_text, "うえお");
        assert_eq!(units[1].length, 6);
    }

    #[test]
    fn units_fill_only_untranslated_rows() {
        let mut lines = vec![
            line("A", 0, 4, "あい"),
            line("B", 0, 4, "あい"),
            line("C", 0, 6, "うえお"),
        ];
        lines[1].translated_text = "kept".to_string();

        let mut units = translation_units(&lines);
        units[0].translated_text = "Hi".to_string();
        // Rows without a stored key fall back to hashing their text.
        assert!(lines.iter().all(|l| l.text_key.is_empty()));

        assert_eq!(fill_from_units(&mut lines, &units), 1);
        assert_eq!(lines[0].translated_text, "Hi");
        assert_eq!(lines[1].translated_text, "kept");
        assert_eq!(lines[2].translated_text, "");
    }

    #[test]
    fn refresh_counts_flags_line_mismatch() {
        let mut unit = TranslationUnit {
            original_text: "あ\nい".to_string(),
            ..TranslationUnit::default()
        };
        unit.refresh_counts();
        assert_eq!(unit.orig_lines, Some(2));
        assert_eq!(unit.tl_lines, None);
        assert_eq!(unit.line_status, "");

        unit.translated_text = "Hi".to_string();
        unit.refresh_counts();
        assert_eq!(unit.tl_length, Some(2));
        assert_eq!(unit.line_status, LINE_STATUS_MISMATCH);

        unit.translated_text = "Hi\nyou".to_string();
        unit.refresh_counts();
        assert_eq!(unit.line_status, LINE_STATUS_OK);
    }
}
