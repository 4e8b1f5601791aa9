use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

use crate::lines::ExtractedLine;
use crate::{sjis, Result, ToolError};

/// Byte written into the unused tail of a slot after a shorter translation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    #[default]
    Null,
    Space,
}

impl Padding {
    pub fn byte(self) -> u8 {
        match self {
            Padding::Null => 0x00,
            Padding::Space => 0x20,
        }
    }
}

impl FromStr for Padding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "null" | "nul" | "zero" => Ok(Padding::Null),
            "space" => Ok(Padding::Space),
            other => Err(format!("unknown padding '{other}', expected 'null' or 'space'")),
        }
    }
}

/// Reasons a single translated line is not written. None of these stop the
/// run unless strict mode is on.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatchIssue {
    #[error("character {ch:?} has no Shift-JIS encoding")]
    Unencodable { ch: char },

    #[error("translation is {encoded} bytes but the slot holds {length}")]
    TooLong { encoded: usize, length: usize },

    #[error("slot ends at {end} but the file is only {file_len} bytes")]
    OutOfRange { end: usize, file_len: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedLine {
    pub file: String,
    pub offset: usize,
    pub length: usize,
    pub issue: PatchIssue,
}

/// An encoded translation ready to be written over `offset..=offset + length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchInstruction {
    pub file: String,
    pub offset: usize,
    pub length: usize,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct PatchPlan {
    /// Instructions per file, in file-name order.
    pub groups: BTreeMap<String, Vec<PatchInstruction>>,
    pub untranslated: usize,
    pub skipped: Vec<SkippedLine>,
}

impl PatchPlan {
    pub fn instruction_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct PatchSummary {
    pub files: usize,
    pub applied: usize,
    pub untranslated: usize,
    pub skipped: Vec<SkippedLine>,
}

fn skip_or_fail(
    line_file: &str,
    offset: usize,
    length: usize,
    issue: PatchIssue,
    strict: bool,
    skipped: &mut Vec<SkippedLine>,
) -> Result<()> {
    if strict {
        return Err(ToolError::LineRejected {
            file: line_file.to_string(),
            offset,
            issue,
        });
    }
    tracing::warn!(file = line_file, offset, length, %issue, "skipping line");
    skipped.push(SkippedLine {
        file: line_file.to_string(),
        offset,
        length,
        issue,
    });
    Ok(())
}

/// Encode every translated row and group the results by file.
///
/// Empty translations are counted and left alone. Rows that cannot be encoded
/// or do not fit their slot are skipped, or abort the run when `strict`.
pub fn build_instructions(lines: &[ExtractedLine], strict: bool) -> Result<PatchPlan> {
    let mut plan = PatchPlan::default();

    for line in lines {
        if line.translated_text.is_empty() {
            tracing::trace!(file = %line.file, offset = line.offset, "no translation");
            plan.untranslated += 1;
            continue;
        }

        let bytes = match sjis::encode(&line.translated_text) {
            Ok(bytes) => bytes,
            Err(ch) => {
                let issue = PatchIssue::Unencodable { ch };
                skip_or_fail(&line.file, line.offset, line.length, issue, strict, &mut plan.skipped)?;
                continue;
            }
        };

        if bytes.len() > line.length {
            let issue = PatchIssue::TooLong {
                encoded: bytes.len(),
                length: line.length,
            };
            skip_or_fail(&line.file, line.offset, line.length, issue, strict, &mut plan.skipped)?;
            continue;
        }

        plan.groups
            .entry(line.file.clone())
            .or_default()
            .push(PatchInstruction {
                file: line.file.clone(),
                offset: line.offset,
                length: line.length,
                bytes,
            });
    }

    Ok(plan)
}

/// Overwrite one slot of `region`.
///
/// For `i` in `0..=length`: a newline in the translation becomes a null
/// separator, other translated bytes are copied, the rest of the slot is
/// filled with `padding`, and position `length` receives the terminating
/// null. The terminator is omitted only when it would fall exactly at the end
/// of `region` (a run that ended the file without a null).
///
/// All bounds are checked before the first byte is written; on error the
/// region is untouched.
pub fn apply_instruction(
    region: &mut [u8],
    instr: &PatchInstruction,
    padding: u8,
) -> std::result::Result<(), PatchIssue> {
    if instr.bytes.len() > instr.length {
        return Err(PatchIssue::TooLong {
            encoded: instr.bytes.len(),
            length: instr.length,
        });
    }

    let end = instr
        .offset
        .checked_add(instr.length)
        .filter(|&end| end <= region.len())
        .ok_or(PatchIssue::OutOfRange {
            end: instr.offset.saturating_add(instr.length),
            file_len: region.len(),
        })?;

    for (i, slot) in region[instr.offset..end].iter_mut().enumerate() {
        *slot = match instr.bytes.get(i) {
            Some(b'\n') => 0x00,
            Some(&b) => b,
            None => padding,
        };
    }
    if end < region.len() {
        region[end] = 0x00;
    }

    Ok(())
}

/// Apply every instruction for one file to its checked-out bytes, recording
/// the outcome in `summary`.
pub fn apply_group(
    region: &mut [u8],
    group: &[PatchInstruction],
    padding: u8,
    strict: bool,
    summary: &mut PatchSummary,
) -> Result<()> {
    for instr in group {
        match apply_instruction(region, instr, padding) {
            Ok(()) => summary.applied += 1,
            Err(issue) => skip_or_fail(
                &instr.file,
                instr.offset,
                instr.length,
                issue,
                strict,
                &mut summary.skipped,
            )?,
        }
    }
    summary.files += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instr(offset: usize, length: usize, bytes: &[u8]) -> PatchInstruction {
        PatchInstruction {
            file: "A.PRG".to_string(),
            offset,
            length,
            bytes: bytes.to_vec(),
        }
    }

    fn translated(offset: usize, length: usize, text: &str) -> ExtractedLine {
        let mut line = ExtractedLine::new("A.PRG", offset, length, "原文".to_string());
        line.translated_text = text.to_string();
        line
    }

    #[test]
    fn exact_fit_has_no_padding_and_one_terminator() {
        let mut buf = *b"\xFFabcd\0\xFF";
        apply_instruction(&mut buf, &instr(1, 4, b"WXYZ"), 0x20).unwrap();
        assert_eq!(&buf, b"\xFFWXYZ\0\xFF");
    }

    #[test]
    fn short_translation_is_padded() {
        let mut buf = *b"\xFFabcd\0\xFF";
        apply_instruction(&mut buf, &instr(1, 4, b"Hi"), 0x00).unwrap();
        assert_eq!(&buf, b"\xFFHi\0\0\0\xFF");

        let mut buf = *b"\xFFabcd\0\xFF";
        apply_instruction(&mut buf, &instr(1, 4, b"Hi"), Padding::Space.byte()).unwrap();
        assert_eq!(&buf, b"\xFFHi  \0\xFF");
    }

    #[test]
    fn newline_becomes_separator() {
        // Two runs "ab" and "cd" merged into one line of length 5.
        let mut buf = *b"ab\0cd\0\xFF";
        apply_instruction(&mut buf, &instr(0, 5, b"X\nYZ"), 0x20).unwrap();
        assert_eq!(&buf, b"X\0YZ \0\xFF");
    }

    #[test]
    fn overlong_translation_leaves_bytes_untouched() {
        let original = *b"\xFFabcd\0\xFF";
        let mut buf = original;
        let err = apply_instruction(&mut buf, &instr(1, 4, b"12345"), 0x00).unwrap_err();
        assert_eq!(err, PatchIssue::TooLong { encoded: 5, length: 4 });
        assert_eq!(buf, original);
    }

    #[test]
    fn out_of_range_slot_is_rejected_before_writing() {
        let original = *b"abcd";
        let mut buf = original;
        let err = apply_instruction(&mut buf, &instr(2, 4, b"x"), 0x00).unwrap_err();
        assert_eq!(err, PatchIssue::OutOfRange { end: 6, file_len: 4 });
        assert_eq!(buf, original);
    }

    #[test]
    fn run_at_end_of_file_gets_no_terminator() {
        let mut buf = *b"\0abcd";
        apply_instruction(&mut buf, &instr(1, 4, b"xy"), 0x00).unwrap();
        assert_eq!(&buf, b"\0xy\0\0");
    }

    #[test]
    fn plan_counts_untranslated_and_skips_bad_rows() {
        let lines = vec![
            translated(0, 4, ""),
            translated(10, 4, "Hey"),
            translated(20, 4, "Hello"),
            translated(30, 4, "😀"),
            translated(40, 4, "あい"),
        ];
        let plan = build_instructions(&lines, false).unwrap();
        assert_eq!(plan.untranslated, 1);
        assert_eq!(plan.instruction_count(), 2);
        assert_eq!(plan.groups["A.PRG"][1].bytes, vec![0x82, 0xA0, 0x82, 0xA2]);

        let issues: Vec<_> = plan.skipped.iter().map(|s| s.issue.clone()).collect();
        assert_eq!(
            issues,
            vec![
                PatchIssue::TooLong { encoded: 5, length: 4 },
                PatchIssue::Unencodable { ch: '😀' },
            ]
        );
    }

    #[test]
    fn strict_plan_halts_on_overlong_row() {
        let lines = vec![translated(20, 4, "Hello")];
        let err = build_instructions(&lines, true).unwrap_err();
        assert!(matches!(err, ToolError::LineRejected { offset: 20, .. }));
    }

    #[test]
    fn group_summary_tracks_outcomes() {
        let mut buf = b"abcd\0efgh\0".to_vec();
        let group = vec![instr(0, 4, b"ok"), instr(8, 4, b"no")];
        let mut summary = PatchSummary::default();
        apply_group(&mut buf, &group, 0x00, false, &mut summary).unwrap();
        assert_eq!(summary.files, 1);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(&buf, b"ok\0\0\0efgh\0");
    }

    #[test]
    fn parses_padding_names() {
        assert_eq!("space".parse::<Padding>(), Ok(Padding::Space));
        assert_eq!("NULL".parse::<Padding>(), Ok(Padding::Null));
        assert!("tab".parse::<Padding>().is_err());
    }
}
