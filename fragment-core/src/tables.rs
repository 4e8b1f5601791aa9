//! Compiled-in data used by the extraction filters.
//!
//! Everything here is data. The filters in `filters.rs` only look things up;
//! adding a false-positive span or widening the character set is an edit to
//! this file alone.

/// Inclusive span of byte offsets in one input file that is known not to be
/// text (lookup tables, structures that happen to decode cleanly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionRange {
    pub file: &'static str,
    pub start: usize,
    pub end: usize,
}

impl ExclusionRange {
    pub const fn new(file: &'static str, start: usize, end: usize) -> Self {
        Self { file, start, end }
    }

    pub fn contains(&self, file: &str, offset: usize) -> bool {
        self.file == file && (self.start..=self.end).contains(&offset)
    }
}

pub static MANUAL_EXCLUSIONS: &[ExclusionRange] = &[
    ExclusionRange::new("DEMOT.PRG", 1114, 3414),
    ExclusionRange::new("DEMOT.PRG", 3793, 30630),
    ExclusionRange::new("DEMOT.PRG", 33520, 34136),
    ExclusionRange::new("DESKTOPF.PRG", 537, 175726),
    ExclusionRange::new("GCMNF.PRG", 810, 1582672),
    ExclusionRange::new("GCMNF.PRG", 1593760, 1616784),
    ExclusionRange::new("GCMNF.PRG", 1624192, 1624376),
    ExclusionRange::new("GCMNF.PRG", 1717132, 1722056),
    ExclusionRange::new("GCMNF.PRG", 1821456, 1863840),
    ExclusionRange::new("GCMNF.PRG", 1864432, 1865841),
    ExclusionRange::new("GCMNO.PRG", 253, 1062160),
    ExclusionRange::new("GCMNO.PRG", 1109024, 1129996),
    ExclusionRange::new("MATCHING.PRG", 1114, 1561520),
    ExclusionRange::new("MATCHING.PRG", 1633836, 1639760),
    ExclusionRange::new("TOPPAGEF.PRG", 9, 204612),
    ExclusionRange::new("TOPPAGEF.PRG", 240888, 242268),
];

/// Inclusive code point range. Tables of these must be sorted and disjoint
/// so they can be binary searched.
pub type CharRange = (u32, u32);

/// Han, Hiragana and Katakana script ranges.
pub static JAPANESE_RANGES: &[CharRange] = &[
    (0x2E80, 0x2E99),
    (0x2E9B, 0x2EF3),
    (0x2F00, 0x2FD5),
    (0x3005, 0x3005),
    (0x3007, 0x3007),
    (0x3021, 0x3029),
    (0x3038, 0x303B),
    (0x3041, 0x3096),
    (0x309D, 0x309F),
    (0x30A1, 0x30FA),
    (0x30FD, 0x30FF),
    (0x31F0, 0x31FF),
    (0x32D0, 0x32FE),
    (0x3300, 0x3357),
    (0x3400, 0x4DBF),
    (0x4E00, 0x9FFF),
    (0xF900, 0xFA6D),
    (0xFA70, 0xFAD9),
    (0xFF66, 0xFF6F),
    (0xFF71, 0xFF9D),
    (0x1B000, 0x1B122),
    (0x1F200, 0x1F200),
    (0x20000, 0x2A6DF),
    (0x2A700, 0x2EBE0),
    (0x2F800, 0x2FA1F),
    (0x30000, 0x3134A),
];

/// Everything besides [`JAPANESE_RANGES`] that may appear in a text line.
pub static EXTRA_ALLOWED_RANGES: &[CharRange] = &[
    (0x000A, 0x000A), // \n
    (0x0020, 0x007E), // printable ASCII
    (0x00D7, 0x00D7), // ×
    (0x0394, 0x0394), // Δ
    (0x0398, 0x0398), // Θ
    (0x039B, 0x039B), // Λ
    (0x03A3, 0x03A3), // Σ
    (0x03A9, 0x03A9), // Ω
    (0x2015, 0x2015), // ―
    (0x201C, 0x201D), // “ ”
    (0x2026, 0x2026), // …
    (0x203B, 0x203B), // ※
    (0x2191, 0x2191), // ↑
    (0x2193, 0x2193), // ↓
    (0x2211, 0x2211), // ∑
    (0x25B3, 0x25B3), // △
    (0x25CB, 0x25CB), // ○
    (0x2605, 0x2605), // ★
    (0x2E80, 0x2FD5), // CJK radicals
    (0x3000, 0x303F), // CJK punctuation
    (0x30FB, 0x30FC), // ・ ー
    (0x31F0, 0x31FF), // katakana phonetic extensions
    (0x3220, 0x3243), // parenthesized ideographs
    (0x3280, 0x337F), // circled ideographs, square words
    (0x338F, 0x338F), // ㎏
    (0xFF01, 0xFF9F), // full-width forms, half-width kana
    (0xFFE5, 0xFFE5), // ￥
];

pub fn in_ranges(table: &[CharRange], c: char) -> bool {
    let cp = c as u32;
    table
        .binary_search_by(|&(lo, hi)| {
            if hi < cp {
                std::cmp::Ordering::Less
            } else if lo > cp {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

pub fn is_japanese(c: char) -> bool {
    in_ranges(JAPANESE_RANGES, c)
}

pub fn is_allowed(c: char) -> bool {
    is_japanese(c) || in_ranges(EXTRA_ALLOWED_RANGES, c)
}
