use crate::tables::{self, ExclusionRange};

/// Shortest byte run considered text.
pub const MIN_BYTES: usize = 4;

/// A decoded run awaiting a keep/reject decision.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub file: &'a str,
    pub offset: usize,
    pub raw: &'a [u8],
    pub text: &'a str,
}

/// Why a candidate was dropped. Rejections are expected and never surface as
/// errors; they exist for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooShort,
    AsciiOnly,
    DisallowedChar(char),
    NoJapanese,
    ManuallyExcluded,
}

pub fn check_length(c: &Candidate) -> Result<(), Rejection> {
    if c.raw.len() < MIN_BYTES {
        return Err(Rejection::TooShort);
    }
    Ok(())
}

pub fn check_not_ascii(c: &Candidate) -> Result<(), Rejection> {
    if c.raw.is_ascii() {
        return Err(Rejection::AsciiOnly);
    }
    Ok(())
}

/// Every character of the line must be allowed; one stray character rejects
/// the whole line.
pub fn check_charset(c: &Candidate) -> Result<(), Rejection> {
    match c.text.chars().find(|&ch| !tables::is_allowed(ch)) {
        Some(bad) => Err(Rejection::DisallowedChar(bad)),
        None => Ok(()),
    }
}

pub fn check_has_japanese(c: &Candidate) -> Result<(), Rejection> {
    if c.text.chars().any(tables::is_japanese) {
        Ok(())
    } else {
        Err(Rejection::NoJapanese)
    }
}

/// The full filter set. The exclusion list is injectable so tests can use
/// their own spans; [`Filters::default`] uses the compiled-in table.
#[derive(Debug, Clone, Copy)]
pub struct Filters<'t> {
    exclusions: &'t [ExclusionRange],
}

impl Default for Filters<'static> {
    fn default() -> Self {
        Self::new(tables::MANUAL_EXCLUSIONS)
    }
}

impl<'t> Filters<'t> {
    pub fn new(exclusions: &'t [ExclusionRange]) -> Self {
        Self { exclusions }
    }

    pub fn check_exclusions(&self, c: &Candidate) -> Result<(), Rejection> {
        if self.exclusions.iter().any(|r| r.contains(c.file, c.offset)) {
            return Err(Rejection::ManuallyExcluded);
        }
        Ok(())
    }

    /// Run all filters, stopping at the first rejection.
    pub fn evaluate(&self, c: &Candidate) -> Result<(), Rejection> {
        check_length(c)?;
        check_not_ascii(c)?;
        check_charset(c)?;
        check_has_japanese(c)?;
        self.check_exclusions(c)
    }
}
