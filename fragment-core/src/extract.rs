use crate::filters::{Candidate, Filters};
use crate::lines::{merge_continuations, ExtractedLine};
use crate::{scan, sjis};

pub fn extract_lines(file: &str, data: &[u8], filters: &Filters) -> Vec<ExtractedLine> {
    let mut lines = Vec::new();
    let mut undecodable = 0usize;
    let mut rejected = 0usize;

    for frag in scan::fragments(data) {
        let Some(text) = sjis::decode(frag.bytes) else {
            undecodable += 1;
            continue;
        };

        let candidate = Candidate {
            file,
            offset: frag.offset,
            raw: frag.bytes,
            text: &text,
        };
        if let Err(why) = filters.evaluate(&candidate) {
            tracing::trace!(file, offset = frag.offset, ?why, "rejected");
            rejected += 1;
            continue;
        }

        lines.push(ExtractedLine::new(file, frag.offset, frag.len(), text));
    }

    let accepted = lines.len();
    let lines = merge_continuations(lines);
    tracing::debug!(
        file,
        undecodable,
        rejected,
        accepted,
        merged = accepted - lines.len(),
        "scanned file"
    );
    lines
}
