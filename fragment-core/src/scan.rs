// `offset` is the first byte of the run. The patcher writes back to exactly
// these coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub offset: usize,
    pub bytes: &'a [u8],
}

impl Fragment<'_> {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn end(&self) -> usize {
        self.offset + self.bytes.len()
    }
}

/// `\0`-delimited runs of a buffer, skipping empty ones.
#[derive(Debug, Clone)]
pub struct Fragments<'a> {
    data: &'a [u8],
    pos: usize,
}

pub fn fragments(data: &[u8]) -> Fragments<'_> {
    Fragments { data, pos: 0 }
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.data.len() {
            let start = self.pos;
            let end = self.data[start..]
                .iter()
                .position(|&b| b == 0)
                .map_or(self.data.len(), |p| start + p);

            // Step over the terminator as well.
            self.pos = end + 1;

            if end > start {
                return Some(Fragment {
                    offset: start,
                    bytes: &self.data[start..end],
                });
            }
        }
        None
    }
}
