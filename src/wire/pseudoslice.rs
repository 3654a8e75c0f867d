/// Logical concatenation of the response head and body, addressed by a
/// single cursor without materializing a combined buffer.
///
/// `get(offset, window)` returns a direct sub-slice of whichever part
/// contains `offset`, clamped so a window never straddles the boundary;
/// a drain loop advances its cursor by however many bytes came back.
#[derive(Debug, Clone, Copy)]
pub struct Pseudoslice<'a> {
    head: &'a [u8],
    body: &'a [u8],
}

impl<'a> Pseudoslice<'a> {
    pub fn new(head: &'a [u8], body: &'a [u8]) -> Self {
        Self { head, body }
    }

    pub fn len(&self) -> usize {
        self.head.len() + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_empty() && self.body.is_empty()
    }

    /// Up to `window` bytes starting at `offset`; empty once `offset` is
    /// past the end.
    pub fn get(&self, offset: usize, window: usize) -> &'a [u8] {
        if offset < self.head.len() {
            let end = (offset + window).min(self.head.len());
            &self.head[offset..end]
        } else {
            let offset = offset - self.head.len();
            if offset >= self.body.len() {
                return &[];
            }
            let end = (offset + window).min(self.body.len());
            &self.body[offset..end]
        }
    }
}
