use smallvec::SmallVec;

/// Query-string map: insertion-ordered, unique keys with last-wins on
/// duplicates, bounded by the configured entry limit. Keys and values
/// borrow the receive buffer; no percent-decoding happens at this layer.
#[derive(Debug)]
pub struct QueryMap<'b> {
    entries: SmallVec<[(&'b str, &'b str); 8]>,
    limit: usize,
}

const DEFAULT_QUERY_COUNT_MAX: usize = 8;

impl<'b> QueryMap<'b> {
    /// Empty map bounded at the default entry limit.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_QUERY_COUNT_MAX)
    }

    /// Empty map bounded at `limit` entries.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: SmallVec::new(),
            limit,
        }
    }

    /// Parse `key=value` pairs separated by `&` from a raw query string
    /// (without the leading `?`). Entries past the limit are dropped.
    pub(crate) fn parse(&mut self, raw: &'b str) {
        for pair in raw.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = match pair.find('=') {
                Some(i) => (&pair[..i], &pair[i + 1..]),
                None => (pair, ""),
            };
            self.insert(key, value);
        }
    }

    fn insert(&mut self, key: &'b str, value: &'b str) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
            return;
        }
        if self.entries.len() < self.limit {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&'b str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&'b str, &'b str)> + '_ {
        self.entries.iter().copied()
    }

}

impl Default for QueryMap<'_> {
    fn default() -> Self {
        Self::new()
    }
}
