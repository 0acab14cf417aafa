use std::sync::Arc;

/// Fixed-size table of decoded strings keyed by their raw bytes.
///
/// Slots are overwritten in strict round-robin insertion order. A key that is
/// looked up often is not protected from eviction; the table only saves the
/// UTF-8 validation and allocation for recently inserted keys.
#[derive(Debug)]
pub struct StringCache {
    entries: Vec<Option<Entry>>,
    max_key_len: usize,
    next: usize,
    hits: u64,
    misses: u64,
}

#[derive(Debug)]
struct Entry {
    key: Box<[u8]>,
    value: Arc<str>,
}

impl StringCache {
    /// `max_key_len` of 0 caches keys of any length.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize, max_key_len: usize) -> Self {
        assert!(capacity > 0, "string cache capacity must be non-zero");
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, || None);
        Self {
            entries,
            max_key_len,
            next: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.find(key).is_some()
    }

    pub fn get_or_insert(&mut self, key: &[u8]) -> Result<Arc<str>, std::str::Utf8Error> {
        if self.max_key_len > 0 && key.len() > self.max_key_len {
            return std::str::from_utf8(key).map(Arc::from);
        }

        if let Some(value) = self.find(key).cloned() {
            self.hits += 1;
            return Ok(value);
        }

        self.misses += 1;
        let value: Arc<str> = Arc::from(std::str::from_utf8(key)?);
        let slot = self.next % self.entries.len();
        self.next = self.next.wrapping_add(1);
        self.entries[slot] = Some(Entry {
            key: key.into(),
            value: Arc::clone(&value),
        });
        Ok(value)
    }

    fn find(&self, key: &[u8]) -> Option<&Arc<str>> {
        self.entries
            .iter()
            .flatten()
            .find(|e| *e.key == *key)
            .map(|e| &e.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_returns_shared_value() {
        let mut cache = StringCache::new(4, 0);
        let first = cache.get_or_insert(b"/path").unwrap();
        let second = cache.get_or_insert(b"/path").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn round_robin_eviction_ignores_recency() {
        let mut cache = StringCache::new(2, 0);
        cache.get_or_insert(b"A").unwrap();
        cache.get_or_insert(b"B").unwrap();
        // Frequent lookups of A do not protect it.
        for _ in 0..5 {
            cache.get_or_insert(b"A").unwrap();
        }
        cache.get_or_insert(b"C").unwrap();

        assert!(!cache.contains(b"A"));
        assert!(cache.contains(b"B"));
        assert!(cache.contains(b"C"));

        let misses = cache.misses();
        let value = cache.get_or_insert(b"A").unwrap();
        assert_eq!(&*value, "A");
        assert_eq!(cache.misses(), misses + 1);
    }

    #[test]
    fn long_keys_bypass_cache() {
        let mut cache = StringCache::new(2, 4);
        let value = cache.get_or_insert(b"too-long").unwrap();
        assert_eq!(&*value, "too-long");
        assert!(!cache.contains(b"too-long"));
        assert_eq!(cache.misses(), 0);
    }

    #[test]
    fn invalid_utf8_is_not_cached() {
        let mut cache = StringCache::new(2, 0);
        assert!(cache.get_or_insert(&[0xff, 0xfe]).is_err());
        assert!(!cache.contains(&[0xff, 0xfe]));
    }
}
