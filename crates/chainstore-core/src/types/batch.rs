use std::collections::BTreeSet;

/// Key/value pairs to insert, in application order
pub type RawInserts = Vec<(Vec<u8>, Vec<u8>)>;

/// Batch of mutations handed to [`Database::write`](crate::traits::Database::write)
///
/// Stores call both extractors exactly once per write and apply every
/// insertion before any removal.
pub trait WriteBatch {
    /// Drain the key/value pairs to insert
    fn extract_raw_data_to_insert(&mut self) -> RawInserts;

    /// Drain the keys to remove
    fn extract_raw_keys_to_remove(&mut self) -> Vec<Vec<u8>>;
}

/// Batch of lookups handed to [`Database::read`](crate::traits::Database::read)
pub trait ReadBatch {
    /// Keys to look up, in result order
    fn raw_keys(&self) -> Vec<Vec<u8>>;

    /// Receive one result per key, parallel to [`ReadBatch::raw_keys`]
    fn submit_raw_result(&mut self, results: Vec<ReadResult>);
}

/// Outcome of one lookup
///
/// A missing key is not an error: it yields an empty value with
/// `found == false`, which multi-get callers rely on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadResult {
    pub value: Vec<u8>,
    pub found: bool,
}

impl ReadResult {
    pub fn found(value: Vec<u8>) -> Self {
        Self { value, found: true }
    }

    pub fn missing() -> Self {
        Self::default()
    }

    pub fn into_option(self) -> Option<Vec<u8>> {
        self.found.then_some(self.value)
    }
}

/// Plain write batch
///
/// Insert and remove calls keep their call order even though stores apply
/// insertions before removals: an `insert` cancels an earlier `remove` of the
/// same key, and a `remove` after an `insert` wins because removals run last.
/// Removals are deduplicated and handed out in key order.
#[derive(Debug, Clone, Default)]
pub struct RawWriteBatch {
    inserts: RawInserts,
    removals: BTreeSet<Vec<u8>>,
}

impl RawWriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        let key = key.into();
        self.removals.remove(&key);
        self.inserts.push((key, value.into()));
        self
    }

    pub fn remove(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.removals.insert(key.into());
        self
    }

    /// Total number of queued operations
    pub fn len(&self) -> usize {
        self.inserts.len() + self.removals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.removals.is_empty()
    }
}

impl WriteBatch for RawWriteBatch {
    fn extract_raw_data_to_insert(&mut self) -> RawInserts {
        std::mem::take(&mut self.inserts)
    }

    fn extract_raw_keys_to_remove(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.removals).into_iter().collect()
    }
}

/// Plain read batch
#[derive(Debug, Clone, Default)]
pub struct RawReadBatch {
    keys: Vec<Vec<u8>>,
    results: Vec<ReadResult>,
}

impl RawReadBatch {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            results: Vec::new(),
        }
    }

    pub fn keys(&self) -> &[Vec<u8>] {
        &self.keys
    }

    /// Results of the last read, parallel to [`RawReadBatch::keys`]
    pub fn results(&self) -> &[ReadResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ReadResult> {
        self.results
    }
}

impl ReadBatch for RawReadBatch {
    fn raw_keys(&self) -> Vec<Vec<u8>> {
        self.keys.clone()
    }

    fn submit_raw_result(&mut self, results: Vec<ReadResult>) {
        self.results = results;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_drains_batch() {
        let mut batch = RawWriteBatch::new();
        batch.insert("a", "1").insert("b", "2").remove("c");
        assert_eq!(batch.len(), 3);

        let inserts = batch.extract_raw_data_to_insert();
        let removals = batch.extract_raw_keys_to_remove();
        assert_eq!(inserts.len(), 2);
        assert_eq!(removals, vec![b"c".to_vec()]);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_insert_after_remove_cancels_removal() {
        let mut batch = RawWriteBatch::new();
        batch.remove("k").insert("k", "v");

        assert_eq!(batch.extract_raw_keys_to_remove(), Vec::<Vec<u8>>::new());
        assert_eq!(
            batch.extract_raw_data_to_insert(),
            vec![(b"k".to_vec(), b"v".to_vec())]
        );
    }

    #[test]
    fn test_remove_after_insert_is_kept() {
        let mut batch = RawWriteBatch::new();
        batch.insert("k", "v").remove("k");

        assert_eq!(batch.extract_raw_data_to_insert().len(), 1);
        assert_eq!(batch.extract_raw_keys_to_remove(), vec![b"k".to_vec()]);
    }

    #[test]
    fn test_removals_deduplicated_and_cancelled_per_key() {
        let mut batch = RawWriteBatch::new();
        for i in 0..10_000u32 {
            batch.remove(i.to_be_bytes().to_vec());
        }
        batch.remove(5u32.to_be_bytes().to_vec());
        batch.insert(7u32.to_be_bytes().to_vec(), "v");
        assert_eq!(batch.len(), 10_000);

        let removals = batch.extract_raw_keys_to_remove();
        assert_eq!(removals.len(), 9_999);
        assert!(!removals.contains(&7u32.to_be_bytes().to_vec()));
        assert!(removals.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_read_result_option() {
        assert_eq!(ReadResult::found(b"x".to_vec()).into_option(), Some(b"x".to_vec()));
        assert_eq!(ReadResult::missing().into_option(), None);
        assert!(ReadResult::missing().value.is_empty());
    }
}
