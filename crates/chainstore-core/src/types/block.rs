use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};

/// Height of a block in the main chain (zero-based)
pub type BlockIndex = u32;

/// Serialized block as stored by the ledger
///
/// The storage layer never inspects the bytes: `block` is the serialized
/// block and `transactions` the serialized transactions the node attaches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawBlock {
    #[serde(with = "hex_bytes")]
    pub block: Vec<u8>,

    #[serde(default, with = "hex_bytes_list")]
    pub transactions: Vec<Vec<u8>>,
}

impl RawBlock {
    pub fn new(block: Vec<u8>) -> Self {
        Self {
            block,
            transactions: Vec::new(),
        }
    }

    pub fn with_transactions(mut self, transactions: Vec<Vec<u8>>) -> Self {
        self.transactions = transactions;
        self
    }

    /// Canonical text form: JSON with hex-encoded byte strings
    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn from_canonical_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

mod hex_bytes_list {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(list: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(list.len()))?;
        for bytes in list {
            seq.serialize_element(&hex::encode(bytes))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        let list = Vec::<String>::deserialize(deserializer)?;
        list.into_iter()
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_form_is_stable() {
        let block = RawBlock::new(vec![0xde, 0xad]).with_transactions(vec![vec![0x01], vec![]]);
        let json = block.to_canonical_json().unwrap();
        assert_eq!(
            std::str::from_utf8(&json).unwrap(),
            r#"{"block":"dead","transactions":["01",""]}"#
        );
        assert_eq!(RawBlock::from_canonical_json(&json).unwrap(), block);
    }

    #[test]
    fn test_missing_transactions_default_to_empty() {
        let block = RawBlock::from_canonical_json(br#"{"block":"00ff"}"#).unwrap();
        assert_eq!(block.block, vec![0x00, 0xff]);
        assert!(block.transactions.is_empty());
    }

    #[test]
    fn test_garbage_is_a_serialization_error() {
        let err = RawBlock::from_canonical_json(b"{not json").unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));

        let err = RawBlock::from_canonical_json(br#"{"block":"zz"}"#).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
