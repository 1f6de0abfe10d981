/// Partition names and key encoding for the ledger keyspace
///
/// Partition structure:
/// - `status`: item:{item_id} -> StatusRecord (JSON)
/// - `failures`: failed:{item_id} -> FailureRecord (JSON)
use crate::item::ItemId;

pub const STATUS_PARTITION: &str = "status";
pub const FAILURES_PARTITION: &str = "failures";

const STATUS_PREFIX: &str = "item:";
const FAILURE_PREFIX: &str = "failed:";

/// Encode a status key: item:{item_id}
pub fn encode_status_key(id: &ItemId) -> Vec<u8> {
    format!("{}{}", STATUS_PREFIX, id).into_bytes()
}

/// Encode a failure key: failed:{item_id}
pub fn encode_failure_key(id: &ItemId) -> Vec<u8> {
    format!("{}{}", FAILURE_PREFIX, id).into_bytes()
}

/// Decode a status key: item:{item_id} -> item_id
pub fn decode_status_key(key: &[u8]) -> Option<ItemId> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str
        .strip_prefix(STATUS_PREFIX)
        .filter(|id| !id.is_empty())
        .map(ItemId::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_key_encoding() {
        let id = ItemId::from(570u64);
        let key = encode_status_key(&id);
        assert_eq!(key, b"item:570");
        assert_eq!(decode_status_key(&key), Some(id));
    }

    #[test]
    fn test_failure_key_encoding() {
        let id = ItemId::from("itad:018d");
        let key = encode_failure_key(&id);
        assert_eq!(key, b"failed:itad:018d");
    }

    #[test]
    fn test_decode_rejects_foreign_prefix() {
        assert_eq!(decode_status_key(b"failed:570"), None);
        assert_eq!(decode_status_key(b"item:"), None);
    }
}
