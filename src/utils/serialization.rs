// Record codec for everything the store persists
use crate::error::Result;

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    Ok(bincode::encode_to_vec(data, config)?)
}

/// Deserialize data using bincode 2.0 with standard configuration
pub fn deserialize<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T> {
    let config = bincode::config::standard();
    let (data, _) = bincode::decode_from_slice(bytes, config)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, bincode::Encode, bincode::Decode)]
    struct Record {
        id: String,
        owner: Option<String>,
        links: Vec<String>,
    }

    #[test]
    fn test_serialize_deserialize() {
        let record = Record {
            id: "nft-1".to_string(),
            owner: None,
            links: vec!["tx-1".to_string(), "tx-2".to_string()],
        };

        let serialized = serialize(&record).expect("Serialization should work");
        let deserialized: Record = deserialize(&serialized).expect("Deserialization should work");

        assert_eq!(record, deserialized);
    }

    #[test]
    fn test_deserialize_invalid_data() {
        let invalid_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<Record> = deserialize(&invalid_bytes);
        assert!(result.is_err());
    }
}
