//! Serde adapters for arkworks types that only speak `CanonicalSerialize`.

/// Field elements as 0x-prefixed little-endian hex strings.
///
/// Use with `#[serde(with = "crate::crypto_serde::field")]`.
pub mod field {
    use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::ledger::serialization::{canonical_deserialize_hex, canonical_serialize_hex};

    pub fn serialize<F, S>(value: &F, serializer: S) -> Result<S::Ok, S::Error>
    where
        F: CanonicalSerialize,
        S: Serializer,
    {
        let encoded = canonical_serialize_hex(value).map_err(S::Error::custom)?;
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, F, D>(deserializer: D) -> Result<F, D::Error>
    where
        F: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        canonical_deserialize_hex(&encoded).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use crate::field::Scalar;

    #[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
    struct Keyed {
        #[serde(with = "super::field")]
        key: Scalar,
    }

    #[test]
    fn field_elements_travel_as_hex() {
        let keyed = Keyed {
            key: Scalar::from(5u64),
        };
        let json = serde_json::to_value(&keyed).unwrap();
        assert!(json["key"].as_str().unwrap().starts_with("0x"));
        let restored: Keyed = serde_json::from_value(json).unwrap();
        assert_eq!(restored, keyed);
    }

    #[test]
    fn garbage_hex_is_rejected() {
        let parsed = serde_json::from_str::<Keyed>(r#"{"key":"0xnothex"}"#);
        assert!(parsed.is_err());
    }
}
