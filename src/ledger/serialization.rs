use anyhow::{anyhow, Result};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

/// Canonically serializes any arkworks type into a compressed byte vector.
pub fn canonical_serialize_bytes<T>(value: &T) -> Result<Vec<u8>>
where
    T: CanonicalSerialize,
{
    let mut buf = Vec::new();
    value
        .serialize_compressed(&mut buf)
        .map_err(|err| anyhow!("canonical serialize failed: {err}"))?;
    Ok(buf)
}

/// Canonically serializes any arkworks type into a lowercase hex string with a `0x` prefix.
pub fn canonical_serialize_hex<T>(value: &T) -> Result<String>
where
    T: CanonicalSerialize,
{
    canonical_serialize_bytes(value).map(|buf| format!("0x{}", hex::encode(buf)))
}

/// Canonically deserializes a value from a hex string (accepts optional 0x prefix).
///
/// Field elements at or above the modulus are rejected by the arkworks validity check.
pub fn canonical_deserialize_hex<T>(value: &str) -> Result<T>
where
    T: CanonicalDeserialize,
{
    let bytes = decode_hex_bytes(value)?;
    T::deserialize_compressed(&mut &bytes[..])
        .map_err(|err| anyhow!("canonical deserialize failed: {err}"))
}

fn decode_hex_bytes(value: &str) -> Result<Vec<u8>> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(trimmed).map_err(|err| anyhow!("invalid hex: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Scalar, FIELD_MODULUS};

    #[test]
    fn scalar_hex_accepts_optional_prefix() {
        let value = Scalar::from(123_456u64);
        let hex = canonical_serialize_hex(&value).unwrap();
        assert!(hex.starts_with("0x"));
        let parsed: Scalar = canonical_deserialize_hex(&hex).unwrap();
        assert_eq!(parsed, value);
        let parsed: Scalar = canonical_deserialize_hex(hex.trim_start_matches("0x")).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn non_canonical_scalars_are_rejected() {
        let mut bytes = FIELD_MODULUS.to_bytes_le();
        bytes.resize(32, 0);
        let hex = format!("0x{}", hex::encode(bytes));
        assert!(canonical_deserialize_hex::<Scalar>(&hex).is_err());
        assert!(canonical_deserialize_hex::<Scalar>("0xzz").is_err());
    }
}
