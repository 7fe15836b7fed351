use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Serializes Duration as seconds
pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.as_secs_f64().serialize(serializer)
}

/// Deserializes Duration from seconds
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(de::Error::custom(format!("invalid duration: {}", secs)));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Serializes an optional two-byte nonce as a hex string ("f173")
pub fn serialize_nonce<S>(nonce: &Option<[u8; 2]>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match nonce {
        Some([hi, lo]) => serializer.serialize_some(&format!("{:02x}{:02x}", hi, lo)),
        None => serializer.serialize_none(),
    }
}

/// Deserializes an optional two-byte nonce from a four digit hex string
pub fn deserialize_nonce<'de, D>(deserializer: D) -> Result<Option<[u8; 2]>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = Option::<String>::deserialize(deserializer)?;
    let Some(text) = text else {
        return Ok(None);
    };
    if text.len() != 4 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(de::Error::custom(format!("nonce must be 4 hex digits, got {:?}", text)));
    }
    let value = u16::from_str_radix(&text, 16).map_err(de::Error::custom)?;
    Ok(Some(value.to_be_bytes()))
}
