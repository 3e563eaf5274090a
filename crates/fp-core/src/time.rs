//! Serde helpers for durations.
//!
//! Durations are stored as integer milliseconds on the wire. In memory they
//! stay `TimeDelta`, so offset arithmetic is exact. Timestamps may carry
//! sub-millisecond fractions, so a computed duration can be finer than the
//! wire format; writing it truncates toward zero.

/// (De)serializes a `TimeDelta` as integer milliseconds.
pub mod duration_ms {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(value.num_milliseconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<TimeDelta, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = i64::deserialize(deserializer)?;
        TimeDelta::try_milliseconds(ms)
            .ok_or_else(|| serde::de::Error::custom(format!("duration out of range: {ms} ms")))
    }
}
