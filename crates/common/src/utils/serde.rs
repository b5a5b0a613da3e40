//! Serde helpers for configuration values

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// (De)serialize a [`Duration`] as whole milliseconds
///
/// ```rust
/// use std::time::Duration;
///
/// use serde::{Deserialize, Serialize};
/// use zeda_common::duration_millis;
///
/// #[derive(Serialize, Deserialize)]
/// struct Tunables {
///     #[serde(with = "duration_millis")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::{Deserialize, Deserializer, Duration, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
