use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A Unix-seconds timestamp as the wire encodes it: numeric, possibly
/// fractional, with `0` meaning the epoch (a real point in time) rather than
/// "unset" — unset is represented by the field being absent or JSON `null`,
/// which is handled one level up by [`things_core::Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    pub fn from_unix_seconds(secs: f64) -> Timestamp {
        let whole = secs.floor();
        let nanos = ((secs - whole) * 1_000_000_000.0).round().clamp(0.0, 999_999_999.0) as u32;
        let whole = whole as i64;
        let dt = Utc
            .timestamp_opt(whole, nanos)
            .single()
            .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap());
        Timestamp(dt)
    }

    pub fn to_unix_seconds(self) -> i64 {
        self.0.timestamp()
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Timestamp::from_unix_seconds(secs))
    }
}

impl Serialize for Timestamp {
    /// Marshalling always produces an integer representation, even if the
    /// original value that produced this `Timestamp` was fractional.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.to_unix_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_a_real_timestamp_not_unset() {
        let ts = Timestamp::from_unix_seconds(0.0);
        assert_eq!(ts.to_unix_seconds(), 0);
    }

    #[test]
    fn fractional_seconds_parse_to_the_same_moment_as_the_integer_part() {
        let whole = Timestamp::from_unix_seconds(1_700_000_000.0);
        let fractional = Timestamp::from_unix_seconds(1_700_000_000.4);
        assert_eq!(whole.to_unix_seconds(), fractional.to_unix_seconds());
    }

    #[test]
    fn marshalling_back_is_integer() {
        let ts = Timestamp::from_unix_seconds(1_700_000_000.75);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "1700000000");
    }

    #[test]
    fn roundtrips_through_json() {
        let ts = Timestamp::from_unix_seconds(1_700_000_000.0);
        let json = serde_json::to_string(&ts).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
