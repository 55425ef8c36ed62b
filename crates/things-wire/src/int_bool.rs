use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A boolean transmitted as integer `0`/`1`, decoded and re-encoded
/// symmetrically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntBool(pub bool);

impl IntBool {
    pub fn get(self) -> bool {
        self.0
    }
}

impl<'de> Deserialize<'de> for IntBool {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let n = i64::deserialize(deserializer)?;
        Ok(IntBool(n != 0))
    }
}

impl Serialize for IntBool {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(if self.0 { 1 } else { 0 })
    }
}
