use serde::{Deserialize, Deserializer};

/// Partial-update semantics for one field of a payload: a modify event's
/// payload may omit a field (unchanged), explicitly null it on a nullable
/// field (clear), or supply a value (set). JSON itself
/// can't distinguish "absent" from "present but null" through a plain
/// `Option`, so this is the "double option" shape: absent key -> `Absent`,
/// `null` -> `Clear`, any other value -> `Set`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    /// The key was missing from the payload. Leave the snapshot's field as-is.
    #[default]
    Absent,
    /// The key was present and explicitly `null`. Clear the snapshot's field.
    Clear,
    /// The key was present with a value. Overwrite the snapshot's field.
    Set(T),
}

impl<T> Field<T> {
    /// Applies this field update onto a prior `Option<T>`, per projection
    /// rules: `Absent` keeps the prior value untouched, `Clear` erases it,
    /// `Set` overwrites it.
    pub fn apply(self, prior: Option<T>) -> Option<T> {
        match self {
            Field::Absent => prior,
            Field::Clear => None,
            Field::Set(v) => Some(v),
        }
    }

    /// Like [`apply`](Self::apply) but for a non-optional field with a
    /// default: `Absent` keeps `prior`, `Clear` is not meaningful (falls back
    /// to `prior`, since the field has no null representation), `Set`
    /// overwrites.
    pub fn apply_required(self, prior: T) -> T {
        match self {
            Field::Absent | Field::Clear => prior,
            Field::Set(v) => v,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Field::Absent => Field::Absent,
            Field::Clear => Field::Clear,
            Field::Set(v) => Field::Set(f(v)),
        }
    }
}

impl<'de, T> Deserialize<'de> for Field<T>
where
    T: Deserialize<'de>,
{
    /// Only called when the key is present (paired with `#[serde(default)]`
    /// on the field); an absent key leaves the `Default::default()` ==
    /// `Field::Absent`. A present `null` deserializes to `Option::None`
    /// here, which we map to `Clear`; any other value is `Set`.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Field::Set(v),
            None => Field::Clear,
        })
    }
}
