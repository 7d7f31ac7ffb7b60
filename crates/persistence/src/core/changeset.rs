//! Typed partial updates.
//!
//! A change set names, field by field, what a caller wants modified. Each
//! field is a [`Patch`], which keeps "not mentioned" apart from "cleared":
//!
//! | JSON            | `Patch`        | effect              |
//! |-----------------|----------------|---------------------|
//! | key absent      | `Omitted`      | field untouched     |
//! | `"key": null`   | `Null`         | field cleared       |
//! | `"key": value`  | `Set(value)`   | field overwritten   |
//!
//! Change set structs mark each field `#[serde(default)]` so a missing key
//! decodes as [`Patch::Omitted`].

use std::fmt;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::error::ValidationError;

/// One field of a partial update.
#[derive(Clone, PartialEq)]
pub enum Patch<T> {
    /// The field was not mentioned.
    Omitted,
    /// The field was explicitly set to null.
    Null,
    /// The field was set to a value.
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Omitted
    }
}

impl<T: fmt::Debug> fmt::Debug for Patch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Patch::Omitted => write!(f, "Omitted"),
            Patch::Null => write!(f, "Null"),
            Patch::Set(v) => f.debug_tuple("Set").field(v).finish(),
        }
    }
}

impl<T> Patch<T> {
    /// True when the field was not mentioned.
    pub fn is_omitted(&self) -> bool {
        matches!(self, Patch::Omitted)
    }

    /// True when the field was mentioned, as a value or as null.
    pub fn is_present(&self) -> bool {
        !self.is_omitted()
    }

    /// Fails if a non-nullable field was explicitly nulled.
    pub fn require_non_null(
        &self,
        record: &'static str,
        field: &'static str,
    ) -> Result<(), ValidationError> {
        match self {
            Patch::Null => Err(ValidationError::NullNotAllowed { record, field }),
            _ => Ok(()),
        }
    }
}

impl<T: Clone> Patch<T> {
    /// Applies the patch to a nullable field.
    pub fn apply_nullable(&self, target: &mut Option<T>) {
        match self {
            Patch::Omitted => {}
            Patch::Null => *target = None,
            Patch::Set(v) => *target = Some(v.clone()),
        }
    }

    /// Applies the patch to a non-nullable field. `Null` must have been
    /// rejected by [`Patch::require_non_null`] beforehand and is ignored here.
    pub fn apply_required(&self, target: &mut T) {
        if let Patch::Set(v) = self {
            *target = v.clone();
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Patch::Null, Patch::Set)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Set(v) => v.serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }
}

/// A typed partial update for record type `R`.
pub trait ChangeSet<R>: Send + Sync {
    /// Names of the fields the caller mentioned.
    fn present_fields(&self) -> Vec<&'static str>;

    /// True when no field was mentioned.
    fn is_empty(&self) -> bool {
        self.present_fields().is_empty()
    }

    /// Shape checks that must pass before the store is touched.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Writes every present field into `record`.
    fn apply(&self, record: &mut R);

    /// Actor responsible for the change, used for audit stamping.
    fn changed_by(&self) -> Option<i64> {
        None
    }
}

/// A complete replacement payload for record type `R`.
///
/// The payload type enumerates every writable field; nullable fields left out
/// of the JSON decode as `None` and are written as such.
pub trait Replacement<R>: Send + Sync {
    /// Shape checks that must pass before the store is touched.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// UUID carried in the payload, if any. Must match the addressed record.
    fn uuid(&self) -> Option<&str> {
        None
    }

    /// Writes every payload field into `record`.
    fn apply(&self, record: &mut R);

    /// Actor responsible for the change, used for audit stamping.
    fn changed_by(&self) -> Option<i64> {
        None
    }
}

/// Collects the names of the non-omitted [`Patch`] fields of a change set.
#[macro_export]
macro_rules! present_fields {
    ($changes:expr; $($field:ident),* $(,)?) => {{
        let mut fields: Vec<&'static str> = Vec::new();
        $(
            if $changes.$field.is_present() {
                fields.push(stringify!($field));
            }
        )*
        fields
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    struct Sample {
        #[serde(default)]
        label: Patch<String>,
        #[serde(default)]
        count: Patch<i64>,
    }

    #[test]
    fn test_patch_distinguishes_omitted_from_null() {
        let sample: Sample = serde_json::from_str(r#"{"label": null}"#).unwrap();
        assert_eq!(sample.label, Patch::Null);
        assert_eq!(sample.count, Patch::Omitted);

        let sample: Sample = serde_json::from_str(r#"{"count": 3}"#).unwrap();
        assert_eq!(sample.count, Patch::Set(3));
        assert!(sample.label.is_omitted());
    }

    #[test]
    fn test_apply_nullable() {
        let mut field = Some("old".to_string());
        Patch::Omitted.apply_nullable(&mut field);
        assert_eq!(field.as_deref(), Some("old"));
        Patch::Set("new".to_string()).apply_nullable(&mut field);
        assert_eq!(field.as_deref(), Some("new"));
        Patch::Null.apply_nullable(&mut field);
        assert_eq!(field, None);
    }

    #[test]
    fn test_required_field_rejects_null() {
        let patch: Patch<i64> = Patch::Null;
        assert_eq!(
            patch.require_non_null("Order", "patient_id"),
            Err(ValidationError::NullNotAllowed {
                record: "Order",
                field: "patient_id"
            })
        );
        let mut value = 9;
        Patch::Set(10).apply_required(&mut value);
        assert_eq!(value, 10);
    }

    #[test]
    fn test_present_fields_macro() {
        let sample: Sample = serde_json::from_str(r#"{"label": "x", "count": null}"#).unwrap();
        let fields = present_fields!(sample; label, count);
        assert_eq!(fields, vec!["label", "count"]);
        let empty = Sample::default();
        assert!(present_fields!(empty; label, count).is_empty());
    }
}
