//! JSON envelopes wrapping successful responses.

use std::collections::BTreeSet;

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use emr_persistence::core::Updated;
use serde::Serialize;

/// `{ "success": true, "data": ... }`
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    /// Always true.
    pub success: bool,
    /// The payload.
    pub data: T,
}

impl<T> Envelope<T> {
    /// Wraps `data`.
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Response to a partial update or full replace.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateEnvelope<T> {
    /// Always true.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Columns whose value changed, sorted.
    pub updated_fields: BTreeSet<&'static str>,
    /// The record as stored after the update.
    pub data: T,
}

impl<T> UpdateEnvelope<T> {
    /// Wraps an update result for a record of type `record`.
    pub fn new(record: &str, updated: Updated<T>) -> Self {
        let message = if updated.updated_fields.is_empty() {
            format!("{} unchanged", record)
        } else {
            format!(
                "{} updated ({} field{})",
                record,
                updated.updated_fields.len(),
                if updated.updated_fields.len() == 1 { "" } else { "s" }
            )
        };
        Self {
            success: true,
            message,
            updated_fields: updated.updated_fields,
            data: updated.record,
        }
    }
}

impl<T: Serialize> IntoResponse for UpdateEnvelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let value = serde_json::to_value(Envelope::new(vec![1, 2])).unwrap();
        assert_eq!(value, serde_json::json!({ "success": true, "data": [1, 2] }));
    }

    #[test]
    fn test_update_message() {
        let updated = Updated {
            record: 7,
            updated_fields: BTreeSet::from(["date_changed", "instructions"]),
        };
        let envelope = UpdateEnvelope::new("Order", updated);
        assert_eq!(envelope.message, "Order updated (2 fields)");

        let unchanged = Updated {
            record: 7,
            updated_fields: BTreeSet::new(),
        };
        assert_eq!(UpdateEnvelope::new("Order", unchanged).message, "Order unchanged");
    }
}
