//! Success envelopes.
//!
//! - [`Envelope`] - `{ "success": true, "data": ... }`
//! - [`UpdateEnvelope`] - adds `message` and `updated_fields` to the above

mod envelope;

pub use envelope::{Envelope, UpdateEnvelope};
