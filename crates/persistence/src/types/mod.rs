//! Core types for the persistence layer.
//!
//! - [`FieldValue`], [`Row`] - typed column values exchanged with a store
//! - [`TableSpec`], [`Column`] - static relation descriptors
//! - [`Query`], [`Predicate`] - backend-neutral reads
//! - [`Page`] - offset pagination
//! - [`Identity`] - numeric id or UUID addressing
//!
//! # Examples
//!
//! ```
//! use emr_persistence::records::Order;
//! use emr_persistence::core::Entity;
//! use emr_persistence::types::{Page, Predicate, Query, SortDirection};
//!
//! let query = Query::new(Order::TABLE)
//!     .filter(Predicate::eq("patient_id", 9_i64))
//!     .filter(Predicate::eq("voided", false))
//!     .order_by("date_activated", SortDirection::Descending)
//!     .page(Page::new(0, 25).unwrap());
//!
//! assert!(query.validate().is_ok());
//! assert_eq!(query.effective_order().len(), 2);
//! ```

mod identity;
mod pagination;
mod query;
mod table;
mod value;

pub use identity::{Identity, is_valid_uuid, normalize_uuid};
pub use pagination::Page;
pub use query::{Predicate, Query, SortDirection, SortKey, Subquery};
pub use table::{Column, ColumnKind, TableSpec};
pub use value::{FieldValue, Row, TIMESTAMP_FORMAT, parse_timestamp};
