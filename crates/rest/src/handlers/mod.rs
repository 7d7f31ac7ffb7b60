//! HTTP request handlers.
//!
//! - [`records`] - Generic create / list / read / update / retire handlers
//! - [`lookups`] - Order number, name searches and encounter date range lookups
//! - [`visits`] - Visit listings and the stop action
//! - [`diagnoses`] - Enriched diagnosis views
//! - [`vitals`] - Vital signs of a visit
//! - [`providers`] - Providers with their person
//! - [`system`] - Upstream OpenMRS checks
//! - [`health`] - Health check endpoint
//! - [`fallback`] - Unknown routes and methods

pub mod diagnoses;
pub mod fallback;
pub mod health;
pub mod lookups;
pub mod providers;
pub mod records;
pub mod system;
pub mod visits;
pub mod vitals;

pub use health::health_handler;
