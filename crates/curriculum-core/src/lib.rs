//! Core types and planning logic for curriculum administration.
//!
//! This crate has no HTTP or database dependencies. It
//! holds the pure pieces (slot ordering, prerequisite conflict detection,
//! assignment reconciliation) and the editing session that drives them
//! against any [`store::CurriculumStore`] backend.

pub mod conflict;
pub mod curriculum;
pub mod edit;
pub mod error;
pub mod ordering;
pub mod reconcile;
pub mod session;
pub mod store;

pub use error::{Error, Result};
