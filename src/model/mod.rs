//! Domain model for persisted documents.
//!
//! # Responsibility
//! - Define the typed value vocabulary, attribute typecasting, and the
//!   document capability set consumed by the repository.
//!
//! # Invariants
//! - Every stored field value is an instance of its declared kind.
//! - Reserved fields are repository-managed and never part of a class's
//!   declared attributes.

pub mod attribute;
pub mod document;
pub mod index;
pub mod value;
