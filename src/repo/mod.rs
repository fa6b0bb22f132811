//! Repository layer: the save/find protocol over document storage.
//!
//! # Responsibility
//! - Orchestrate serialization, timestamping, and index synchronization
//!   for document persistence.
//! - Keep backend query details behind the storage contract.
//!
//! # Invariants
//! - Repository operations return semantic errors (`RecordNotFound`,
//!   `MissingIndex`) in addition to backend transport errors.

pub mod clock;
pub mod repository;
