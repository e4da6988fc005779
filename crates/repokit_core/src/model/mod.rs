//! Entity contracts and the sample domain model.
//!
//! # Responsibility
//! - Define the `Entity`/`EntityId` traits every repository is generic over.
//! - Provide the Member/Team sample entities.
//!
//! # Invariants
//! - Relations are stored as identifier references, never embedded records.

pub mod entity;
pub mod member;
pub mod team;
