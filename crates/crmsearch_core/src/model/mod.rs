//! CRM domain objects consumed by the search layer.
//!
//! # Responsibility
//! - Define the records the relational store hydrates (accounts, users).
//! - Expose every record through the [`value::Attributes`] protocol so the
//!   document layer can read it without knowing its concrete type.

pub mod account;
pub mod user;
pub mod value;
