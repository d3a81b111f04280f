//! CRM search documents and their registry.
//!
//! # Responsibility
//! - Define the Account and User search documents.
//! - Build the registry injected into queries and the lifecycle manager.

pub mod accounts;
pub mod registry;
pub mod users;

use crate::error::CoreResult;

pub use registry::{Registry, Selection};

/// Registry with every CRM document type: accounts, then users.
pub fn default_registry() -> CoreResult<Registry> {
    Registry::new([accounts::account_document()?, users::user_document()?])
}

#[cfg(test)]
mod tests {
    use super::default_registry;

    #[test]
    fn default_registry_builds() {
        let registry = default_registry().expect("registry");
        assert_eq!(registry.indices(), vec!["account".to_string(), "user".to_string()]);
        assert!(registry.document("account").is_ok());
        assert!(registry.document("user").is_ok());
    }
}
