//! Database models for the Recyclable Materials Marketplace
//!
//! Re-exports models from the shared crate and adds backend-specific models

pub use shared::models::*;
