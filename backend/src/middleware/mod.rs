//! HTTP middleware for the Recyclable Materials Marketplace

pub mod auth;

pub use auth::{auth_middleware, AuthUser, CurrentUser};
