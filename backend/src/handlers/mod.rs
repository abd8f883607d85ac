//! HTTP handlers for the Recyclable Materials Marketplace

pub mod admin;
pub mod auth;
pub mod forms;
pub mod health;
pub mod material;
pub mod profile;
pub mod purchase;
pub mod stats;
pub mod webhook;

pub use admin::{
    deactivate_user, list_materials, list_users, reconcile_purchases, register_admin,
    register_user,
};
pub use auth::{login, refresh};
pub use health::health_check;
pub use material::{
    create_material, delete_material, get_material, list_available_materials,
    list_own_materials, list_user_materials, update_material,
};
pub use profile::{get_profile, update_profile};
pub use purchase::{
    create_purchase, get_purchase, get_receipt, list_own_purchases, list_user_purchases,
};
pub use stats::school_stats;
pub use webhook::handle_payment_webhook;
