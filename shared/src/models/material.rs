//! Recyclable material listing models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of recyclable material offered by a school
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialType {
    Plastico,
    Papel,
    Vidrio,
    MetalCobre,
    Organico,
    Electronicos,
}

impl MaterialType {
    pub const ALL: [MaterialType; 6] = [
        MaterialType::Plastico,
        MaterialType::Papel,
        MaterialType::Vidrio,
        MaterialType::MetalCobre,
        MaterialType::Organico,
        MaterialType::Electronicos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialType::Plastico => "PLASTICO",
            MaterialType::Papel => "PAPEL",
            MaterialType::Vidrio => "VIDRIO",
            MaterialType::MetalCobre => "METAL_COBRE",
            MaterialType::Organico => "ORGANICO",
            MaterialType::Electronicos => "ELECTRONICOS",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PLASTICO" => Some(MaterialType::Plastico),
            "PAPEL" => Some(MaterialType::Papel),
            "VIDRIO" => Some(MaterialType::Vidrio),
            "METAL_COBRE" => Some(MaterialType::MetalCobre),
            "ORGANICO" => Some(MaterialType::Organico),
            "ELECTRONICOS" => Some(MaterialType::Electronicos),
            _ => None,
        }
    }

    /// Fixed price per kilogram, in MXN
    pub fn unit_price_mxn(&self) -> Decimal {
        match self {
            MaterialType::Plastico => Decimal::new(200, 2),
            MaterialType::Papel => Decimal::new(150, 2),
            MaterialType::Vidrio => Decimal::new(150, 2),
            MaterialType::MetalCobre => Decimal::new(1000, 2),
            MaterialType::Organico => Decimal::new(200, 2),
            MaterialType::Electronicos => Decimal::new(250, 2),
        }
    }

    /// Spanish display label
    pub fn label_es(&self) -> &'static str {
        match self {
            MaterialType::Plastico => "Plástico",
            MaterialType::Papel => "Papel",
            MaterialType::Vidrio => "Vidrio",
            MaterialType::MetalCobre => "Metal Cobre",
            MaterialType::Organico => "Orgánico",
            MaterialType::Electronicos => "Electrónicos",
        }
    }
}

/// Lifecycle of a material listing.
///
/// `Reserved` covers the window between purchase creation and payment
/// settlement; a failed charge releases the listing back to `Available`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialStatus {
    Available,
    Reserved,
    Purchased,
}

impl MaterialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialStatus::Available => "AVAILABLE",
            MaterialStatus::Reserved => "RESERVED",
            MaterialStatus::Purchased => "PURCHASED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(MaterialStatus::Available),
            "RESERVED" => Some(MaterialStatus::Reserved),
            "PURCHASED" => Some(MaterialStatus::Purchased),
            _ => None,
        }
    }

    /// Whether a listing may move from `self` to `next`
    pub fn can_transition_to(&self, next: MaterialStatus) -> bool {
        matches!(
            (self, next),
            (MaterialStatus::Available, MaterialStatus::Reserved)
                | (MaterialStatus::Reserved, MaterialStatus::Purchased)
                | (MaterialStatus::Reserved, MaterialStatus::Available)
        )
    }
}

/// A material listing published by a school
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecyclableMaterial {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub material_type: MaterialType,
    pub quantity_kg: Decimal,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub address: String,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub schedule: String,
    pub status: MaterialStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An image attached to a material listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialImage {
    pub id: Uuid,
    pub material_id: Uuid,
    pub storage_key: String,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}
