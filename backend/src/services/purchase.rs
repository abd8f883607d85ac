//! Purchase and payment settlement service
//!
//! A purchase reserves its material inside one transaction holding a row
//! lock, so two companies cannot buy the same listing. Settlement arrives
//! through the payment webhook and is idempotent: a purchase leaves
//! PENDING exactly once.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::material::parse_material_type;
use shared::{
    validate_email, validate_mexican_phone, validate_rfc, MaterialStatus, MaterialType,
    PaymentStatus, Purchase,
};

/// Purchase service
#[derive(Clone)]
pub struct PurchaseService {
    db: PgPool,
}

/// Database row for a purchase
#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: Uuid,
    folio: String,
    user_id: Uuid,
    material_id: Uuid,
    company_name: String,
    company_rfc: String,
    company_address: String,
    company_phone: String,
    transporter_name: String,
    transporter_phone: String,
    transporter_info: String,
    collection_date: NaiveDate,
    total_amount: Decimal,
    payment_status: String,
    charge_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const PURCHASE_COLUMNS: &str = "id, folio, user_id, material_id, company_name, company_rfc, \
     company_address, company_phone, transporter_name, transporter_phone, transporter_info, \
     collection_date, total_amount, payment_status, charge_id, created_at, updated_at";

impl PurchaseRow {
    fn into_purchase(self) -> AppResult<Purchase> {
        Ok(Purchase {
            id: self.id,
            folio: self.folio,
            user_id: self.user_id,
            material_id: self.material_id,
            company_name: self.company_name,
            company_rfc: self.company_rfc,
            company_address: self.company_address,
            company_phone: self.company_phone,
            transporter_name: self.transporter_name,
            transporter_phone: self.transporter_phone,
            transporter_info: self.transporter_info,
            collection_date: self.collection_date,
            total_amount: self.total_amount,
            payment_status: parse_payment_status(&self.payment_status)?,
            charge_id: self.charge_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Input for creating a purchase
#[derive(Debug, Deserialize)]
pub struct CreatePurchaseInput {
    pub material_id: Uuid,
    pub company_name: String,
    pub company_rfc: String,
    pub company_address: String,
    pub company_phone: String,
    pub transporter_name: String,
    pub transporter_phone: String,
    pub transporter_info: String,
    pub collection_date: NaiveDate,
    pub customer_name: String,
    pub customer_email: String,
}

/// A freshly created purchase plus the material facts the charge needs
#[derive(Debug)]
pub struct CreatedPurchase {
    pub purchase: Purchase,
    pub material_title: String,
    pub material_type: MaterialType,
    pub quantity_kg: Decimal,
}

/// A purchase with material and seller context, for list views
#[derive(Debug, Serialize)]
pub struct PurchaseListItem {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub material_title: String,
    pub material_type: String,
    pub quantity_kg: Decimal,
    pub school_name: String,
}

/// Full purchase detail, as used by the receipt
#[derive(Debug, Serialize)]
pub struct PurchaseDetail {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub material_title: String,
    pub material_type: String,
    pub quantity_kg: Decimal,
    pub material_owner_id: Uuid,
    pub school_name: String,
    pub school_email: Option<String>,
}

/// Result of applying a webhook charge event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The purchase left PENDING and the material followed
    Applied(PaymentStatus),
    /// The purchase had already settled; replay acknowledged without effect
    AlreadySettled,
    /// No purchase references this charge
    UnknownCharge,
}

/// A PENDING purchase eligible for reconciliation
#[derive(Debug, sqlx::FromRow)]
pub struct StalePurchase {
    pub id: Uuid,
    pub charge_id: String,
}

impl PurchaseService {
    /// Create a new PurchaseService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a purchase and reserve its material.
    ///
    /// The availability check and the reservation happen under a row lock,
    /// so concurrent attempts on the same listing serialize and the loser
    /// observes RESERVED.
    pub async fn create_purchase(
        &self,
        company_user_id: Uuid,
        input: CreatePurchaseInput,
    ) -> AppResult<CreatedPurchase> {
        Self::validate_input(&input)?;

        let mut tx = self.db.begin().await?;

        // Lock the material row for the duration of the transaction
        let material = sqlx::query_as::<_, (Uuid, String, String, Decimal, String)>(
            r#"
            SELECT id, title, material_type, quantity_kg, status
            FROM recyclable_materials
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(input.material_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Material".to_string()))?;

        let (material_id, material_title, material_type_str, quantity_kg, status) = material;

        if status != MaterialStatus::Available.as_str() {
            return Err(AppError::MaterialUnavailable(format!(
                "Material is no longer available, current status: {}",
                status
            )));
        }

        let material_type = parse_material_type(&material_type_str)?;

        // Totals are derived server-side; client amounts are never trusted
        let total_amount = compute_total(material_type, quantity_kg);

        let folio = Self::generate_folio(&mut tx).await?;

        let row = sqlx::query_as::<_, PurchaseRow>(&format!(
            r#"
            INSERT INTO purchases
                (folio, user_id, material_id, company_name, company_rfc, company_address,
                 company_phone, transporter_name, transporter_phone, transporter_info,
                 collection_date, total_amount, payment_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {PURCHASE_COLUMNS}
            "#
        ))
        .bind(&folio)
        .bind(company_user_id)
        .bind(material_id)
        .bind(&input.company_name)
        .bind(&input.company_rfc)
        .bind(&input.company_address)
        .bind(&input.company_phone)
        .bind(&input.transporter_name)
        .bind(&input.transporter_phone)
        .bind(&input.transporter_info)
        .bind(input.collection_date)
        .bind(total_amount)
        .bind(PaymentStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE recyclable_materials SET status = $1 WHERE id = $2")
            .bind(MaterialStatus::Reserved.as_str())
            .bind(material_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Purchase {} created for material {}", folio, material_id);

        Ok(CreatedPurchase {
            purchase: row.into_purchase()?,
            material_title,
            material_type,
            quantity_kg,
        })
    }

    /// Generate a unique folio: REC-YYYY-NNNNNN with a per-year sequence
    pub async fn generate_folio(tx: &mut Transaction<'_, Postgres>) -> AppResult<String> {
        let year = Utc::now().year();

        // Serialize folio allocation; the sequence must not repeat within a year
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('purchase_folio'))")
            .execute(&mut **tx)
            .await?;

        let sequence = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) + 1 FROM purchases WHERE folio LIKE $1",
        )
        .bind(format!("REC-{}-%", year))
        .fetch_one(&mut **tx)
        .await?;

        Ok(format!("REC-{}-{:06}", year, sequence))
    }

    /// Record the gateway charge backing a purchase
    pub async fn attach_charge(&self, purchase_id: Uuid, charge_id: &str) -> AppResult<()> {
        sqlx::query("UPDATE purchases SET charge_id = $1 WHERE id = $2")
            .bind(charge_id)
            .bind(purchase_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Fail a PENDING purchase and release its material.
    /// Used when the gateway rejects the charge outright.
    pub async fn fail_purchase(&self, purchase_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let material_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE purchases
            SET payment_status = $1
            WHERE id = $2 AND payment_status = $3
            RETURNING material_id
            "#,
        )
        .bind(PaymentStatus::Failed.as_str())
        .bind(purchase_id)
        .bind(PaymentStatus::Pending.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(material_id) = material_id {
            Self::release_material(&mut tx, material_id).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Apply a gateway charge event. Idempotent: only PENDING purchases
    /// transition; replays and unknown charges report their outcome and
    /// change nothing.
    pub async fn apply_charge_event(
        &self,
        charge_id: &str,
        succeeded: bool,
    ) -> AppResult<WebhookOutcome> {
        let new_status = if succeeded {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Failed
        };

        let mut tx = self.db.begin().await?;

        let updated = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            UPDATE purchases
            SET payment_status = $1
            WHERE charge_id = $2 AND payment_status = $3
            RETURNING id, material_id
            "#,
        )
        .bind(new_status.as_str())
        .bind(charge_id)
        .bind(PaymentStatus::Pending.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((purchase_id, material_id)) = updated else {
            // Zero rows: either a replayed event or a charge we never issued
            let known = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM purchases WHERE charge_id = $1",
            )
            .bind(charge_id)
            .fetch_one(&mut *tx)
            .await?;

            return Ok(if known > 0 {
                WebhookOutcome::AlreadySettled
            } else {
                WebhookOutcome::UnknownCharge
            });
        };

        if succeeded {
            sqlx::query("UPDATE recyclable_materials SET status = $1 WHERE id = $2")
                .bind(MaterialStatus::Purchased.as_str())
                .bind(material_id)
                .execute(&mut *tx)
                .await?;
        } else {
            Self::release_material(&mut tx, material_id).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Purchase {} settled as {} via charge {}",
            purchase_id,
            new_status.as_str(),
            charge_id
        );

        Ok(WebhookOutcome::Applied(new_status))
    }

    /// PENDING purchases older than the cutoff that have a charge to query
    pub async fn list_stale_pending(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<StalePurchase>> {
        let stale = sqlx::query_as::<_, StalePurchase>(
            r#"
            SELECT id, charge_id
            FROM purchases
            WHERE payment_status = $1 AND charge_id IS NOT NULL AND created_at < $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(PaymentStatus::Pending.as_str())
        .bind(cutoff)
        .fetch_all(&self.db)
        .await?;

        Ok(stale)
    }

    /// A company's purchases, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<PurchaseListItem>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            purchase: PurchaseRow,
            material_title: String,
            material_type: String,
            quantity_kg: Decimal,
            school_name: String,
        }

        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT p.id, p.folio, p.user_id, p.material_id, p.company_name, p.company_rfc,
                   p.company_address, p.company_phone, p.transporter_name, p.transporter_phone,
                   p.transporter_info, p.collection_date, p.total_amount, p.payment_status,
                   p.charge_id, p.created_at, p.updated_at,
                   m.title AS material_title, m.material_type, m.quantity_kg,
                   u.name AS school_name
            FROM purchases p
            JOIN recyclable_materials m ON m.id = p.material_id
            JOIN users u ON u.id = m.user_id
            WHERE p.user_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(PurchaseListItem {
                    purchase: r.purchase.into_purchase()?,
                    material_title: r.material_title,
                    material_type: r.material_type,
                    quantity_kg: r.quantity_kg,
                    school_name: r.school_name,
                })
            })
            .collect()
    }

    /// Full purchase detail with seller context
    pub async fn get_purchase(&self, purchase_id: Uuid) -> AppResult<PurchaseDetail> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            purchase: PurchaseRow,
            material_title: String,
            material_type: String,
            quantity_kg: Decimal,
            material_owner_id: Uuid,
            school_name: String,
            school_email: Option<String>,
        }

        let row = sqlx::query_as::<_, Row>(
            r#"
            SELECT p.id, p.folio, p.user_id, p.material_id, p.company_name, p.company_rfc,
                   p.company_address, p.company_phone, p.transporter_name, p.transporter_phone,
                   p.transporter_info, p.collection_date, p.total_amount, p.payment_status,
                   p.charge_id, p.created_at, p.updated_at,
                   m.title AS material_title, m.material_type, m.quantity_kg,
                   m.user_id AS material_owner_id,
                   u.name AS school_name, pr.email AS school_email
            FROM purchases p
            JOIN recyclable_materials m ON m.id = p.material_id
            JOIN users u ON u.id = m.user_id
            LEFT JOIN profiles pr ON pr.user_id = u.id
            WHERE p.id = $1
            "#,
        )
        .bind(purchase_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase".to_string()))?;

        Ok(PurchaseDetail {
            purchase: row.purchase.into_purchase()?,
            material_title: row.material_title,
            material_type: row.material_type,
            quantity_kg: row.quantity_kg,
            material_owner_id: row.material_owner_id,
            school_name: row.school_name,
            school_email: row.school_email,
        })
    }

    /// Plain-text receipt for a settled purchase
    pub async fn receipt(&self, purchase_id: Uuid) -> AppResult<(String, String)> {
        let detail = self.get_purchase(purchase_id).await?;

        if detail.purchase.payment_status != PaymentStatus::Completed {
            return Err(AppError::ValidationError(
                "Payment has not been completed".to_string(),
            ));
        }

        let material_type = parse_material_type(&detail.material_type)?;
        let body = render_receipt(&detail, material_type);
        Ok((detail.purchase.folio.clone(), body))
    }

    /// Move a reserved material back to the shelf
    async fn release_material(
        tx: &mut Transaction<'_, Postgres>,
        material_id: Uuid,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE recyclable_materials SET status = $1 WHERE id = $2 AND status = $3",
        )
        .bind(MaterialStatus::Available.as_str())
        .bind(material_id)
        .bind(MaterialStatus::Reserved.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    fn validate_input(input: &CreatePurchaseInput) -> AppResult<()> {
        let required: [(&str, &str, &str); 4] = [
            ("company_name", &input.company_name, "El nombre de la empresa es requerido"),
            ("company_address", &input.company_address, "La dirección de la empresa es requerida"),
            ("transporter_name", &input.transporter_name, "El nombre del transportista es requerido"),
            ("transporter_info", &input.transporter_info, "La información del transportista es requerida"),
        ];
        for (field, value, message_es) in required {
            if value.trim().is_empty() {
                return Err(AppError::Validation {
                    field: field.to_string(),
                    message: format!("{} is required", field),
                    message_es: message_es.to_string(),
                });
            }
        }

        if let Err(msg) = validate_rfc(&input.company_rfc) {
            return Err(AppError::Validation {
                field: "company_rfc".to_string(),
                message: msg.to_string(),
                message_es: "El RFC debe tener al menos 12 caracteres".to_string(),
            });
        }
        if let Err(msg) = validate_mexican_phone(&input.company_phone) {
            return Err(AppError::Validation {
                field: "company_phone".to_string(),
                message: msg.to_string(),
                message_es: "El teléfono debe tener al menos 10 dígitos".to_string(),
            });
        }
        if let Err(msg) = validate_mexican_phone(&input.transporter_phone) {
            return Err(AppError::Validation {
                field: "transporter_phone".to_string(),
                message: msg.to_string(),
                message_es: "El teléfono del transportista debe tener al menos 10 dígitos"
                    .to_string(),
            });
        }
        if input.customer_name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "customer_name".to_string(),
                message: "Customer name is required".to_string(),
                message_es: "El nombre del cliente es requerido".to_string(),
            });
        }
        if let Err(msg) = validate_email(&input.customer_email) {
            return Err(AppError::Validation {
                field: "customer_email".to_string(),
                message: msg.to_string(),
                message_es: "Email inválido".to_string(),
            });
        }
        Ok(())
    }
}

/// Total owed for a listing: quantity times the fixed per-kg price
pub fn compute_total(material_type: MaterialType, quantity_kg: Decimal) -> Decimal {
    quantity_kg * material_type.unit_price_mxn()
}

/// Check a folio against the REC-YYYY-NNNNNN format
pub fn is_valid_folio(folio: &str) -> bool {
    let parts: Vec<&str> = folio.split('-').collect();
    if parts.len() != 3 {
        return false;
    }
    parts[0] == "REC"
        && parts[1].len() == 4
        && parts[1].chars().all(|c| c.is_ascii_digit())
        && parts[2].len() == 6
        && parts[2].chars().all(|c| c.is_ascii_digit())
}

/// Parse a stored payment status, surfacing corruption as an internal error
pub fn parse_payment_status(s: &str) -> AppResult<PaymentStatus> {
    PaymentStatus::from_str(s)
        .ok_or_else(|| AppError::Internal(format!("Unknown payment status in database: {}", s)))
}

fn render_receipt(detail: &PurchaseDetail, material_type: MaterialType) -> String {
    let p = &detail.purchase;
    format!(
        "COMPROBANTE DE COMPRA - MERCADO DE MATERIALES RECICLABLES\n\
         \n\
         Folio: {folio}\n\
         Fecha: {created}\n\
         \n\
         DATOS DE LA EMPRESA:\n\
         Nombre: {company_name}\n\
         RFC: {company_rfc}\n\
         Dirección: {company_address}\n\
         Teléfono: {company_phone}\n\
         \n\
         DATOS DEL TRANSPORTISTA:\n\
         Nombre: {transporter_name}\n\
         Teléfono: {transporter_phone}\n\
         Información: {transporter_info}\n\
         \n\
         DATOS DEL MATERIAL:\n\
         Título: {material_title}\n\
         Tipo: {material_label}\n\
         Cantidad: {quantity} kg\n\
         Escuela: {school_name}\n\
         Correo de la escuela: {school_email}\n\
         \n\
         FECHA DE RECOLECCIÓN:\n\
         {collection}\n\
         \n\
         TOTAL PAGADO: ${total} MXN\n",
        folio = p.folio,
        created = p.created_at.format("%d/%m/%Y"),
        company_name = p.company_name,
        company_rfc = p.company_rfc,
        company_address = p.company_address,
        company_phone = p.company_phone,
        transporter_name = p.transporter_name,
        transporter_phone = p.transporter_phone,
        transporter_info = p.transporter_info,
        material_title = detail.material_title,
        material_label = material_type.label_es(),
        quantity = detail.quantity_kg,
        school_name = detail.school_name,
        school_email = detail.school_email.as_deref().unwrap_or("-"),
        collection = p.collection_date.format("%d/%m/%Y"),
        total = p.total_amount,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_total_per_type() {
        let qty = Decimal::from(100);
        assert_eq!(compute_total(MaterialType::Plastico, qty), Decimal::from(200));
        assert_eq!(compute_total(MaterialType::Papel, qty), Decimal::from(150));
        assert_eq!(compute_total(MaterialType::MetalCobre, qty), Decimal::from(1000));
    }

    #[test]
    fn test_valid_folios() {
        assert!(is_valid_folio("REC-2026-000001"));
        assert!(is_valid_folio("REC-2026-123456"));
    }

    #[test]
    fn test_invalid_folios() {
        assert!(!is_valid_folio("REC-26-000001")); // short year
        assert!(!is_valid_folio("FOL-2026-000001")); // wrong prefix
        assert!(!is_valid_folio("REC-2026-1")); // short sequence
        assert!(!is_valid_folio("REC-2026-00000A")); // non-digit
        assert!(!is_valid_folio("REC2026000001")); // no separators
    }
}
