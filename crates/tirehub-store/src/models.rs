//! Domain model structs persisted in the back-office SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` with camelCase field
//! names; the same shape is used for backup files and admin API responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stock::StockStatus;

/// Declares a fieldless enum stored as a fixed TEXT value.
///
/// Generates `as_str`, `FromStr`, `Display` and the rusqlite `ToSql` /
/// `FromSql` conversions so rows can bind and read the enum directly.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        concat!("unknown ", stringify!($name), " value: {}"),
                        other
                    )),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse()
                    .map_err(|e: String| rusqlite::types::FromSqlError::Other(e.into()))
            }
        }
    };
}

pub(crate) use text_enum;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

text_enum! {
    /// Access level of a storefront account.
    pub enum UserRole {
        Customer => "CUSTOMER",
        Staff => "STAFF",
        Admin => "ADMIN",
    }
}

/// A storefront account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A tire or mag manufacturer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

text_enum! {
    pub enum ProductKind {
        Tire => "TIRE",
        Mag => "MAG",
    }
}

/// A sellable catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub name: String,
    pub kind: ProductKind,
    /// Tire size designation such as `205/55R16`; `None` for mags sold by fitment.
    pub size: Option<String>,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Stock held for a single product.
///
/// `status` is derived from `quantity` and `min_stock` by the inventory
/// sweep and may lag behind quantity edits until the next sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub min_stock: i64,
    pub max_stock: Option<i64>,
    pub sku: Option<String>,
    pub status: StockStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

text_enum! {
    pub enum OrderStatus {
        Pending => "PENDING",
        Processing => "PROCESSING",
        Shipped => "SHIPPED",
        Completed => "COMPLETED",
        Cancelled => "CANCELLED",
    }
}

/// A checkout.  Once archived, its items only exist in the archive file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: f64,
    pub discounted_amount: f64,
    pub status: OrderStatus,
    pub processing_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an [`Order`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub price: f64,
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub discount_percent: f64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Faq {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

text_enum! {
    pub enum BackupAction {
        Backup => "backup",
        Restore => "restore",
    }
}

text_enum! {
    /// Outcome recorded on audit rows.
    pub enum AuditStatus {
        Success => "success",
        Failed => "failed",
    }
}

/// One row per backup or restore attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupHistory {
    pub id: Uuid,
    pub action: BackupAction,
    pub filename: String,
    pub status: AuditStatus,
    pub created_at: DateTime<Utc>,
}

/// Free-form administrative event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SystemLog {
    pub id: Uuid,
    pub action: String,
    pub details: String,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// One row per archival run that found eligible orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveHistory {
    pub id: Uuid,
    pub filename: Option<String>,
    pub order_count: i64,
    pub status: AuditStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
