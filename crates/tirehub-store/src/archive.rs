//! Order archival: eligibility query, snapshot shape and the commit step.
//!
//! Orders older than [`ORDER_RETENTION_DAYS`] are copied into an immutable
//! JSON snapshot outside the database.  Once the snapshot is safely on disk
//! [`Database::commit_archival`] flags the orders as archived and removes
//! their items in a single transaction.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::convert::{ts_to_db, uuid_from_db};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Order, OrderItem};
use crate::orders::{order_from_row, ORDER_COLUMNS};

/// Age after which an active order becomes eligible for archival.
pub const ORDER_RETENTION_DAYS: i64 = 30;

/// Upper bound on ids bound into a single `IN (...)` list.
const ID_CHUNK: usize = 500;

/// Orders created strictly before this instant are eligible.
pub fn retention_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(ORDER_RETENTION_DAYS)
}

// ---------------------------------------------------------------------------
// Snapshot shape
// ---------------------------------------------------------------------------

/// Contents of one `orders_archive_*.json` file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSnapshot {
    pub archived_at: DateTime<Utc>,
    pub count: usize,
    pub orders: Vec<ArchivedOrder>,
}

impl ArchiveSnapshot {
    pub fn new(archived_at: DateTime<Utc>, orders: Vec<ArchivedOrder>) -> Self {
        Self {
            archived_at,
            count: orders.len(),
            orders,
        }
    }

    pub fn order_ids(&self) -> Vec<Uuid> {
        self.orders.iter().map(|o| o.order.id).collect()
    }
}

/// An order as it looked when it was archived, with its items and buyer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchivedOrder {
    #[serde(flatten)]
    pub order: Order,
    /// `None` if the account no longer exists.
    pub user: Option<UserSummary>,
    #[serde(rename = "orderItem")]
    pub order_item: Vec<ArchivedOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchivedOrderItem {
    #[serde(flatten)]
    pub item: OrderItem,
    pub product: Option<ProductSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub brand: Option<BrandSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrandSummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
}

/// What [`Database::commit_archival`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveCommit {
    pub orders_archived: usize,
    pub items_deleted: usize,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl Database {
    /// Active orders created strictly before `cutoff`, oldest first, with
    /// their items (joined to product and brand) and a projection of the
    /// buyer.
    pub fn find_archivable_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<ArchivedOrder>> {
        let order_columns = ORDER_COLUMNS
            .split(',')
            .map(|c| format!("o.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {order_columns}, u.id, u.email, u.first_name, u.last_name
             FROM orders o
             LEFT JOIN users u ON u.id = o.user_id
             WHERE o.is_archived = 0 AND o.created_at < ?1
             ORDER BY o.created_at ASC, o.id ASC"
        ))?;

        let rows = stmt.query_map(params![ts_to_db(&cutoff)], |row| {
            let order = order_from_row(row, 0)?;
            let user_id: Option<String> = row.get(13)?;
            let user = match user_id {
                Some(id) => Some(UserSummary {
                    id: uuid_from_db(13, &id)?,
                    email: row.get(14)?,
                    first_name: row.get(15)?,
                    last_name: row.get(16)?,
                }),
                None => None,
            };
            Ok((order, user))
        })?;

        let mut orders = Vec::new();
        for row in rows {
            let (order, user) = row?;
            let order_item = self.archived_items_for(order.id)?;
            orders.push(ArchivedOrder {
                order,
                user,
                order_item,
            });
        }
        Ok(orders)
    }

    fn archived_items_for(&self, order_id: Uuid) -> Result<Vec<ArchivedOrderItem>> {
        let mut stmt = self.conn().prepare(
            "SELECT i.id, i.order_id, i.product_id, i.quantity, i.price,
                    p.id, p.name, b.id, b.name
             FROM order_items i
             LEFT JOIN products p ON p.id = i.product_id
             LEFT JOIN brands b ON b.id = p.brand_id
             WHERE i.order_id = ?1
             ORDER BY i.id ASC",
        )?;

        let rows = stmt.query_map(params![order_id.to_string()], |row| {
            let id_str: String = row.get(0)?;
            let order_id_str: String = row.get(1)?;
            let product_id_str: String = row.get(2)?;
            let item = OrderItem {
                id: uuid_from_db(0, &id_str)?,
                order_id: uuid_from_db(1, &order_id_str)?,
                product_id: uuid_from_db(2, &product_id_str)?,
                quantity: row.get(3)?,
                price: row.get(4)?,
            };

            let brand = match row.get::<_, Option<String>>(7)? {
                Some(id) => Some(BrandSummary {
                    id: uuid_from_db(7, &id)?,
                    name: row.get(8)?,
                }),
                None => None,
            };
            let product = match row.get::<_, Option<String>>(5)? {
                Some(id) => Some(ProductSummary {
                    id: uuid_from_db(5, &id)?,
                    name: row.get(6)?,
                    brand,
                }),
                None => None,
            };

            Ok(ArchivedOrderItem { item, product })
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Flag `order_ids` as archived and delete their items, atomically.
    ///
    /// Only orders still active are flipped.  If any of them was archived in
    /// the meantime the whole transaction is rolled back and
    /// [`StoreError::Conflict`] is returned, so a snapshot never covers
    /// orders another run already archived.
    pub fn commit_archival(
        &mut self,
        order_ids: &[Uuid],
        archived_at: DateTime<Utc>,
    ) -> Result<ArchiveCommit> {
        if order_ids.is_empty() {
            return Ok(ArchiveCommit::default());
        }

        let ts = ts_to_db(&archived_at);
        let tx = self.conn_mut().transaction()?;
        let mut commit = ArchiveCommit::default();

        for chunk in order_ids.chunks(ID_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let ids = chunk.iter().map(|id| id.to_string());

            let mut values: Vec<String> = vec![ts.clone(), ts.clone()];
            values.extend(ids.clone());
            commit.orders_archived += tx.execute(
                &format!(
                    "UPDATE orders SET is_archived = 1, archived_at = ?, updated_at = ?
                     WHERE is_archived = 0 AND id IN ({placeholders})"
                ),
                rusqlite::params_from_iter(values),
            )?;

            commit.items_deleted += tx.execute(
                &format!("DELETE FROM order_items WHERE order_id IN ({placeholders})"),
                rusqlite::params_from_iter(ids),
            )?;
        }

        if commit.orders_archived != order_ids.len() {
            // Dropping `tx` rolls back.
            return Err(StoreError::Conflict(format!(
                "expected to archive {} orders but {} were still active",
                order_ids.len(),
                commit.orders_archived
            )));
        }

        tx.commit()?;

        tracing::debug!(
            orders = commit.orders_archived,
            items = commit.items_deleted,
            "archival committed"
        );
        Ok(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn cutoff_boundary_is_strict() {
        let (db, _dir) = fixtures::test_db();
        let now = fixtures::now();
        let cutoff = retention_cutoff(now);

        let older = fixtures::seed_order(
            &db,
            now,
            Duration::days(ORDER_RETENTION_DAYS) + Duration::milliseconds(1),
        );
        let _at_cutoff = fixtures::seed_order(&db, now, Duration::days(ORDER_RETENTION_DAYS));
        let _newer = fixtures::seed_order(&db, now, Duration::days(29));

        let eligible = db.find_archivable_orders(cutoff).unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].order.id, older.order.id);
    }

    #[test]
    fn eligible_orders_carry_items_products_and_user() {
        let (db, _dir) = fixtures::test_db();
        let now = fixtures::now();
        let seeded = fixtures::seed_order(&db, now, Duration::days(31));

        let eligible = db.find_archivable_orders(retention_cutoff(now)).unwrap();
        let archived = &eligible[0];

        let user = archived.user.as_ref().unwrap();
        assert_eq!(user.email, seeded.user.email);
        assert_eq!(archived.order_item.len(), 1);

        let product = archived.order_item[0].product.as_ref().unwrap();
        assert_eq!(product.name, "Pilot Sport 4");
        assert_eq!(product.brand.as_ref().unwrap().name, "Michelin");
    }

    #[test]
    fn commit_flags_orders_and_deletes_items() {
        let (mut db, _dir) = fixtures::test_db();
        let now = fixtures::now();
        let seeded = fixtures::seed_order(&db, now, Duration::days(40));

        let commit = db.commit_archival(&[seeded.order.id], now).unwrap();
        assert_eq!(
            commit,
            ArchiveCommit {
                orders_archived: 1,
                items_deleted: 1
            }
        );

        let order = db.get_order(seeded.order.id).unwrap();
        assert!(order.is_archived);
        assert_eq!(order.archived_at, Some(now));
        assert!(db.list_order_items(seeded.order.id).unwrap().is_empty());
        assert!(db
            .find_archivable_orders(retention_cutoff(now))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn commit_rolls_back_when_an_order_was_already_archived() {
        let (mut db, _dir) = fixtures::test_db();
        let now = fixtures::now();
        let first = fixtures::seed_order(&db, now, Duration::days(40));
        let second = fixtures::seed_order(&db, now, Duration::days(41));

        db.commit_archival(&[first.order.id], now).unwrap();

        let err = db
            .commit_archival(&[first.order.id, second.order.id], now)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert!(!db.get_order(second.order.id).unwrap().is_archived);
        assert_eq!(db.list_order_items(second.order.id).unwrap().len(), 1);
    }

    #[test]
    fn snapshot_json_shape() {
        let (db, _dir) = fixtures::test_db();
        let now = fixtures::now();
        fixtures::seed_order(&db, now, Duration::days(31));

        let snapshot = ArchiveSnapshot::new(now, db.find_archivable_orders(retention_cutoff(now)).unwrap());
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["count"], 1);
        assert!(json["archivedAt"].is_string());
        let order = &json["orders"][0];
        assert!(order["createdAt"].is_string());
        assert_eq!(order["isArchived"], false);
        assert!(order["user"]["firstName"].is_string());
        assert_eq!(order["orderItem"][0]["product"]["brand"]["name"], "Michelin");

        let parsed: ArchiveSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
