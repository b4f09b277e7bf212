//! CRUD operations for [`Order`] and [`OrderItem`] records.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::convert::{opt_ts_from_db, opt_ts_to_db, ts_from_db, ts_to_db, uuid_from_db};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Order, OrderItem, OrderStatus};
use crate::table::Table;

pub(crate) const ORDER_COLUMNS: &str = "id, user_id, total_amount, discounted_amount, status, \
     processing_at, shipped_at, completed_at, cancelled_at, is_archived, archived_at, \
     created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    pub fn create_order(&self, order: &Order) -> Result<()> {
        Order::insert(self.conn(), order)
    }

    pub fn get_order(&self, id: Uuid) -> Result<Order> {
        self.conn()
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
                params![id.to_string()],
                row_to_order,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    pub fn list_orders(&self) -> Result<Vec<Order>> {
        Order::select_all(self.conn())
    }

    /// Move an order along its timeline, stamping the timestamp that belongs
    /// to the new stage.  Returns `true` if the order exists.
    pub fn set_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let stamp_column = match status {
            OrderStatus::Pending => None,
            OrderStatus::Processing => Some("processing_at"),
            OrderStatus::Shipped => Some("shipped_at"),
            OrderStatus::Completed => Some("completed_at"),
            OrderStatus::Cancelled => Some("cancelled_at"),
        };

        let ts = ts_to_db(&at);
        let affected = match stamp_column {
            Some(column) => self.conn().execute(
                &format!("UPDATE orders SET status = ?1, {column} = ?2, updated_at = ?2 WHERE id = ?3"),
                params![status, ts, id.to_string()],
            )?,
            None => self.conn().execute(
                "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status, ts, id.to_string()],
            )?,
        };
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Order items
    // ------------------------------------------------------------------

    pub fn add_order_item(&self, item: &OrderItem) -> Result<()> {
        OrderItem::insert(self.conn(), item)
    }

    pub fn list_order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, order_id, product_id, quantity, price
             FROM order_items
             WHERE order_id = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![order_id.to_string()], row_to_order_item)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

impl Table for Order {
    const NAME: &'static str = "orders";

    fn id(&self) -> Uuid {
        self.id
    }

    fn select_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], row_to_order)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    fn insert(conn: &Connection, order: &Self) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO orders ({ORDER_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            rusqlite::params_from_iter(order_params(order)),
        )?;
        Ok(())
    }

    fn upsert(conn: &Connection, order: &Self) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO orders ({ORDER_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    user_id = excluded.user_id,
                    total_amount = excluded.total_amount,
                    discounted_amount = excluded.discounted_amount,
                    status = excluded.status,
                    processing_at = excluded.processing_at,
                    shipped_at = excluded.shipped_at,
                    completed_at = excluded.completed_at,
                    cancelled_at = excluded.cancelled_at,
                    is_archived = excluded.is_archived,
                    archived_at = excluded.archived_at,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at"
            ),
            rusqlite::params_from_iter(order_params(order)),
        )?;
        Ok(())
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.is_archived != self.archived_at.is_some() {
            return Err("isArchived and archivedAt must be set together".into());
        }
        Ok(())
    }
}

impl Table for OrderItem {
    const NAME: &'static str = "orderItems";

    fn id(&self) -> Uuid {
        self.id
    }

    fn select_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, order_id, product_id, quantity, price
             FROM order_items
             ORDER BY order_id ASC, id ASC",
        )?;
        let rows = stmt.query_map([], row_to_order_item)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    fn insert(conn: &Connection, item: &Self) -> Result<()> {
        conn.execute(
            "INSERT INTO order_items (id, order_id, product_id, quantity, price)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                item.id.to_string(),
                item.order_id.to_string(),
                item.product_id.to_string(),
                item.quantity,
                item.price,
            ],
        )?;
        Ok(())
    }

    fn upsert(conn: &Connection, item: &Self) -> Result<()> {
        conn.execute(
            "INSERT INTO order_items (id, order_id, product_id, quantity, price)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                order_id = excluded.order_id,
                product_id = excluded.product_id,
                quantity = excluded.quantity,
                price = excluded.price",
            params![
                item.id.to_string(),
                item.order_id.to_string(),
                item.product_id.to_string(),
                item.quantity,
                item.price,
            ],
        )?;
        Ok(())
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.quantity <= 0 {
            return Err(format!("quantity must be > 0, got {}", self.quantity));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn order_params(order: &Order) -> Vec<Box<dyn rusqlite::ToSql>> {
    vec![
        Box::new(order.id.to_string()),
        Box::new(order.user_id.to_string()),
        Box::new(order.total_amount),
        Box::new(order.discounted_amount),
        Box::new(order.status),
        Box::new(opt_ts_to_db(&order.processing_at)),
        Box::new(opt_ts_to_db(&order.shipped_at)),
        Box::new(opt_ts_to_db(&order.completed_at)),
        Box::new(opt_ts_to_db(&order.cancelled_at)),
        Box::new(order.is_archived),
        Box::new(opt_ts_to_db(&order.archived_at)),
        Box::new(ts_to_db(&order.created_at)),
        Box::new(ts_to_db(&order.updated_at)),
    ]
}

/// Map the [`ORDER_COLUMNS`] projection, starting at column `base`.
pub(crate) fn order_from_row(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Order> {
    let id_str: String = row.get(base)?;
    let user_id_str: String = row.get(base + 1)?;
    let created_str: String = row.get(base + 11)?;
    let updated_str: String = row.get(base + 12)?;

    Ok(Order {
        id: uuid_from_db(base, &id_str)?,
        user_id: uuid_from_db(base + 1, &user_id_str)?,
        total_amount: row.get(base + 2)?,
        discounted_amount: row.get(base + 3)?,
        status: row.get(base + 4)?,
        processing_at: opt_ts_from_db(base + 5, row.get(base + 5)?)?,
        shipped_at: opt_ts_from_db(base + 6, row.get(base + 6)?)?,
        completed_at: opt_ts_from_db(base + 7, row.get(base + 7)?)?,
        cancelled_at: opt_ts_from_db(base + 8, row.get(base + 8)?)?,
        is_archived: row.get(base + 9)?,
        archived_at: opt_ts_from_db(base + 10, row.get(base + 10)?)?,
        created_at: ts_from_db(base + 11, &created_str)?,
        updated_at: ts_from_db(base + 12, &updated_str)?,
    })
}

fn row_to_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    order_from_row(row, 0)
}

fn row_to_order_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderItem> {
    let id_str: String = row.get(0)?;
    let order_id_str: String = row.get(1)?;
    let product_id_str: String = row.get(2)?;

    Ok(OrderItem {
        id: uuid_from_db(0, &id_str)?,
        order_id: uuid_from_db(1, &order_id_str)?,
        product_id: uuid_from_db(2, &product_id_str)?,
        quantity: row.get(3)?,
        price: row.get(4)?,
    })
}
