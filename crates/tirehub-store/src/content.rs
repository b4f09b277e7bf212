//! Storefront content managed from the back office: promotions and FAQs.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::convert::{ts_from_db, ts_to_db, uuid_from_db};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Faq, Promotion};
use crate::table::Table;

impl Database {
    pub fn create_promotion(&self, promotion: &Promotion) -> Result<()> {
        Promotion::insert(self.conn(), promotion)
    }

    pub fn list_promotions(&self) -> Result<Vec<Promotion>> {
        Promotion::select_all(self.conn())
    }

    pub fn create_faq(&self, faq: &Faq) -> Result<()> {
        Faq::insert(self.conn(), faq)
    }

    /// FAQs in display order.
    pub fn list_faqs(&self) -> Result<Vec<Faq>> {
        Faq::select_all(self.conn())
    }
}

impl Table for Promotion {
    const NAME: &'static str = "promotions";

    fn id(&self) -> Uuid {
        self.id
    }

    fn select_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, title, description, discount_percent, starts_at, ends_at, is_active, created_at
             FROM promotions
             ORDER BY starts_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let id_str: String = row.get(0)?;
            let starts_str: String = row.get(4)?;
            let ends_str: String = row.get(5)?;
            let created_str: String = row.get(7)?;

            Ok(Promotion {
                id: uuid_from_db(0, &id_str)?,
                title: row.get(1)?,
                description: row.get(2)?,
                discount_percent: row.get(3)?,
                starts_at: ts_from_db(4, &starts_str)?,
                ends_at: ts_from_db(5, &ends_str)?,
                is_active: row.get(6)?,
                created_at: ts_from_db(7, &created_str)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    fn insert(conn: &Connection, promotion: &Self) -> Result<()> {
        conn.execute(
            "INSERT INTO promotions
                (id, title, description, discount_percent, starts_at, ends_at, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                promotion.id.to_string(),
                promotion.title,
                promotion.description,
                promotion.discount_percent,
                ts_to_db(&promotion.starts_at),
                ts_to_db(&promotion.ends_at),
                promotion.is_active,
                ts_to_db(&promotion.created_at),
            ],
        )?;
        Ok(())
    }

    fn upsert(conn: &Connection, promotion: &Self) -> Result<()> {
        conn.execute(
            "INSERT INTO promotions
                (id, title, description, discount_percent, starts_at, ends_at, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                discount_percent = excluded.discount_percent,
                starts_at = excluded.starts_at,
                ends_at = excluded.ends_at,
                is_active = excluded.is_active,
                created_at = excluded.created_at",
            params![
                promotion.id.to_string(),
                promotion.title,
                promotion.description,
                promotion.discount_percent,
                ts_to_db(&promotion.starts_at),
                ts_to_db(&promotion.ends_at),
                promotion.is_active,
                ts_to_db(&promotion.created_at),
            ],
        )?;
        Ok(())
    }

    fn check(&self) -> std::result::Result<(), String> {
        if !(0.0..=100.0).contains(&self.discount_percent) {
            return Err(format!(
                "discountPercent must be within 0..=100, got {}",
                self.discount_percent
            ));
        }
        if self.ends_at < self.starts_at {
            return Err("endsAt is before startsAt".into());
        }
        Ok(())
    }
}

impl Table for Faq {
    const NAME: &'static str = "faqs";

    fn id(&self) -> Uuid {
        self.id
    }

    fn select_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, question, answer, sort_order, created_at
             FROM faqs
             ORDER BY sort_order ASC, id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let id_str: String = row.get(0)?;
            let created_str: String = row.get(4)?;

            Ok(Faq {
                id: uuid_from_db(0, &id_str)?,
                question: row.get(1)?,
                answer: row.get(2)?,
                sort_order: row.get(3)?,
                created_at: ts_from_db(4, &created_str)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    fn insert(conn: &Connection, faq: &Self) -> Result<()> {
        conn.execute(
            "INSERT INTO faqs (id, question, answer, sort_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                faq.id.to_string(),
                faq.question,
                faq.answer,
                faq.sort_order,
                ts_to_db(&faq.created_at),
            ],
        )?;
        Ok(())
    }

    fn upsert(conn: &Connection, faq: &Self) -> Result<()> {
        conn.execute(
            "INSERT INTO faqs (id, question, answer, sort_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                question = excluded.question,
                answer = excluded.answer,
                sort_order = excluded.sort_order,
                created_at = excluded.created_at",
            params![
                faq.id.to_string(),
                faq.question,
                faq.answer,
                faq.sort_order,
                ts_to_db(&faq.created_at),
            ],
        )?;
        Ok(())
    }
}
