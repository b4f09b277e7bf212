//! CRUD operations for [`Brand`] and [`Product`] records.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::convert::{ts_from_db, ts_to_db, uuid_from_db};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Brand, Product};
use crate::table::Table;

impl Database {
    // ------------------------------------------------------------------
    // Brands
    // ------------------------------------------------------------------

    pub fn create_brand(&self, brand: &Brand) -> Result<()> {
        Brand::insert(self.conn(), brand)
    }

    pub fn get_brand(&self, id: Uuid) -> Result<Brand> {
        self.conn()
            .query_row(
                "SELECT id, name, logo_url, created_at FROM brands WHERE id = ?1",
                params![id.to_string()],
                row_to_brand,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    pub fn list_brands(&self) -> Result<Vec<Brand>> {
        Brand::select_all(self.conn())
    }

    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    pub fn create_product(&self, product: &Product) -> Result<()> {
        Product::insert(self.conn(), product)
    }

    pub fn get_product(&self, id: Uuid) -> Result<Product> {
        self.conn()
            .query_row(
                "SELECT id, brand_id, name, kind, size, price, created_at, updated_at
                 FROM products WHERE id = ?1",
                params![id.to_string()],
                row_to_product,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    pub fn list_products(&self) -> Result<Vec<Product>> {
        Product::select_all(self.conn())
    }
}

impl Table for Brand {
    const NAME: &'static str = "brands";

    fn id(&self) -> Uuid {
        self.id
    }

    fn select_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, logo_url, created_at FROM brands ORDER BY name ASC, id ASC",
        )?;
        let rows = stmt.query_map([], row_to_brand)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    fn insert(conn: &Connection, brand: &Self) -> Result<()> {
        conn.execute(
            "INSERT INTO brands (id, name, logo_url, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                brand.id.to_string(),
                brand.name,
                brand.logo_url,
                ts_to_db(&brand.created_at),
            ],
        )?;
        Ok(())
    }

    fn upsert(conn: &Connection, brand: &Self) -> Result<()> {
        conn.execute(
            "INSERT INTO brands (id, name, logo_url, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                logo_url = excluded.logo_url,
                created_at = excluded.created_at",
            params![
                brand.id.to_string(),
                brand.name,
                brand.logo_url,
                ts_to_db(&brand.created_at),
            ],
        )?;
        Ok(())
    }
}

impl Table for Product {
    const NAME: &'static str = "products";

    fn id(&self) -> Uuid {
        self.id
    }

    fn select_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, brand_id, name, kind, size, price, created_at, updated_at
             FROM products
             ORDER BY name ASC, id ASC",
        )?;
        let rows = stmt.query_map([], row_to_product)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    fn insert(conn: &Connection, product: &Self) -> Result<()> {
        conn.execute(
            "INSERT INTO products (id, brand_id, name, kind, size, price, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                product.id.to_string(),
                product.brand_id.to_string(),
                product.name,
                product.kind,
                product.size,
                product.price,
                ts_to_db(&product.created_at),
                ts_to_db(&product.updated_at),
            ],
        )?;
        Ok(())
    }

    fn upsert(conn: &Connection, product: &Self) -> Result<()> {
        conn.execute(
            "INSERT INTO products (id, brand_id, name, kind, size, price, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                brand_id = excluded.brand_id,
                name = excluded.name,
                kind = excluded.kind,
                size = excluded.size,
                price = excluded.price,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
            params![
                product.id.to_string(),
                product.brand_id.to_string(),
                product.name,
                product.kind,
                product.size,
                product.price,
                ts_to_db(&product.created_at),
                ts_to_db(&product.updated_at),
            ],
        )?;
        Ok(())
    }

    fn check(&self) -> std::result::Result<(), String> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(format!("price must be a non-negative number, got {}", self.price));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_brand(row: &rusqlite::Row<'_>) -> rusqlite::Result<Brand> {
    let id_str: String = row.get(0)?;
    let created_str: String = row.get(3)?;

    Ok(Brand {
        id: uuid_from_db(0, &id_str)?,
        name: row.get(1)?,
        logo_url: row.get(2)?,
        created_at: ts_from_db(3, &created_str)?,
    })
}

fn row_to_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    let id_str: String = row.get(0)?;
    let brand_id_str: String = row.get(1)?;
    let created_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;

    Ok(Product {
        id: uuid_from_db(0, &id_str)?,
        brand_id: uuid_from_db(1, &brand_id_str)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        size: row.get(4)?,
        price: row.get(5)?,
        created_at: ts_from_db(6, &created_str)?,
        updated_at: ts_from_db(7, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn brands_list_by_name() {
        let (db, _dir) = fixtures::test_db();
        db.create_brand(&fixtures::brand("Yokohama")).unwrap();
        db.create_brand(&fixtures::brand("Bridgestone")).unwrap();

        let names: Vec<_> = db.list_brands().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["Bridgestone", "Yokohama"]);
    }

    #[test]
    fn product_requires_existing_brand() {
        let (db, _dir) = fixtures::test_db();
        let orphan = fixtures::product(Uuid::new_v4(), "Ghost");
        assert!(db.create_product(&orphan).is_err());
    }

    #[test]
    fn product_round_trip() {
        let (db, _dir) = fixtures::test_db();
        let brand = fixtures::brand("Michelin");
        db.create_brand(&brand).unwrap();
        let product = fixtures::product(brand.id, "Primacy 4");
        db.create_product(&product).unwrap();

        assert_eq!(db.get_product(product.id).unwrap(), product);
        assert_eq!(db.get_brand(brand.id).unwrap(), brand);
    }

    #[test]
    fn negative_price_fails_check() {
        let mut product = fixtures::product(Uuid::new_v4(), "Cheap");
        product.price = -1.0;
        assert!(product.check().is_err());
    }
}
