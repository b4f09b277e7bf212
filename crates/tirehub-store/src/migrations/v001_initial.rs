//! v001 -- Initial schema creation.
//!
//! Creates the catalog (`users`, `brands`, `products`), stock (`inventory`),
//! sales (`orders`, `order_items`) and content (`promotions`, `faqs`) tables.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    email      TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name  TEXT,
    role       TEXT NOT NULL DEFAULT 'CUSTOMER',
    created_at TEXT NOT NULL                -- RFC-3339, millisecond precision, UTC
);

-- ----------------------------------------------------------------
-- Brands
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS brands (
    id         TEXT PRIMARY KEY NOT NULL,
    name       TEXT NOT NULL,
    logo_url   TEXT,
    created_at TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Products (tires and mags)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS products (
    id         TEXT PRIMARY KEY NOT NULL,
    brand_id   TEXT NOT NULL,               -- FK -> brands(id)
    name       TEXT NOT NULL,
    kind       TEXT NOT NULL,               -- TIRE | MAG
    size       TEXT,                        -- e.g. 205/55R16
    price      REAL NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (brand_id) REFERENCES brands(id)
);

CREATE INDEX IF NOT EXISTS idx_products_brand_id ON products(brand_id);

-- ----------------------------------------------------------------
-- Inventory
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS inventory (
    id         TEXT PRIMARY KEY NOT NULL,
    product_id TEXT NOT NULL,               -- FK -> products(id)
    quantity   INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
    min_stock  INTEGER NOT NULL DEFAULT 0 CHECK (min_stock >= 0),
    max_stock  INTEGER,
    sku        TEXT,
    status     TEXT NOT NULL DEFAULT 'OUT_OF_STOCK',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (product_id) REFERENCES products(id)
);

CREATE INDEX IF NOT EXISTS idx_inventory_product_id ON inventory(product_id);

-- ----------------------------------------------------------------
-- Orders
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS orders (
    id                TEXT PRIMARY KEY NOT NULL,
    user_id           TEXT NOT NULL,        -- FK -> users(id)
    total_amount      REAL NOT NULL,
    discounted_amount REAL NOT NULL,
    status            TEXT NOT NULL DEFAULT 'PENDING',
    processing_at     TEXT,
    shipped_at        TEXT,
    completed_at      TEXT,
    cancelled_at      TEXT,
    is_archived       INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    archived_at       TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_orders_archival ON orders(is_archived, created_at);

-- ----------------------------------------------------------------
-- Order items
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS order_items (
    id         TEXT PRIMARY KEY NOT NULL,
    order_id   TEXT NOT NULL,               -- FK -> orders(id)
    product_id TEXT NOT NULL,               -- FK -> products(id)
    quantity   INTEGER NOT NULL,
    price      REAL NOT NULL,

    FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE,
    FOREIGN KEY (product_id) REFERENCES products(id)
);

CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items(order_id);

-- ----------------------------------------------------------------
-- Promotions
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS promotions (
    id               TEXT PRIMARY KEY NOT NULL,
    title            TEXT NOT NULL,
    description      TEXT,
    discount_percent REAL NOT NULL,
    starts_at        TEXT NOT NULL,
    ends_at          TEXT NOT NULL,
    is_active        INTEGER NOT NULL DEFAULT 1,
    created_at       TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- FAQs
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS faqs (
    id         TEXT PRIMARY KEY NOT NULL,
    question   TEXT NOT NULL,
    answer     TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
