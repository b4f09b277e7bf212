//! Builders for tests, here and in dependent crates (`test-helpers` feature).

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::convert::truncate_to_millis;
use crate::database::Database;
use crate::models::{
    Brand, Faq, InventoryRecord, Order, OrderItem, OrderStatus, Product, ProductKind, Promotion,
    User, UserRole,
};
use crate::stock::StockStatus;

/// Open a fresh database inside a temporary directory.
///
/// Keep the returned [`tempfile::TempDir`] alive for as long as the database
/// is used.
pub fn test_db() -> (Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db = Database::open_at(&dir.path().join("test.db")).expect("open test database");
    (db, dir)
}

pub fn now() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

pub fn user(email: &str) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        first_name: "Ana".to_string(),
        last_name: Some("Reyes".to_string()),
        role: UserRole::Customer,
        created_at: now(),
    }
}

pub fn brand(name: &str) -> Brand {
    Brand {
        id: Uuid::new_v4(),
        name: name.to_string(),
        logo_url: None,
        created_at: now(),
    }
}

pub fn product(brand_id: Uuid, name: &str) -> Product {
    Product {
        id: Uuid::new_v4(),
        brand_id,
        name: name.to_string(),
        kind: ProductKind::Tire,
        size: Some("205/55R16".to_string()),
        price: 4_250.0,
        created_at: now(),
        updated_at: now(),
    }
}

/// An inventory record whose stored status is deliberately `IN_STOCK` so
/// that a sweep has something to correct.
pub fn inventory(product_id: Uuid, quantity: i64, min_stock: i64) -> InventoryRecord {
    InventoryRecord {
        id: Uuid::new_v4(),
        product_id,
        quantity,
        min_stock,
        max_stock: None,
        sku: None,
        status: StockStatus::InStock,
        created_at: now(),
        updated_at: now(),
    }
}

pub fn order(user_id: Uuid, created_at: DateTime<Utc>) -> Order {
    Order {
        id: Uuid::new_v4(),
        user_id,
        total_amount: 8_500.0,
        discounted_amount: 8_000.0,
        status: OrderStatus::Completed,
        processing_at: None,
        shipped_at: None,
        completed_at: Some(created_at + Duration::days(2)),
        cancelled_at: None,
        is_archived: false,
        archived_at: None,
        created_at: truncate_to_millis(created_at),
        updated_at: truncate_to_millis(created_at),
    }
}

pub fn order_item(order_id: Uuid, product_id: Uuid, quantity: i64) -> OrderItem {
    OrderItem {
        id: Uuid::new_v4(),
        order_id,
        product_id,
        quantity,
        price: 4_250.0,
    }
}

pub fn promotion(title: &str) -> Promotion {
    Promotion {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: None,
        discount_percent: 10.0,
        starts_at: now(),
        ends_at: now() + Duration::days(14),
        is_active: true,
        created_at: now(),
    }
}

pub fn faq(question: &str, sort_order: i64) -> Faq {
    Faq {
        id: Uuid::new_v4(),
        question: question.to_string(),
        answer: "Yes.".to_string(),
        sort_order,
        created_at: now(),
    }
}

/// A user, a brand, a product and an order placed `age` ago with one item.
pub struct SeededOrder {
    pub user: User,
    pub brand: Brand,
    pub product: Product,
    pub order: Order,
    pub item: OrderItem,
}

pub fn seed_order(db: &Database, now: DateTime<Utc>, age: Duration) -> SeededOrder {
    let user = self::user(&format!("{}@example.com", Uuid::new_v4()));
    let brand = self::brand("Michelin");
    let product = self::product(brand.id, "Pilot Sport 4");
    let order = self::order(user.id, now - age);
    let item = order_item(order.id, product.id, 2);

    db.create_user(&user).expect("insert user");
    db.create_brand(&brand).expect("insert brand");
    db.create_product(&product).expect("insert product");
    db.create_order(&order).expect("insert order");
    db.add_order_item(&item).expect("insert order item");

    SeededOrder {
        user,
        brand,
        product,
        order,
        item,
    }
}
