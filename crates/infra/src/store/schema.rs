//! Postgres schema, applied idempotently at startup.

pub const CREATE_PRODUCTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id UUID PRIMARY KEY,
    sku TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    price_cents BIGINT NOT NULL CHECK (price_cents >= 0),
    deleted_at TIMESTAMPTZ NULL
)
"#;

pub const CREATE_STOCK_LOCATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stock_locations (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
)
"#;

pub const CREATE_STOCK_ITEMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stock_items (
    id UUID PRIMARY KEY,
    product_id UUID NOT NULL REFERENCES products (id),
    location_id UUID NOT NULL REFERENCES stock_locations (id),
    quantity BIGINT NOT NULL CHECK (quantity >= 0),
    version BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL,
    UNIQUE (product_id, location_id)
)
"#;

pub const CREATE_COUPONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS coupons (
    id UUID PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL CHECK (kind IN ('PERCENTAGE', 'FIXED_AMOUNT')),
    value BIGINT NOT NULL CHECK (value >= 0),
    expiry_date DATE NOT NULL,
    active BOOLEAN NOT NULL
)
"#;

pub const CREATE_ORDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id UUID PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL,
    status TEXT NOT NULL,
    total_cents BIGINT NOT NULL CHECK (total_cents >= 0)
)
"#;

pub const CREATE_ORDER_LINES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS order_lines (
    id UUID PRIMARY KEY,
    order_id UUID NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
    line_no INTEGER NOT NULL,
    product_id UUID NOT NULL REFERENCES products (id),
    quantity BIGINT NOT NULL CHECK (quantity >= 1),
    unit_price_cents BIGINT NOT NULL CHECK (unit_price_cents >= 0)
)
"#;

pub const CREATE_ORDER_COUPONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS order_coupons (
    order_id UUID NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
    coupon_id UUID NOT NULL REFERENCES coupons (id),
    PRIMARY KEY (order_id, coupon_id)
)
"#;

pub const CREATE_STOCK_ITEMS_PRODUCT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS stock_items_product_idx ON stock_items (product_id, created_at)
"#;

/// Statements in dependency order.
pub const ALL: &[&str] = &[
    CREATE_PRODUCTS_TABLE,
    CREATE_STOCK_LOCATIONS_TABLE,
    CREATE_STOCK_ITEMS_TABLE,
    CREATE_COUPONS_TABLE,
    CREATE_ORDERS_TABLE,
    CREATE_ORDER_LINES_TABLE,
    CREATE_ORDER_COUPONS_TABLE,
    CREATE_STOCK_ITEMS_PRODUCT_INDEX,
];
