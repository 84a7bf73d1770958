#![allow(dead_code)]

use sql_ordinal::prelude::*;

/// Route library logs to the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory context with a `products` table holding three rows.
pub fn products_context() -> Result<DbContext, SqlOrdinalError> {
    init_tracing();
    let mut ctx = DbContext::new();
    ctx.connect_in_memory()?;
    ctx.execute_batch(
        "CREATE TABLE products (
             id INTEGER PRIMARY KEY,
             name TEXT NOT NULL,
             cost DECIMAL(10, 2),
             quantity INTEGER,
             added DATE
         );
         INSERT INTO products VALUES (1, 'Widget', 9.99, 5, '2024-01-15');
         INSERT INTO products VALUES (2, 'Gadget', 24.50, 0, NULL);
         INSERT INTO products VALUES (3, 'Doohickey', 1.25, 120, '2023-11-02');",
    )?;
    Ok(ctx)
}

pub fn product_count(ctx: &DbContext) -> Result<i64, SqlOrdinalError> {
    ctx.session("SELECT COUNT(*) FROM products")?.read()
}
