use crate::database::error::DatabaseError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

/// Advisory lock key serializing order-number allocation. Arbitrary but
/// stable; must differ from any other advisory key used on this database.
const ORDER_NUMBER_LOCK_KEY: i64 = 7_201_100;

/// Persisted order row. Immutable after creation.
#[derive(Debug, Clone, FromRow)]
pub struct OrderRecord {
    pub id: Uuid,
    pub order_seq: i64,
    pub order_number: String,
    pub customer_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub product_description: Option<String>,
    pub quantity: Option<i32>,
    pub delivery_method: Option<String>,
    pub delivery_address: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub total_amount: BigDecimal,
    pub currency: String,
    pub status_token: String,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted from the intake endpoint, before allocation.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub product_description: Option<String>,
    pub quantity: Option<i32>,
    pub delivery_method: Option<String>,
    pub delivery_address: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub total_amount: BigDecimal,
    pub currency: String,
}

pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Allocate the next order sequence number inside the caller's
    /// transaction.
    ///
    /// A transaction-scoped advisory lock serializes concurrent allocations;
    /// the highest existing sequence is then read and incremented. Both the
    /// lock and the insert commit or roll back together, so two intakes can
    /// never observe the same maximum. Unique constraints on `order_seq` and
    /// `order_number` backstop the invariant.
    pub async fn allocate_next_seq(
        &self,
        conn: &mut PgConnection,
        base: i64,
    ) -> Result<i64, DatabaseError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ORDER_NUMBER_LOCK_KEY)
            .execute(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let current: Option<i64> = sqlx::query_scalar("SELECT MAX(order_seq) FROM orders")
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(match current {
            Some(seq) => seq + 1,
            None => base,
        })
    }

    /// Insert the order row inside the caller's transaction.
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        order: &NewOrder,
        order_seq: i64,
        order_number: &str,
        status_token: &str,
    ) -> Result<OrderRecord, DatabaseError> {
        sqlx::query_as::<_, OrderRecord>(
            "INSERT INTO orders (
                 id, order_seq, order_number, customer_name, email, phone,
                 product_description, quantity, delivery_method, delivery_address,
                 scheduled_for, message, total_amount, currency, status_token
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING id, order_seq, order_number, customer_name, email, phone,
                       product_description, quantity, delivery_method, delivery_address,
                       scheduled_for, message, total_amount, currency, status_token,
                       created_at",
        )
        .bind(Uuid::new_v4())
        .bind(order_seq)
        .bind(order_number)
        .bind(&order.customer_name)
        .bind(&order.email)
        .bind(&order.phone)
        .bind(&order.product_description)
        .bind(order.quantity)
        .bind(&order.delivery_method)
        .bind(&order.delivery_address)
        .bind(order.scheduled_for)
        .bind(&order.message)
        .bind(&order.total_amount)
        .bind(&order.currency)
        .bind(status_token)
        .fetch_one(&mut *conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderRecord>, DatabaseError> {
        sqlx::query_as::<_, OrderRecord>(
            "SELECT id, order_seq, order_number, customer_name, email, phone,
                    product_description, quantity, delivery_method, delivery_address,
                    scheduled_for, message, total_amount, currency, status_token,
                    created_at
             FROM orders WHERE order_number = $1",
        )
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderRecord>, DatabaseError> {
        sqlx::query_as::<_, OrderRecord>(
            "SELECT id, order_seq, order_number, customer_name, email, phone,
                    product_description, quantity, delivery_method, delivery_address,
                    scheduled_for, message, total_amount, currency, status_token,
                    created_at
             FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
