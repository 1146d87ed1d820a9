//! PostgreSQL implementation of the entity store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{EntityStore, StoreError, StoreResult, StoreTransaction};
use crate::models::{
    CreateCustomer, CreateProduct, CreateUser, Customer, Invoice, InvoiceLine, InvoiceLineDetail,
    InvoiceSummary, NewInvoice, NewInvoiceLine, Product, UpdateProduct, User,
};
use crate::services::metrics::DB_QUERY_DURATION;

const PRODUCT_COLUMNS: &str =
    "product_id, name, description, unit_price, quantity, created_utc, updated_utc";

/// Connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> StoreResult<Self> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::unavailable("Failed to connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> StoreResult<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable("Migration failed", e))?;
        info!("Database migrations completed");
        Ok(())
    }
}

/// Invoice row joined with its (possibly missing) customer.
#[derive(FromRow)]
struct InvoiceCustomerRow {
    invoice_id: Uuid,
    customer_id: Uuid,
    total: Decimal,
    created_utc: DateTime<Utc>,
    c_customer_id: Option<Uuid>,
    c_name: Option<String>,
    c_address: Option<String>,
    c_phone: Option<String>,
    c_email: Option<String>,
    c_created_utc: Option<DateTime<Utc>>,
}

impl From<InvoiceCustomerRow> for InvoiceSummary {
    fn from(row: InvoiceCustomerRow) -> Self {
        let customer = match (row.c_customer_id, row.c_name, row.c_created_utc) {
            (Some(customer_id), Some(name), Some(created_utc)) => Some(Customer {
                customer_id,
                name,
                address: row.c_address,
                phone: row.c_phone,
                email: row.c_email,
                created_utc,
            }),
            _ => None,
        };

        InvoiceSummary {
            invoice: Invoice {
                invoice_id: row.invoice_id,
                customer_id: row.customer_id,
                total: row.total,
                created_utc: row.created_utc,
            },
            customer,
        }
    }
}

const INVOICE_CUSTOMER_SELECT: &str = r#"
    SELECT i.invoice_id, i.customer_id, i.total, i.created_utc,
        c.customer_id AS c_customer_id, c.name AS c_name, c.address AS c_address,
        c.phone AS c_phone, c.email AS c_email, c.created_utc AS c_created_utc
    FROM invoices i
    LEFT JOIN customers c ON c.customer_id = i.customer_id
"#;

/// Invoice line joined with its (possibly deleted) product.
#[derive(FromRow)]
struct LineProductRow {
    line_id: Uuid,
    invoice_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    sort_order: i32,
    p_product_id: Option<Uuid>,
    p_name: Option<String>,
    p_description: Option<String>,
    p_unit_price: Option<Decimal>,
    p_quantity: Option<i32>,
    p_created_utc: Option<DateTime<Utc>>,
    p_updated_utc: Option<DateTime<Utc>>,
}

impl From<LineProductRow> for InvoiceLineDetail {
    fn from(row: LineProductRow) -> Self {
        let product = match (
            row.p_product_id,
            row.p_name,
            row.p_unit_price,
            row.p_quantity,
            row.p_created_utc,
            row.p_updated_utc,
        ) {
            (
                Some(product_id),
                Some(name),
                Some(unit_price),
                Some(quantity),
                Some(created_utc),
                Some(updated_utc),
            ) => Some(Product {
                product_id,
                name,
                description: row.p_description,
                unit_price,
                quantity,
                created_utc,
                updated_utc,
            }),
            _ => None,
        };

        InvoiceLineDetail {
            line: InvoiceLine {
                line_id: row.line_id,
                invoice_id: row.invoice_id,
                product_id: row.product_id,
                quantity: row.quantity,
                unit_price: row.unit_price,
                sort_order: row.sort_order,
            },
            product,
        }
    }
}

#[async_trait]
impl EntityStore for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable("Health check failed", e))?;
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::unavailable("Failed to begin transaction", e))?;
        Ok(Box::new(PgTransaction { tx }))
    }

    // -------------------------------------------------------------------------
    // Customer Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input))]
    async fn create_customer(&self, input: &CreateCustomer) -> StoreResult<Customer> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (customer_id, name, address, phone, email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING customer_id, name, address, phone, email, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("Failed to create customer", e))?;

        timer.observe_duration();

        info!(customer_id = %customer.customer_id, "Customer created");

        Ok(customer)
    }

    #[instrument(skip(self), fields(customer_id = %customer_id))]
    async fn get_customer(&self, customer_id: Uuid) -> StoreResult<Option<Customer>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT customer_id, name, address, phone, email, created_utc
            FROM customers
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("Failed to get customer", e))?;

        timer.observe_duration();

        Ok(customer)
    }

    #[instrument(skip(self))]
    async fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_customers"])
            .start_timer();

        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT customer_id, name, address, phone, email, created_utc
            FROM customers
            ORDER BY created_utc, customer_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("Failed to list customers", e))?;

        timer.observe_duration();

        Ok(customers)
    }

    // -------------------------------------------------------------------------
    // Product Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input))]
    async fn create_product(&self, input: &CreateProduct) -> StoreResult<Product> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (product_id, name, description, unit_price, quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.unit_price)
        .bind(input.quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("Failed to create product", e))?;

        timer.observe_duration();

        info!(product_id = %product.product_id, "Product created");

        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn get_product(&self, product_id: Uuid) -> StoreResult<Option<Product>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = $1"
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("Failed to get product", e))?;

        timer.observe_duration();

        Ok(product)
    }

    #[instrument(skip(self))]
    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_products"])
            .start_timer();

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_utc, product_id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("Failed to list products", e))?;

        timer.observe_duration();

        Ok(products)
    }

    #[instrument(skip(self, input), fields(product_id = %product_id))]
    async fn update_product(
        &self,
        product_id: Uuid,
        input: &UpdateProduct,
    ) -> StoreResult<Option<Product>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                unit_price = COALESCE($4, unit_price),
                quantity = COALESCE($5, quantity),
                updated_utc = NOW()
            WHERE product_id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.unit_price)
        .bind(input.quantity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("Failed to update product", e))?;

        timer.observe_duration();

        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn delete_product(&self, product_id: Uuid) -> StoreResult<bool> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_product"])
            .start_timer();

        let result = sqlx::query("DELETE FROM products WHERE product_id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable("Failed to delete product", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn get_invoice(&self, invoice_id: Uuid) -> StoreResult<Option<InvoiceSummary>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let row = sqlx::query_as::<_, InvoiceCustomerRow>(&format!(
            "{INVOICE_CUSTOMER_SELECT} WHERE i.invoice_id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("Failed to get invoice", e))?;

        timer.observe_duration();

        Ok(row.map(InvoiceSummary::from))
    }

    #[instrument(skip(self))]
    async fn list_invoices(&self) -> StoreResult<Vec<InvoiceSummary>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let rows = sqlx::query_as::<_, InvoiceCustomerRow>(&format!(
            "{INVOICE_CUSTOMER_SELECT} ORDER BY i.created_utc DESC, i.invoice_id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("Failed to list invoices", e))?;

        timer.observe_duration();

        Ok(rows.into_iter().map(InvoiceSummary::from).collect())
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn get_invoice_lines(&self, invoice_id: Uuid) -> StoreResult<Vec<InvoiceLineDetail>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_lines"])
            .start_timer();

        let rows = sqlx::query_as::<_, LineProductRow>(
            r#"
            SELECT l.line_id, l.invoice_id, l.product_id, l.quantity, l.unit_price, l.sort_order,
                p.product_id AS p_product_id, p.name AS p_name, p.description AS p_description,
                p.unit_price AS p_unit_price, p.quantity AS p_quantity,
                p.created_utc AS p_created_utc, p.updated_utc AS p_updated_utc
            FROM invoice_lines l
            LEFT JOIN products p ON p.product_id = l.product_id
            WHERE l.invoice_id = $1
            ORDER BY l.sort_order
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("Failed to get invoice lines", e))?;

        timer.observe_duration();

        Ok(rows.into_iter().map(InvoiceLineDetail::from).collect())
    }

    // -------------------------------------------------------------------------
    // User Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(username = %input.username))]
    async fn create_user(&self, input: &CreateUser) -> StoreResult<User> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, username, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, username, password_hash, role, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.username)
        .bind(&input.password_hash)
        .bind(input.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(format!("Username '{}' is already taken", input.username))
            }
            _ => StoreError::unavailable("Failed to create user", e),
        })?;

        timer.observe_duration();

        info!(user_id = %user.user_id, role = %input.role, "User registered");

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_user_by_username"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, password_hash, role, created_utc
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("Failed to find user", e))?;

        timer.observe_duration();

        Ok(user)
    }
}

/// Open database transaction. Dropping it without commit rolls back.
struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn get_customer(&mut self, customer_id: Uuid) -> StoreResult<Option<Customer>> {
        sqlx::query_as::<_, Customer>(
            r#"
            SELECT customer_id, name, address, phone, email, created_utc
            FROM customers
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| StoreError::unavailable("Failed to get customer", e))
    }

    async fn lock_products(&mut self, product_ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["lock_products"])
            .start_timer();

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE product_id = ANY($1)
            ORDER BY product_id
            FOR UPDATE
            "#
        ))
        .bind(product_ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| StoreError::unavailable("Failed to lock products", e))?;

        timer.observe_duration();

        Ok(products)
    }

    async fn decrement_stock(
        &mut self,
        product_id: Uuid,
        quantity: i32,
    ) -> StoreResult<Option<Product>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["decrement_stock"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET quantity = quantity - $2,
                updated_utc = NOW()
            WHERE product_id = $1 AND quantity >= $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| StoreError::unavailable("Failed to decrement stock", e))?;

        timer.observe_duration();

        Ok(product)
    }

    async fn insert_invoice(&mut self, input: &NewInvoice) -> StoreResult<Invoice> {
        sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (invoice_id, customer_id, total)
            VALUES ($1, $2, $3)
            RETURNING invoice_id, customer_id, total, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.customer_id)
        .bind(input.total)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| StoreError::unavailable("Failed to insert invoice", e))
    }

    async fn insert_invoice_line(&mut self, input: &NewInvoiceLine) -> StoreResult<InvoiceLine> {
        sqlx::query_as::<_, InvoiceLine>(
            r#"
            INSERT INTO invoice_lines (line_id, invoice_id, product_id, quantity, unit_price, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING line_id, invoice_id, product_id, quantity, unit_price, sort_order
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.invoice_id)
        .bind(input.product_id)
        .bind(input.quantity)
        .bind(input.unit_price)
        .bind(input.sort_order)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| StoreError::unavailable("Failed to insert invoice line", e))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::unavailable("Failed to commit transaction", e))
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::unavailable("Failed to roll back transaction", e))
    }
}
