//! In-process entity store.
//!
//! All tables live behind one async mutex. A transaction holds the mutex for
//! its whole lifetime, so transactions are serialized and readers never see a
//! half-applied invoice. Writes are applied in place and recorded in an undo
//! log; rollback (explicit or on drop) replays the log as compensating writes.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{EntityStore, StoreError, StoreResult, StoreTransaction};
use crate::models::{
    CreateCustomer, CreateProduct, CreateUser, Customer, Invoice, InvoiceLine, InvoiceLineDetail,
    InvoiceSummary, NewInvoice, NewInvoiceLine, Product, UpdateProduct, User,
};

#[derive(Default)]
struct Tables {
    customers: HashMap<Uuid, Customer>,
    products: HashMap<Uuid, Product>,
    invoices: HashMap<Uuid, Invoice>,
    invoice_lines: HashMap<Uuid, InvoiceLine>,
    users: HashMap<Uuid, User>,
}

impl Tables {
    fn invoice_summary(&self, invoice: &Invoice) -> InvoiceSummary {
        InvoiceSummary {
            invoice: invoice.clone(),
            customer: self.customers.get(&invoice.customer_id).cloned(),
        }
    }
}

/// Entity store kept entirely in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = self.tables.clone().lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            tables: guard,
            undo: Vec::new(),
            finished: false,
        }))
    }

    async fn create_customer(&self, input: &CreateCustomer) -> StoreResult<Customer> {
        let customer = Customer {
            customer_id: Uuid::new_v4(),
            name: input.name.clone(),
            address: input.address.clone(),
            phone: input.phone.clone(),
            email: input.email.clone(),
            created_utc: Utc::now(),
        };
        self.tables
            .lock()
            .await
            .customers
            .insert(customer.customer_id, customer.clone());
        info!(customer_id = %customer.customer_id, "Customer created");
        Ok(customer)
    }

    async fn get_customer(&self, customer_id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(self.tables.lock().await.customers.get(&customer_id).cloned())
    }

    async fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        let tables = self.tables.lock().await;
        let mut customers: Vec<Customer> = tables.customers.values().cloned().collect();
        customers.sort_by_key(|c| (c.created_utc, c.customer_id));
        Ok(customers)
    }

    async fn create_product(&self, input: &CreateProduct) -> StoreResult<Product> {
        let now = Utc::now();
        let product = Product {
            product_id: Uuid::new_v4(),
            name: input.name.clone(),
            description: input.description.clone(),
            unit_price: input.unit_price,
            quantity: input.quantity,
            created_utc: now,
            updated_utc: now,
        };
        self.tables
            .lock()
            .await
            .products
            .insert(product.product_id, product.clone());
        info!(product_id = %product.product_id, "Product created");
        Ok(product)
    }

    async fn get_product(&self, product_id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.tables.lock().await.products.get(&product_id).cloned())
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let tables = self.tables.lock().await;
        let mut products: Vec<Product> = tables.products.values().cloned().collect();
        products.sort_by_key(|p| (p.created_utc, p.product_id));
        Ok(products)
    }

    async fn update_product(
        &self,
        product_id: Uuid,
        input: &UpdateProduct,
    ) -> StoreResult<Option<Product>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.products.get_mut(&product_id).map(|product| {
            input.apply_to(product);
            product.updated_utc = Utc::now();
            product.clone()
        }))
    }

    async fn delete_product(&self, product_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .products
            .remove(&product_id)
            .is_some())
    }

    async fn get_invoice(&self, invoice_id: Uuid) -> StoreResult<Option<InvoiceSummary>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .invoices
            .get(&invoice_id)
            .map(|invoice| tables.invoice_summary(invoice)))
    }

    async fn list_invoices(&self) -> StoreResult<Vec<InvoiceSummary>> {
        let tables = self.tables.lock().await;
        let mut invoices: Vec<&Invoice> = tables.invoices.values().collect();
        invoices.sort_by(|a, b| {
            b.created_utc
                .cmp(&a.created_utc)
                .then(a.invoice_id.cmp(&b.invoice_id))
        });
        Ok(invoices
            .into_iter()
            .map(|invoice| tables.invoice_summary(invoice))
            .collect())
    }

    async fn get_invoice_lines(&self, invoice_id: Uuid) -> StoreResult<Vec<InvoiceLineDetail>> {
        let tables = self.tables.lock().await;
        let mut lines: Vec<InvoiceLineDetail> = tables
            .invoice_lines
            .values()
            .filter(|line| line.invoice_id == invoice_id)
            .map(|line| InvoiceLineDetail {
                line: line.clone(),
                product: tables.products.get(&line.product_id).cloned(),
            })
            .collect();
        lines.sort_by_key(|detail| detail.line.sort_order);
        Ok(lines)
    }

    async fn create_user(&self, input: &CreateUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.username == input.username) {
            return Err(StoreError::Conflict(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }

        let user = User {
            user_id: Uuid::new_v4(),
            username: input.username.clone(),
            password_hash: input.password_hash.clone(),
            role: input.role.as_str().to_string(),
            created_utc: Utc::now(),
        };
        tables.users.insert(user.user_id, user.clone());
        info!(user_id = %user.user_id, role = %input.role, "User registered");
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables
            .lock()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }
}

/// Compensating write for one applied change.
enum Undo {
    RestoreProduct(Box<Product>),
    RemoveInvoice(Uuid),
    RemoveInvoiceLine(Uuid),
}

struct MemoryTransaction {
    tables: OwnedMutexGuard<Tables>,
    undo: Vec<Undo>,
    finished: bool,
}

impl MemoryTransaction {
    fn compensate(&mut self) {
        if !self.undo.is_empty() {
            debug!(writes = self.undo.len(), "Rolling back in-memory transaction");
        }
        while let Some(undo) = self.undo.pop() {
            match undo {
                Undo::RestoreProduct(product) => {
                    self.tables.products.insert(product.product_id, *product);
                }
                Undo::RemoveInvoice(invoice_id) => {
                    self.tables.invoices.remove(&invoice_id);
                }
                Undo::RemoveInvoiceLine(line_id) => {
                    self.tables.invoice_lines.remove(&line_id);
                }
            }
        }
        self.finished = true;
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            warn!("In-memory transaction dropped without commit; rolling back");
            self.compensate();
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn get_customer(&mut self, customer_id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(self.tables.customers.get(&customer_id).cloned())
    }

    async fn lock_products(&mut self, product_ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        // The table mutex is already held, so every product is locked.
        let mut ids = product_ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(ids
            .iter()
            .filter_map(|id| self.tables.products.get(id).cloned())
            .collect())
    }

    async fn decrement_stock(
        &mut self,
        product_id: Uuid,
        quantity: i32,
    ) -> StoreResult<Option<Product>> {
        let Some(product) = self.tables.products.get_mut(&product_id) else {
            return Ok(None);
        };
        if product.quantity < quantity {
            return Ok(None);
        }

        self.undo.push(Undo::RestoreProduct(Box::new(product.clone())));
        product.quantity -= quantity;
        product.updated_utc = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn insert_invoice(&mut self, input: &NewInvoice) -> StoreResult<Invoice> {
        let invoice = Invoice {
            invoice_id: Uuid::new_v4(),
            customer_id: input.customer_id,
            total: input.total,
            created_utc: Utc::now(),
        };
        self.tables
            .invoices
            .insert(invoice.invoice_id, invoice.clone());
        self.undo.push(Undo::RemoveInvoice(invoice.invoice_id));
        Ok(invoice)
    }

    async fn insert_invoice_line(&mut self, input: &NewInvoiceLine) -> StoreResult<InvoiceLine> {
        if !self.tables.invoices.contains_key(&input.invoice_id) {
            return Err(StoreError::unavailable(
                "Failed to insert invoice line",
                format!("invoice {} does not exist", input.invoice_id),
            ));
        }

        let line = InvoiceLine {
            line_id: Uuid::new_v4(),
            invoice_id: input.invoice_id,
            product_id: input.product_id,
            quantity: input.quantity,
            unit_price: input.unit_price,
            sort_order: input.sort_order,
        };
        self.tables.invoice_lines.insert(line.line_id, line.clone());
        self.undo.push(Undo::RemoveInvoiceLine(line.line_id));
        Ok(line)
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.undo.clear();
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        self.compensate();
        Ok(())
    }
}
