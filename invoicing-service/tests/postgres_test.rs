//! Invoice workflow against a real PostgreSQL database.
//!
//! These tests need `TEST_DATABASE_URL` and are ignored by default:
//! `cargo test -p invoicing-service --test postgres_test -- --ignored`

mod common;

use common::init_tracing;
use futures::future::join_all;
use invoicing_service::models::{
    CreateCustomer, CreateProduct, Customer, NewInvoice, NewInvoiceLine, Product,
};
use invoicing_service::services::{
    EntityStore, InvoiceError, InvoiceRequest, InvoiceWorkflow, LineRequest, PgStore,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

async fn connect() -> Arc<PgStore> {
    init_tracing();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set - point it at a disposable PostgreSQL database");

    let store = PgStore::connect(&database_url, 10, 1)
        .await
        .expect("Failed to connect to test database");
    store
        .run_migrations()
        .await
        .expect("Failed to run migrations");

    Arc::new(store)
}

async fn seed_customer(store: &PgStore) -> Customer {
    store
        .create_customer(&CreateCustomer {
            name: format!("Cliente {}", Uuid::new_v4()),
            address: None,
            phone: None,
            email: None,
        })
        .await
        .unwrap()
}

async fn seed_product(store: &PgStore, unit_price: Decimal, quantity: i32) -> Product {
    store
        .create_product(&CreateProduct {
            name: format!("Producto {}", Uuid::new_v4()),
            description: None,
            unit_price,
            quantity,
        })
        .await
        .unwrap()
}

fn single_line(customer: &Customer, product: &Product, quantity: i32) -> InvoiceRequest {
    InvoiceRequest {
        customer_id: customer.customer_id,
        lines: vec![LineRequest {
            product_id: product.product_id,
            quantity,
            quoted_price: None,
        }],
    }
}

async fn stock_of(store: &PgStore, product: &Product) -> i32 {
    store
        .get_product(product.product_id)
        .await
        .unwrap()
        .unwrap()
        .quantity
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn second_invoice_fails_once_stock_runs_out() {
    let store = connect().await;
    let workflow = InvoiceWorkflow::new(store.clone());
    let customer = seed_customer(&store).await;
    let product = seed_product(&store, Decimal::new(1000, 2), 5).await;
    let request = single_line(&customer, &product, 3);

    let created = workflow.create_invoice(&request).await.unwrap();
    assert_eq!(created.invoice.total, Decimal::new(3000, 2));
    assert_eq!(created.lines.len(), 1);
    assert_eq!(stock_of(&store, &product).await, 2);

    let err = workflow.create_invoice(&request).await.unwrap_err();
    assert!(matches!(
        err,
        InvoiceError::InsufficientStock {
            available: 2,
            requested: 3,
            ..
        }
    ));
    assert_eq!(stock_of(&store, &product).await, 2);

    let lines = store
        .get_invoice_lines(created.invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].line.unit_price, Decimal::new(1000, 2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires TEST_DATABASE_URL"]
async fn concurrent_invoices_never_oversell() {
    let store = connect().await;
    let workflow = InvoiceWorkflow::new(store.clone());
    let customer = seed_customer(&store).await;
    let product = seed_product(&store, Decimal::new(250, 2), 10).await;

    let attempts = (0..8).map(|_| {
        let workflow = workflow.clone();
        let request = single_line(&customer, &product, 3);
        tokio::spawn(async move { workflow.create_invoice(&request).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let out_of_stock = results
        .iter()
        .filter(|r| matches!(r, Err(InvoiceError::InsufficientStock { .. })))
        .count();

    assert_eq!(succeeded, 3);
    assert_eq!(out_of_stock, 5);
    assert_eq!(stock_of(&store, &product).await, 1);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn failed_line_insert_rolls_back_stock_and_invoice() {
    let store = connect().await;
    let customer = seed_customer(&store).await;
    let product = seed_product(&store, Decimal::new(500, 2), 10).await;

    let mut tx = store.begin().await.unwrap();
    tx.lock_products(&[product.product_id]).await.unwrap();
    let decremented = tx
        .decrement_stock(product.product_id, 4)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(decremented.quantity, 6);

    let invoice = tx
        .insert_invoice(&NewInvoice {
            customer_id: customer.customer_id,
            total: Decimal::new(2000, 2),
        })
        .await
        .unwrap();

    // No invoice with this id exists, so the foreign key rejects the line.
    let line = tx
        .insert_invoice_line(&NewInvoiceLine {
            invoice_id: Uuid::new_v4(),
            product_id: product.product_id,
            quantity: 4,
            unit_price: product.unit_price,
            sort_order: 0,
        })
        .await;
    assert!(line.is_err());

    tx.rollback().await.unwrap();

    assert_eq!(stock_of(&store, &product).await, 10);
    assert!(store.get_invoice(invoice.invoice_id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn dropped_transaction_leaves_no_trace() {
    let store = connect().await;
    let customer = seed_customer(&store).await;
    let product = seed_product(&store, Decimal::new(500, 2), 10).await;

    let invoice_id = {
        let mut tx = store.begin().await.unwrap();
        tx.lock_products(&[product.product_id]).await.unwrap();
        tx.decrement_stock(product.product_id, 10).await.unwrap().unwrap();
        tx.insert_invoice(&NewInvoice {
            customer_id: customer.customer_id,
            total: Decimal::new(5000, 2),
        })
        .await
        .unwrap()
        .invoice_id
    };

    assert_eq!(stock_of(&store, &product).await, 10);
    assert!(store.get_invoice(invoice_id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn stock_decrement_refuses_to_go_negative() {
    let store = connect().await;
    let product = seed_product(&store, Decimal::new(100, 2), 2).await;

    let mut tx = store.begin().await.unwrap();
    let refused = tx.decrement_stock(product.product_id, 3).await.unwrap();
    assert!(refused.is_none());
    tx.commit().await.unwrap();

    assert_eq!(stock_of(&store, &product).await, 2);
}
