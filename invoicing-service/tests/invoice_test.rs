mod common;

use common::{assert_money_eq, money, TestApp};
use futures::future::join_all;
use invoicing_service::models::Role;
use serde_json::{json, Value};

#[tokio::test]
async fn second_invoice_fails_when_stock_runs_out() {
    let app = TestApp::spawn().await;
    let manager = app.token_for(Role::Manager).await;
    let biller = app.token_for(Role::Biller).await;
    let customer = app.create_customer("Bodega Norte").await;
    let product = app.create_product(&manager, "Pintura", 10.0, 5).await;
    let product_id = product["id"].as_str().unwrap();

    let request = json!({
        "clienteId": customer["id"],
        "detalles": [{ "productoId": product_id, "cantidad": 3 }]
    });

    let first = app.post_invoice(&biller, &request).await;
    assert_eq!(first.status(), 201);
    let created: Value = first.json().await.unwrap();
    assert_money_eq(&created["factura"]["total"], 30.0);
    assert_eq!(created["factura"]["clienteId"], customer["id"]);
    assert_eq!(created["detalles"].as_array().unwrap().len(), 1);
    assert_eq!(app.get_product(&manager, product_id).await["cantidad"], 2);

    let second = app.post_invoice(&biller, &request).await;
    assert_eq!(second.status(), 400);
    let body: Value = second.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("Insufficient stock"), "{message}");
    assert!(message.contains("available 2"), "{message}");
    assert!(message.contains("requested 3"), "{message}");
    assert_eq!(app.get_product(&manager, product_id).await["cantidad"], 2);
}

#[tokio::test]
async fn invoice_detail_lines_sum_to_total() {
    let app = TestApp::spawn().await;
    let manager = app.token_for(Role::Manager).await;
    let customer = app.create_customer("Muebles Rio").await;
    let a = app.create_product(&manager, "Tabla", 12.5, 20).await;
    let b = app.create_product(&manager, "Barniz", 3.99, 20).await;

    let created: Value = app
        .post_invoice(
            &manager,
            &json!({
                "clienteId": customer["id"],
                "detalles": [
                    { "productoId": a["id"], "cantidad": 2, "precio": 1.0 },
                    { "productoId": b["id"], "cantidad": 4 }
                ]
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let invoice_id = created["factura"]["id"].as_str().unwrap();

    let detail: Value = app
        .client
        .get(app.url(&format!("/facturas/{}", invoice_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let total = money(&detail["factura"]["total"]);
    assert!((total - 40.96).abs() < 1e-9);
    assert_eq!(detail["factura"]["cliente"]["nombre"], "Muebles Rio");

    let lines = detail["detalles"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    let line_sum: f64 = lines
        .iter()
        .map(|line| money(&line["precio"]) * line["cantidad"].as_f64().unwrap())
        .sum();
    assert!((line_sum - total).abs() < 1e-9);

    // The caller's price on the first line is ignored.
    assert_money_eq(&lines[0]["precio"], 12.5);
    assert_eq!(lines[0]["producto"]["nombre"], "Tabla");
    assert_eq!(lines[1]["producto"]["nombre"], "Barniz");
}

#[tokio::test]
async fn unknown_product_creates_nothing() {
    let app = TestApp::spawn().await;
    let manager = app.token_for(Role::Manager).await;
    let customer = app.create_customer("Optica Luz").await;
    let product = app.create_product(&manager, "Lente", 80.0, 4).await;
    let missing = uuid::Uuid::new_v4();

    let resp = app
        .post_invoice(
            &manager,
            &json!({
                "clienteId": customer["id"],
                "detalles": [
                    { "productoId": product["id"], "cantidad": 1 },
                    { "productoId": missing, "cantidad": 1 }
                ]
            }),
        )
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains(&missing.to_string()));

    assert_eq!(
        app.get_product(&manager, product["id"].as_str().unwrap()).await["cantidad"],
        4
    );
    let invoices: Vec<Value> = app
        .client
        .get(app.url("/facturas"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(invoices.is_empty());
}

#[tokio::test]
async fn unknown_customer_and_empty_lines_are_bad_requests() {
    let app = TestApp::spawn().await;
    let manager = app.token_for(Role::Manager).await;
    let customer = app.create_customer("Kiosco").await;
    let product = app.create_product(&manager, "Chicle", 0.5, 100).await;

    let unknown_customer = app
        .post_invoice(
            &manager,
            &json!({
                "clienteId": uuid::Uuid::new_v4(),
                "detalles": [{ "productoId": product["id"], "cantidad": 1 }]
            }),
        )
        .await;
    assert_eq!(unknown_customer.status(), 400);

    let empty = app
        .post_invoice(
            &manager,
            &json!({ "clienteId": customer["id"], "detalles": [] }),
        )
        .await;
    assert_eq!(empty.status(), 400);
}

#[tokio::test]
async fn invoice_creation_requires_a_token() {
    let app = TestApp::spawn().await;
    let customer = app.create_customer("Sin Token").await;

    let resp = app
        .client
        .post(app.url("/facturas"))
        .json(&json!({
            "clienteId": customer["id"],
            "detalles": [{ "productoId": uuid::Uuid::new_v4(), "cantidad": 1 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Listing stays open.
    let list = app.client.get(app.url("/facturas")).send().await.unwrap();
    assert_eq!(list.status(), 200);
}

#[tokio::test]
async fn invoice_list_embeds_customer_newest_first() {
    let app = TestApp::spawn().await;
    let manager = app.token_for(Role::Manager).await;
    let customer = app.create_customer("Libreria Paz").await;
    let product = app.create_product(&manager, "Cuaderno", 2.0, 10).await;

    let mut ids = Vec::new();
    for quantity in [1, 2] {
        let created: Value = app
            .post_invoice(
                &manager,
                &json!({
                    "clienteId": customer["id"],
                    "detalles": [{ "productoId": product["id"], "cantidad": quantity }]
                }),
            )
            .await
            .json()
            .await
            .unwrap();
        ids.push(created["factura"]["id"].clone());
    }

    let list: Vec<Value> = app
        .client
        .get(app.url("/facturas"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["id"], ids[1]);
    assert_eq!(list[1]["id"], ids[0]);
    assert_eq!(list[0]["cliente"]["nombre"], "Libreria Paz");
}

#[tokio::test]
async fn concurrent_invoices_exhaust_stock_without_overselling() {
    let app = TestApp::spawn().await;
    let manager = app.token_for(Role::Manager).await;
    let customer = app.create_customer("Concurrencia SA").await;
    let product = app.create_product(&manager, "Cemento", 7.0, 10).await;
    let product_id = product["id"].as_str().unwrap().to_string();

    let request = json!({
        "clienteId": customer["id"],
        "detalles": [{ "productoId": product_id, "cantidad": 4 }]
    });

    let responses = join_all((0..6).map(|_| app.post_invoice(&manager, &request))).await;

    let created = responses.iter().filter(|r| r.status() == 201).count();
    let rejected = responses.iter().filter(|r| r.status() == 400).count();
    assert_eq!(created, 2);
    assert_eq!(rejected, 4);

    assert_eq!(app.get_product(&manager, &product_id).await["cantidad"], 2);
}
