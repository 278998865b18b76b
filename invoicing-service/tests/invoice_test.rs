//! Invoice CRUD integration tests.

mod common;

use common::{sample_invoice, spawn_app};
use reqwest::Method;
use serde_json::{json, Value};

#[tokio::test]
async fn create_invoice_returns_hydrated_invoice() {
    let app = spawn_app().await;

    let body = app.create_sample_invoice().await;

    assert_eq!(body["customer_name"], "Acme Corp");
    assert_eq!(body["status"], "Pending");
    assert_eq!(body["total_amount"], "40.00");
    assert!(body["reference_number"]
        .as_str()
        .unwrap()
        .starts_with("INV-"));
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["transaction_type"], "Sale");
    assert_eq!(transactions[0]["amount"], "40.00");
}

#[tokio::test]
async fn create_with_single_item_totals_exactly() {
    let app = spawn_app().await;

    let response = app
        .create_invoice(&json!({
            "customer_name": "Solo",
            "items": [{ "description": "Bolt", "quantity": 3, "unit_price": "0.33" }]
        }))
        .await;

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_amount"], "0.99");
}

#[tokio::test]
async fn create_without_items_fails_and_writes_nothing() {
    let app = spawn_app().await;

    let response = app
        .create_invoice(&json!({ "customer_name": "Empty", "items": [] }))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "validation_error");
    assert_eq!(body["details"][0]["kind"], "no_items");

    let (_, invoices) = app.get_json("/invoices").await;
    assert!(invoices["invoices"].as_array().unwrap().is_empty());
    let (_, transactions) = app.get_json("/transactions").await;
    assert!(transactions["transactions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn missing_items_field_fails_with_no_items() {
    let app = spawn_app().await;

    let response = app
        .create_invoice(&json!({ "customer_name": "No list" }))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["details"][0]["kind"], "no_items");
}

#[tokio::test]
async fn invalid_items_report_every_violation() {
    let app = spawn_app().await;

    let response = app
        .create_invoice(&json!({
            "customer_name": "Bad lines",
            "items": [
                { "description": "Zero", "quantity": 0, "unit_price": "1.00" },
                { "description": "Negative", "quantity": 1, "unit_price": "-5.00" }
            ]
        }))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    let details = body["details"].as_array().unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0]["field"], "items[0].quantity");
    assert_eq!(details[0]["kind"], "invalid_quantity");
    assert_eq!(details[1]["field"], "items[1].unit_price");
    assert_eq!(details[1]["kind"], "invalid_price");
}

#[tokio::test]
async fn negative_total_is_rejected_and_positive_total_ignored() {
    let app = spawn_app().await;

    let mut payload = sample_invoice();
    payload["total_amount"] = json!("-1.00");
    let response = app.create_invoice(&payload).await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["details"][0]["kind"], "invalid_total");

    payload["total_amount"] = json!("999.00");
    let response = app.create_invoice(&payload).await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_amount"], "40.00");
}

#[tokio::test]
async fn total_beyond_storage_precision_is_rejected() {
    let app = spawn_app().await;

    let response = app
        .create_invoice(&json!({
            "customer_name": "Bulk Buyer",
            "items": [{ "description": "Tanker", "quantity": 2, "unit_price": "99999999.99" }]
        }))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "validation_error");
    assert_eq!(body["details"][0]["field"], "total_amount");
    assert_eq!(body["details"][0]["kind"], "invalid_total");

    let (_, invoices) = app.get_json("/invoices").await;
    assert!(invoices["invoices"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unit_price_is_returned_at_two_decimals() {
    let app = spawn_app().await;

    let response = app
        .create_invoice(&json!({
            "customer_name": "Scale",
            "items": [{ "description": "Widget", "quantity": 2, "unit_price": "1.500" }]
        }))
        .await;

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["items"][0]["unit_price"], "1.50");
    assert_eq!(body["total_amount"], "3.00");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = spawn_app().await;

    let response = app
        .request(Method::POST, "/invoices")
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "malformed_request");
}

#[tokio::test]
async fn get_unknown_invoice_is_not_found() {
    let app = spawn_app().await;

    let (status, body) = app
        .get_json("/invoices/01890a5d-ac96-774b-bcce-b302099a8057")
        .await;

    assert_eq!(status, 404);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn put_replaces_items_and_recomputes_total() {
    let app = spawn_app().await;
    let created = app.create_sample_invoice().await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .request(Method::PUT, &format!("/invoices/{}", id))
        .json(&json!({
            "customer_name": "Acme Renamed",
            "items": [{ "description": "C", "quantity": 4, "unit_price": "2.50" }]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["customer_name"], "Acme Renamed");
    assert_eq!(body["total_amount"], "10.00");
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["description"], "C");
}

#[tokio::test]
async fn put_without_items_fails_with_no_items() {
    let app = spawn_app().await;
    let created = app.create_sample_invoice().await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .request(Method::PUT, &format!("/invoices/{}", id))
        .json(&json!({ "customer_name": "Acme" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["details"][0]["kind"], "no_items");

    let (_, current) = app.get_json(&format!("/invoices/{}", id)).await;
    assert_eq!(current["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn patch_changes_only_supplied_fields() {
    let app = spawn_app().await;
    let created = app.create_sample_invoice().await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .request(Method::PATCH, &format!("/invoices/{}", id))
        .json(&json!({ "customer_name": "Globex" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["customer_name"], "Globex");
    assert_eq!(body["total_amount"], "40.00");
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["reference_number"], created["reference_number"]);
}

#[tokio::test]
async fn patch_cannot_mark_invoice_paid() {
    let app = spawn_app().await;
    let created = app.create_sample_invoice().await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .request(Method::PATCH, &format!("/invoices/{}", id))
        .json(&json!({ "status": "Paid" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "status_read_only");

    let (_, current) = app.get_json(&format!("/invoices/{}", id)).await;
    assert_eq!(current["status"], "Pending");
}

#[tokio::test]
async fn delete_removes_invoice_items_and_transactions() {
    let app = spawn_app().await;
    let created = app.create_sample_invoice().await;
    let id = created["id"].as_str().unwrap();
    assert_eq!(app.pay(id).await.status().as_u16(), 200);

    let response = app
        .request(Method::DELETE, &format!("/invoices/{}", id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let (status, _) = app.get_json(&format!("/invoices/{}", id)).await;
    assert_eq!(status, 404);
    let (_, transactions) = app
        .get_json(&format!("/transactions?invoice_id={}", id))
        .await;
    assert!(transactions["transactions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn list_filters_by_status_and_pages() {
    let app = spawn_app().await;
    let first = app.create_sample_invoice().await;
    app.create_sample_invoice().await;
    app.create_sample_invoice().await;
    app.pay(first["id"].as_str().unwrap()).await;

    let (status, paid) = app.get_json("/invoices?status=Paid").await;
    assert_eq!(status, 200);
    let paid = paid["invoices"].as_array().unwrap();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0]["id"], first["id"]);
    assert_eq!(paid[0]["transactions"].as_array().unwrap().len(), 2);

    let (_, page) = app.get_json("/invoices?page_size=2").await;
    assert_eq!(page["invoices"].as_array().unwrap().len(), 2);
    let token = page["next_page_token"].as_str().unwrap().to_string();

    let (_, rest) = app
        .get_json(&format!("/invoices?page_size=2&page_token={}", token))
        .await;
    assert_eq!(rest["invoices"].as_array().unwrap().len(), 1);
    assert!(rest["next_page_token"].is_null());
}

#[tokio::test]
async fn recompute_endpoint_returns_invoice() {
    let app = spawn_app().await;
    let created = app.create_sample_invoice().await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .request(Method::POST, &format!("/invoices/{}/recompute", id))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_amount"], "40.00");
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
}
