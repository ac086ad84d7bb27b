//! API integration tests
//!
//! These run against a live server with a migrated database.

use std::sync::atomic::{AtomicU32, Ordering};

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

static SEQ: AtomicU32 = AtomicU32::new(0);

/// 13 digits, distinct across calls and runs, usable as an ISBN
fn unique() -> String {
    let secs = chrono::Utc::now().timestamp() % 10_000_000_000;
    let seq = SEQ.fetch_add(1, Ordering::Relaxed) % 1000;
    format!("{:010}{:03}", secs, seq)
}

async fn create_item(client: &Client, copies: i32) -> Value {
    let response = client
        .post(format!("{}/items", BASE_URL))
        .json(&json!({
            "isbn": unique(),
            "title": "The Left Hand of Darkness",
            "author": "Ursula K. Le Guin",
            "category": "fiction",
            "total_copies": copies
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    response.json().await.expect("Failed to parse response")
}

async fn create_member(client: &Client) -> Value {
    let response = client
        .post(format!("{}/members", BASE_URL))
        .json(&json!({
            "name": "Genly Ai",
            "email": format!("genly{}@example.org", unique())
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    response.json().await.expect("Failed to parse response")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_readiness() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_list_items() {
    let client = Client::new();

    let response = client
        .get(format!("{}/items?per_page=5", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["items"].is_array());
    assert!(body["total"].is_number());
    assert_eq!(body["per_page"], 5);
}

#[tokio::test]
#[ignore]
async fn test_create_and_delete_item() {
    let client = Client::new();
    let item = create_item(&client, 2).await;
    let item_id = item["id"].as_i64().expect("No item ID");

    assert_eq!(item["status"], "available");
    assert_eq!(item["available_copies"], 2);

    let response = client
        .delete(format!("{}/items/{}", BASE_URL, item_id))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 204);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_isbn_rejected() {
    let client = Client::new();
    let item = create_item(&client, 1).await;

    let response = client
        .post(format!("{}/items", BASE_URL))
        .json(&json!({
            "isbn": item["isbn"],
            "title": "Copy",
            "author": "Someone",
            "category": "fiction"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_manual_loaned_status_rejected() {
    let client = Client::new();
    let item = create_item(&client, 1).await;

    let response = client
        .patch(format!("{}/items/{}/status", BASE_URL, item["id"]))
        .json(&json!({ "status": "loaned" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_return() {
    let client = Client::new();
    let item = create_item(&client, 1).await;
    let member = create_member(&client).await;

    let response = client
        .get(format!(
            "{}/loans/eligibility?item_id={}&member_id={}",
            BASE_URL, item["id"], member["id"]
        ))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["allowed"], true);

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({ "item_id": item["id"], "member_id": member["id"] }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(loan["status"], "active");

    let response = client
        .get(format!("{}/items/{}", BASE_URL, item["id"]))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "loaned");
    assert_eq!(body["available_copies"], 0);

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan["id"]))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let outcome: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(outcome["loan"]["status"], "returned");
    assert!(outcome["fine"].is_null());

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan["id"]))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["message"], "already returned");
}

#[tokio::test]
#[ignore]
async fn test_borrow_denied() {
    let client = Client::new();
    let item = create_item(&client, 1).await;
    let first = create_member(&client).await;
    let second = create_member(&client).await;

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({ "item_id": item["id"], "member_id": first["id"] }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({ "item_id": item["id"], "member_id": second["id"] }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["message"], "item is loaned");
}

#[tokio::test]
#[ignore]
async fn test_member_with_loans_cannot_be_deleted() {
    let client = Client::new();
    let item = create_item(&client, 1).await;
    let member = create_member(&client).await;

    client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({ "item_id": item["id"], "member_id": member["id"] }))
        .send()
        .await
        .expect("Failed to send request");

    let response = client
        .delete(format!("{}/members/{}", BASE_URL, member["id"]))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_member_fines() {
    let client = Client::new();
    let member = create_member(&client).await;

    let response = client
        .get(format!("{}/members/{}/fines", BASE_URL, member["id"]))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["count"], 0);
    assert!(body["fines"].as_array().map(|f| f.is_empty()).unwrap_or(false));
}

#[tokio::test]
#[ignore]
async fn test_list_fines() {
    let client = Client::new();

    let response = client
        .get(format!("{}/fines?paid=false", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["items"].is_array());
    assert!(!body["total_unpaid"].is_null());
}

#[tokio::test]
#[ignore]
async fn test_sweep_and_overdue_listing() {
    let client = Client::new();

    let response = client
        .post(format!("{}/admin/sweep", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let report: Value = response.json().await.expect("Failed to parse response");
    assert!(report["reclassified"].is_array());

    let response = client
        .get(format!("{}/loans/overdue", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body
        .as_array()
        .expect("overdue listing is an array")
        .iter()
        .all(|loan| loan["status"] == "overdue"));
}

#[tokio::test]
#[ignore]
async fn test_unknown_loan() {
    let client = Client::new();

    let response = client
        .get(format!("{}/loans/999999999", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "NotFound");
}

async fn borrow(client: &Client, item_id: &Value, member_id: &Value) -> reqwest::StatusCode {
    client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({ "item_id": item_id, "member_id": member_id }))
        .send()
        .await
        .expect("Failed to send request")
        .status()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn test_parallel_borrows_of_last_copy() {
    let client = Client::new();
    let item = create_item(&client, 1).await;

    let mut members = Vec::new();
    for _ in 0..16 {
        members.push(create_member(&client).await);
    }

    let mut handles = Vec::new();
    for member in members {
        let client = client.clone();
        let item_id = item["id"].clone();
        handles.push(tokio::spawn(async move {
            borrow(&client, &item_id, &member["id"]).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        let status = handle.await.expect("borrow task panicked");
        match status.as_u16() {
            201 => created += 1,
            422 => {}
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(created, 1);

    let response = client
        .get(format!("{}/items/{}", BASE_URL, item["id"]))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["available_copies"], 0);
    assert_eq!(body["status"], "loaned");
}

/// Assumes the default `lending.max_loans_per_member` of 3
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn test_parallel_borrows_respect_loan_cap() {
    let client = Client::new();
    let member = create_member(&client).await;

    let mut items = Vec::new();
    for _ in 0..10 {
        items.push(create_item(&client, 1).await);
    }

    let mut handles = Vec::new();
    for item in items {
        let client = client.clone();
        let member_id = member["id"].clone();
        handles.push(tokio::spawn(async move {
            borrow(&client, &item["id"], &member_id).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        let status = handle.await.expect("borrow task panicked");
        match status.as_u16() {
            201 => created += 1,
            422 => {}
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(created, 3);

    let response = client
        .get(format!("{}/members/{}/loans", BASE_URL, member["id"]))
        .send()
        .await
        .expect("Failed to send request");
    let loans: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(loans.as_array().map(|l| l.len()), Some(3));
}

#[tokio::test]
#[ignore]
async fn test_loans_and_fines_filtered_by_member() {
    let client = Client::new();
    let item = create_item(&client, 2).await;
    let member = create_member(&client).await;
    let other = create_member(&client).await;

    assert_eq!(borrow(&client, &item["id"], &member["id"]).await, 201);
    assert_eq!(borrow(&client, &item["id"], &other["id"]).await, 201);

    let response = client
        .get(format!(
            "{}/loans?member_id={}&item_id={}&status=active",
            BASE_URL, member["id"], item["id"]
        ))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["member_id"], member["id"]);

    let response = client
        .get(format!("{}/fines?member_id={}", BASE_URL, member["id"]))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["total"], 0);
}

#[tokio::test]
#[ignore]
async fn test_out_of_range_page_is_empty() {
    let client = Client::new();

    let response = client
        .get(format!("{}/items?page={}", BASE_URL, i64::MAX))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["items"].as_array().map(|i| i.len()), Some(0));
}
