//! API integration tests against a running server
//!
//! Start the server (`LIVRES__STORAGE__BACKEND=memory cargo run`), then run
//! `cargo test --test integration -- --ignored`.

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api";

/// Registers a throwaway user and returns a bearer token for it
async fn get_auth_token(client: &Client) -> String {
    let username = format!("it-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());
    let credentials = json!({ "username": username, "password": "pw1" });

    client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&credentials)
        .send()
        .await
        .expect("Failed to send register request");

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&credentials)
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

async fn create_book(client: &Client, title: &str) -> i64 {
    let response = client
        .post(format!("{}/livres", BASE_URL))
        .json(&json!({
            "title": title,
            "author": "Integration",
            "description": "Created by api_tests"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No book ID")
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
async fn test_login_invalid_credentials() {
    let client = Client::new();
    get_auth_token(&client).await;

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "username": "nobody-has-this-name",
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_borrow_return_cycle() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let book_id = create_book(&client, "Cycle").await;

    let borrow = |client: Client, token: String| async move {
        client
            .post(format!("{}/livres/{}/emprunt", BASE_URL, book_id))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .expect("Failed to send request")
            .status()
    };

    assert!(borrow(client.clone(), token.clone()).await.is_success());
    assert_eq!(borrow(client.clone(), token.clone()).await, 400);

    let response = client
        .post(format!("{}/livres/{}/retour", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["available"], true);

    assert!(borrow(client.clone(), token.clone()).await.is_success());

    // Cleanup
    let response = client
        .delete(format!("{}/livres/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_concurrent_borrows_single_winner() {
    let client = Client::new();
    let book_id = create_book(&client, "Race").await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        let token = get_auth_token(&client).await;
        handles.push(tokio::spawn(async move {
            client
                .post(format!("{}/livres/{}/emprunt", BASE_URL, book_id))
                .header("Authorization", format!("Bearer {}", token))
                .send()
                .await
                .expect("Failed to send request")
                .status()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("task panicked").is_success() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    client
        .delete(format!("{}/livres/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
}
