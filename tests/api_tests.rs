//! API integration tests
//!
//! These run against a live server with an administrator account configured:
//! `SHELFMARK_USERS__ADMIN_USERNAME=admin SHELFMARK_USERS__ADMIN_PASSWORD=admin123`.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Suffix keeping usernames, ISBNs and names unique across runs
fn unique() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{}", nanos % 10_000_000_000)
}

async fn token_for(client: &Client, username: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/token", BASE_URL))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to send token request");

    let body: Value = response.json().await.expect("Failed to parse token response");
    body["token"].as_str().expect("No token in response").to_string()
}

async fn admin_token(client: &Client) -> String {
    token_for(client, "admin", "admin123").await
}

/// Register a fresh reader and return its token
async fn new_reader(client: &Client) -> String {
    let (_, token) = new_named_reader(client).await;
    token
}

/// Register a fresh reader and return (username, token)
async fn new_named_reader(client: &Client) -> (String, String) {
    let username = format!("reader{}", unique());
    let response = client
        .post(format!("{}/register", BASE_URL))
        .json(&json!({ "username": username, "password": "secret1" }))
        .send()
        .await
        .expect("Failed to send register request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let token = token_for(client, &username, "secret1").await;
    (username, token)
}

/// Create a book with `quantity` copies and return its id
async fn new_book(client: &Client, admin: &str, quantity: i32) -> i64 {
    let suffix = unique();

    let publisher: Value = client
        .post(format!("{}/publishers", BASE_URL))
        .bearer_auth(admin)
        .json(&json!({ "name": format!("Publisher {}", suffix) }))
        .send()
        .await
        .expect("Failed to create publisher")
        .json()
        .await
        .expect("Failed to parse publisher");

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(admin)
        .json(&json!({
            "title": format!("Book {}", suffix),
            "isbn": format!("978{:0>10}", suffix),
            "publisher_id": publisher["id"],
            "publication_date": "2020-05-01",
            "quantity": quantity
        }))
        .send()
        .await
        .expect("Failed to create book");
    assert_eq!(response.status(), StatusCode::CREATED);

    let book: Value = response.json().await.expect("Failed to parse book");
    book["id"].as_i64().expect("No book id")
}

async fn post_loan_action(client: &Client, token: &str, book_id: i64, action: &str) -> (StatusCode, Value) {
    let response = client
        .post(format!("{}/books/{}/{}", BASE_URL, book_id, action))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to send loan request");
    let status = response.status();
    let body: Value = response.json().await.expect("Failed to parse loan response");
    (status, body)
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
async fn test_token_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/token", BASE_URL))
        .json(&json!({ "username": "admin", "password": "wrong" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
#[ignore]
async fn test_reader_cannot_create_book() {
    let client = Client::new();
    let reader = new_reader(&client).await;

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&reader)
        .json(&json!({
            "title": "Nope",
            "isbn": "9780000000000",
            "publisher_id": 1,
            "publication_date": "2020-01-01",
            "quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_last_copy_sequential_handover() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book_id = new_book(&client, &admin, 1).await;
    let x = new_reader(&client).await;
    let y = new_reader(&client).await;

    let (status, body) = post_loan_action(&client, &x, book_id, "borrow").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["quantity"], 0);
    assert_eq!(body["user_status"], "BORROWED");
    assert_eq!(body["loan"]["status"], "ON_LOAN");

    let (status, body) = post_loan_action(&client, &y, book_id, "borrow").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "OutOfStock");

    let (status, body) = post_loan_action(&client, &x, book_id, "return_book").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quantity"], 1);
    assert_eq!(body["user_status"], "AVAILABLE");
    assert_eq!(body["loan"]["status"], "RETURNED");

    let (status, _) = post_loan_action(&client, &y, book_id, "borrow").await;
    assert_eq!(status, StatusCode::OK);
}

async fn book_quantity(client: &Client, book_id: i64) -> i64 {
    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to fetch book")
        .json()
        .await
        .expect("Failed to parse book");
    book["quantity"].as_i64().expect("No quantity")
}

#[tokio::test]
#[ignore]
async fn test_concurrent_borrows_of_last_copy() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book_id = new_book(&client, &admin, 1).await;
    let x = new_reader(&client).await;
    let y = new_reader(&client).await;

    let (first, second) = tokio::join!(
        post_loan_action(&client, &x, book_id, "borrow"),
        post_loan_action(&client, &y, book_id, "borrow"),
    );

    let mut statuses = [first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);

    let rejected = if first.0 == StatusCode::OK { &second.1 } else { &first.1 };
    assert_eq!(rejected["error"], "OutOfStock");
    assert_eq!(book_quantity(&client, book_id).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_borrows_by_same_reader() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book_id = new_book(&client, &admin, 3).await;
    let reader = new_reader(&client).await;

    let (first, second) = tokio::join!(
        post_loan_action(&client, &reader, book_id, "borrow"),
        post_loan_action(&client, &reader, book_id, "borrow"),
    );

    let mut statuses = [first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);

    let rejected = if first.0 == StatusCode::OK { &second.1 } else { &first.1 };
    assert_eq!(rejected["error"], "AlreadyBorrowed");
    assert_eq!(book_quantity(&client, book_id).await, 2);
}

#[tokio::test]
#[ignore]
async fn test_revoked_staff_token_loses_admin_access() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (username, reader) = new_named_reader(&client).await;

    let me: Value = client
        .get(format!("{}/me", BASE_URL))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to fetch profile")
        .json()
        .await
        .expect("Failed to parse profile");
    let user_id = me["id"].as_i64().expect("No user id");

    let set_staff = |is_staff: bool| {
        client
            .put(format!("{}/users/{}/staff", BASE_URL, user_id))
            .bearer_auth(&admin)
            .json(&json!({ "is_staff": is_staff }))
            .send()
    };

    let granted = set_staff(true).await.expect("Failed to grant staff");
    assert_eq!(granted.status(), StatusCode::OK);
    let staff_token = token_for(&client, &username, "secret1").await;

    let create_author = |name: String| {
        client
            .post(format!("{}/authors", BASE_URL))
            .bearer_auth(&staff_token)
            .json(&json!({ "name": name }))
            .send()
    };

    let response = create_author(format!("Author {}", unique())).await.expect("Failed to create author");
    assert_eq!(response.status(), StatusCode::CREATED);

    let revoked = set_staff(false).await.expect("Failed to revoke staff");
    assert_eq!(revoked.status(), StatusCode::OK);

    let response = create_author(format!("Author {}", unique())).await.expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_author_search_treats_wildcards_literally() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let suffix = unique();

    for name in [format!("Under_Score {}", suffix), format!("UnderXScore {}", suffix)] {
        let response = client
            .post(format!("{}/authors", BASE_URL))
            .bearer_auth(&admin)
            .json(&json!({ "name": name }))
            .send()
            .await
            .expect("Failed to create author");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let authors: Value = client
        .get(format!("{}/authors", BASE_URL))
        .query(&[("search", format!("under_score {}", suffix))])
        .send()
        .await
        .expect("Failed to list authors")
        .json()
        .await
        .expect("Failed to parse authors");

    let authors = authors.as_array().expect("Author list");
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0]["name"], format!("Under_Score {}", suffix));
}

#[tokio::test]
#[ignore]
async fn test_huge_page_is_empty_not_an_error() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books?page={}&per_page=100", BASE_URL, i64::MAX))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
#[ignore]
async fn test_duplicate_borrow_and_unborrowed_return() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book_id = new_book(&client, &admin, 3).await;
    let reader = new_reader(&client).await;

    let (status, body) = post_loan_action(&client, &reader, book_id, "return_book").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "NotBorrowed");

    let (status, _) = post_loan_action(&client, &reader, book_id, "borrow").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_loan_action(&client, &reader, book_id, "borrow").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "AlreadyBorrowed");

    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to fetch book")
        .json()
        .await
        .expect("Failed to parse book");
    assert_eq!(book["quantity"], 2);
    assert_eq!(book["user_status"], "BORROWED");
}

#[tokio::test]
#[ignore]
async fn test_loan_limit() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let reader = new_reader(&client).await;

    for _ in 0..5 {
        let book_id = new_book(&client, &admin, 1).await;
        let (status, _) = post_loan_action(&client, &reader, book_id, "borrow").await;
        assert_eq!(status, StatusCode::OK);
    }

    let sixth = new_book(&client, &admin, 1).await;
    let (status, body) = post_loan_action(&client, &reader, sixth, "borrow").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "LimitReached");

    let borrowed: Value = client
        .get(format!("{}/books/my_borrowed_books", BASE_URL))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to list loans")
        .json()
        .await
        .expect("Failed to parse loans");
    assert_eq!(borrowed.as_array().map(Vec::len), Some(5));
}

#[tokio::test]
#[ignore]
async fn test_borrow_history_after_return() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book_id = new_book(&client, &admin, 1).await;
    let reader = new_reader(&client).await;

    post_loan_action(&client, &reader, book_id, "borrow").await;
    post_loan_action(&client, &reader, book_id, "return_book").await;

    let history: Value = client
        .get(format!("{}/books/borrow_history?page=1&per_page=10", BASE_URL))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to fetch history")
        .json()
        .await
        .expect("Failed to parse history");

    assert_eq!(history["total"], 1);
    assert_eq!(history["items"][0]["book"]["id"], book_id);
    assert!(history["items"][0]["return_date"].is_string());
}

#[tokio::test]
#[ignore]
async fn test_clear_loans_restores_stock() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book_id = new_book(&client, &admin, 2).await;
    let a = new_reader(&client).await;
    let b = new_reader(&client).await;

    post_loan_action(&client, &a, book_id, "borrow").await;
    post_loan_action(&client, &b, book_id, "borrow").await;

    let (status, body) = post_loan_action(&client, &admin, book_id, "clear_loans").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 2);
    assert_eq!(body["quantity"], 2);
}

#[tokio::test]
#[ignore]
async fn test_anonymous_viewer_sees_stock_status() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book_id = new_book(&client, &admin, 0).await;

    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to fetch book")
        .json()
        .await
        .expect("Failed to parse book");

    assert_eq!(book["user_status"], "NO_STOCK");
}
