mod common;

use axum::http::StatusCode;
use common::*;

fn slugs(response: &TestResponse) -> Vec<String> {
    response.json()["data"]["workshops"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["slug"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let mut app = TestApp::new();
    let response = app.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["data"]["status"], "ok");
}

#[tokio::test]
async fn test_catalog_lists_public_workshops_only() {
    let mut app = TestApp::new();
    app.store
        .create_workshop(new_workshop("intro-2024"))
        .await
        .unwrap();
    let mut draft = new_workshop("draft-2024");
    draft.draft = true;
    app.store.create_workshop(draft).await.unwrap();
    let mut unlisted = new_workshop("unlisted-2024");
    unlisted.public = false;
    app.store.create_workshop(unlisted).await.unwrap();

    let response = app.get("/").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(slugs(&response), ["intro-2024"]);
    assert_eq!(response.json()["data"]["private"], false);
    // Access codes never leave the server.
    assert!(response.json()["data"]["workshops"][0]
        .get("private_code")
        .is_none());
}

#[tokio::test]
async fn test_access_code_unlocks_private_workshops() {
    let mut app = TestApp::new();
    app.store
        .create_workshop(new_workshop("intro-2024"))
        .await
        .unwrap();
    let mut unlisted = new_workshop("lab-2024");
    unlisted.public = false;
    unlisted.private_code = Some("lab-access".to_string());
    app.store.create_workshop(unlisted).await.unwrap();
    let mut hidden_draft = new_workshop("lab-draft");
    hidden_draft.public = false;
    hidden_draft.draft = true;
    hidden_draft.private_code = Some("lab-access".to_string());
    app.store.create_workshop(hidden_draft).await.unwrap();

    let response = app.get("/?code=lab-access").await;

    assert_eq!(slugs(&response), ["lab-2024"]);
    assert_eq!(response.json()["data"]["private"], true);
}

#[tokio::test]
async fn test_unknown_access_code_falls_back_to_public_list() {
    let mut app = TestApp::new();
    app.store
        .create_workshop(new_workshop("intro-2024"))
        .await
        .unwrap();

    let response = app.get("/?code=nope").await;

    assert_eq!(slugs(&response), ["intro-2024"]);
    assert_eq!(response.json()["data"]["private"], false);
}

#[tokio::test]
async fn test_access_code_makes_private_workshop_purchasable() {
    let mut app = TestApp::new();
    let mut unlisted = new_workshop("lab-2024");
    unlisted.public = false;
    unlisted.private_code = Some("lab-access".to_string());
    app.store.create_workshop(unlisted).await.unwrap();

    let before = app.get("/lab-2024/").await;
    assert_eq!(before.json()["data"]["purchasable"], false);

    app.get("/?code=lab-access").await;
    let after = app.get("/lab-2024/").await;
    assert_eq!(after.json()["data"]["purchasable"], true);
}
