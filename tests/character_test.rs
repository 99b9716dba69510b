mod common;

use serde_json::Value;

#[tokio::test]
async fn create_applies_defaults() {
    let app = common::spawn_app().await;
    let (_user_id, token) = common::create_verified_user(&app, "charuser").await;

    let resp = app
        .client
        .post(app.url("/characters"))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "name": "Lag Lord",
            "description": "Sorcerer of the central chaos server"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["tier"], "Unknown");
    assert_eq!(body["data"]["strength"], 50);
    assert_eq!(body["data"]["power_level"], 50);
    // No images yet: primary image falls back to the placeholder.
    assert!(body["data"]["image"].as_str().unwrap().contains("placehold"));
}

#[tokio::test]
async fn create_requires_auth() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .post(app.url("/characters"))
        .json(&serde_json::json!({ "name": "X", "description": "Y" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn power_level_is_rounded_mean_of_stats() {
    let app = common::spawn_app().await;
    let (_user_id, token) = common::create_verified_user(&app, "poweruser").await;

    let resp = app
        .client
        .post(app.url("/characters"))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "name": "Stat Block",
            "description": "Numbers person",
            "strength": 100,
            "speed_stat": 100,
            "durability_stat": 100,
            "intelligence": 100,
            "energy": 100,
            "combat": 1
        }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    // mean of (100*5 + 1)/6 = 83.5 -> 84
    assert_eq!(body["data"]["power_level"], 84);
}

#[tokio::test]
async fn detail_fetch_increments_views_every_time() {
    let app = common::spawn_app().await;
    let (_user_id, token) = common::create_verified_user(&app, "viewuser").await;
    let id = common::create_test_character(&app, &token, "Watched One", "City Level").await;

    for _ in 0..3 {
        let resp = app
            .client
            .get(app.url(&format!("/characters/{}", id)))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let resp = app
        .client
        .get(app.url(&format!("/characters/{}", id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["views"], 4);
}

#[tokio::test]
async fn like_toggle_is_an_involution() {
    let app = common::spawn_app().await;
    let (_user_id, token) = common::create_verified_user(&app, "likeuser").await;
    let id = common::create_test_character(&app, &token, "Liked One", "Street Level").await;

    let resp = app
        .client
        .post(app.url(&format!("/characters/{}/like", id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["likes"], 1);
    assert_eq!(body["data"]["liked"], true);

    let resp = app
        .client
        .post(app.url(&format!("/characters/{}/like", id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["likes"], 0);
    assert_eq!(body["data"]["liked"], false);
}

#[tokio::test]
async fn only_creator_can_update() {
    let app = common::spawn_app().await;
    let (_owner_id, owner_token) = common::create_verified_user(&app, "owner").await;
    let (_other_id, other_token) = common::create_verified_user(&app, "intruder").await;
    let id = common::create_test_character(&app, &owner_token, "Owned One", "City Level").await;

    let resp = app
        .client
        .put(app.url(&format!("/characters/{}", id)))
        .bearer_auth(&other_token)
        .json(&serde_json::json!({ "name": "Stolen" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .put(app.url(&format!("/characters/{}", id)))
        .bearer_auth(&owner_token)
        .json(&serde_json::json!({ "name": "Renamed", "tier": "Universal" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Renamed");
    assert_eq!(body["data"]["tier"], "Universal");
}

#[tokio::test]
async fn soft_deleted_character_reads_as_absent() {
    let app = common::spawn_app().await;
    let (user_id, token) = common::create_verified_user(&app, "deluser").await;
    let id = common::create_test_character(&app, &token, "Doomed One", "City Level").await;

    let resp = app
        .client
        .delete(app.url(&format!("/characters/{}", id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Gone from detail and list reads.
    let resp = app
        .client
        .get(app.url(&format!("/characters/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = app
        .client
        .get(app.url(&format!("/characters?creator_id={}", user_id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 0);

    // But the row itself survives for audit.
    use sea_orm::{ConnectionTrait, Statement};
    let row = app
        .db
        .query_one(Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT is_active FROM characters WHERE id = $1",
            vec![id.into()],
        ))
        .await
        .unwrap()
        .expect("row should still exist");
    let is_active: bool = row.try_get("", "is_active").unwrap();
    assert!(!is_active);
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let app = common::spawn_app().await;
    let (user_id, token) = common::create_verified_user(&app, "listuser").await;

    for i in 0..3 {
        common::create_test_character(&app, &token, &format!("Fighter {i}"), "City Level").await;
    }
    common::create_test_character(&app, &token, "Cosmic One", "Universal").await;

    let resp = app
        .client
        .get(app.url(&format!("/characters?tier=Universal&creator_id={}", user_id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["items"][0]["name"], "Cosmic One");

    let resp = app
        .client
        .get(app.url(&format!("/characters?page=1&limit=2&creator_id={}", user_id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["total"], 4);
    assert_eq!(body["data"]["total_pages"], 2);

    let resp = app
        .client
        .get(app.url(&format!("/characters/creator/{}", user_id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn absolute_image_urls_are_stored_relative() {
    let app = common::spawn_app().await;
    let (_user_id, token) = common::create_verified_user(&app, "imguser").await;

    let resp = app
        .client
        .post(app.url("/characters"))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "name": "Portable One",
            "description": "Travels between hosts",
            "images": [{ "url": "https://my-tunnel.example.com/uploads/hero.png", "label": "Base" }]
        }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["images"][0]["url"], "/uploads/hero.png");
    assert_eq!(body["data"]["image"], "/uploads/hero.png");
}
