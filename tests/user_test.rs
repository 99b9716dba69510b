mod common;

use serde_json::Value;

#[tokio::test]
async fn public_profile_hides_private_fields() {
    let app = common::spawn_app().await;
    let (user_id, _token) = common::create_verified_user(&app, "profileuser").await;

    let resp = app
        .client
        .get(app.url(&format!("/users/profile/{}", user_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"]["username"].as_str().is_some());
    assert!(body["data"]["email"].is_null());
    assert!(body["data"]["password_hash"].is_null());
}

#[tokio::test]
async fn missing_profile_is_not_found() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .get(app.url("/users/profile/999999"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn search_matches_username_fragment() {
    let app = common::spawn_app().await;
    let (_id1, _t1) = common::create_verified_user(&app, "searchable_knight").await;
    let (_id2, _t2) = common::create_verified_user(&app, "searchable_mage").await;
    let (_id3, _t3) = common::create_verified_user(&app, "unrelated").await;

    let resp = app
        .client
        .get(app.url("/users/search?q=searchable"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let resp = app
        .client
        .get(app.url("/users/search?q="))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn update_me_changes_profile_and_normalizes_avatar() {
    let app = common::spawn_app().await;
    let (_user_id, token) = common::create_verified_user(&app, "updater").await;

    let resp = app
        .client
        .put(app.url("/users/me"))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "username": "renamed_updater",
            "avatar_url": "https://cdn.example.com/avatars/me.png"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["username"], "renamed_updater");
    assert_eq!(body["data"]["avatar_url"], "/avatars/me.png");
}

#[tokio::test]
async fn update_me_rejects_taken_username() {
    let app = common::spawn_app().await;
    let (_id1, _t1) = common::create_verified_user(&app, "holder").await;
    let (_id2, token2) = common::create_verified_user(&app, "wanter").await;

    // The helper suffixes usernames with a counter, so read the actual name.
    let resp = app
        .client
        .get(app.url("/users/search?q=holder"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let taken = body["data"][0]["username"].as_str().unwrap().to_string();

    let resp = app
        .client
        .put(app.url("/users/me"))
        .bearer_auth(&token2)
        .json(&serde_json::json!({ "username": taken }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}
