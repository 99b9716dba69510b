mod common;

use serde_json::Value;

async fn start_conversation(
    app: &common::TestApp,
    token: &str,
    participant_id: i32,
) -> Value {
    let resp = app
        .client
        .post(app.url("/conversations"))
        .bearer_auth(token)
        .json(&serde_json::json!({ "participant_id": participant_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

async fn send_message(
    app: &common::TestApp,
    token: &str,
    conversation_id: i32,
    content: &str,
) -> Value {
    let resp = app
        .client
        .post(app.url(&format!("/conversations/{}/messages", conversation_id)))
        .bearer_auth(token)
        .json(&serde_json::json!({ "content": content }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn lookup_or_create_reuses_the_pair_conversation() {
    let app = common::spawn_app().await;
    let (_a_id, a_token) = common::create_verified_user(&app, "alice").await;
    let (b_id, b_token) = common::create_verified_user(&app, "bob").await;

    let first = start_conversation(&app, &a_token, b_id).await;
    let first_id = first["data"]["id"].as_i64().unwrap();

    // Same pair again, from either side: same conversation, never a second row.
    let second = start_conversation(&app, &a_token, b_id).await;
    assert_eq!(second["data"]["id"].as_i64().unwrap(), first_id);

    let a_id = first["data"]["participants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .find(|id| *id != b_id as i64)
        .unwrap();
    let from_b = start_conversation(&app, &b_token, a_id as i32).await;
    assert_eq!(from_b["data"]["id"].as_i64().unwrap(), first_id);

    assert_eq!(
        first["data"]["participants"].as_array().unwrap().len(),
        2
    );
}

#[tokio::test]
async fn self_conversation_is_rejected() {
    let app = common::spawn_app().await;
    let (a_id, a_token) = common::create_verified_user(&app, "loner").await;

    let resp = app
        .client
        .post(app.url("/conversations"))
        .bearer_auth(&a_token)
        .json(&serde_json::json!({ "participant_id": a_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn character_context_is_attached() {
    let app = common::spawn_app().await;
    let (_a_id, a_token) = common::create_verified_user(&app, "fan").await;
    let (b_id, _b_token) = common::create_verified_user(&app, "creator").await;
    let character_id =
        common::create_test_character(&app, &a_token, "Context One", "City Level").await;

    let resp = app
        .client
        .post(app.url("/conversations"))
        .bearer_auth(&a_token)
        .json(&serde_json::json!({
            "participant_id": b_id,
            "character_id": character_id
        }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["data"]["character"]["id"].as_i64().unwrap() as i32,
        character_id
    );
    assert_eq!(body["data"]["character"]["name"], "Context One");
}

#[tokio::test]
async fn messages_flow_and_unread_tracking() {
    let app = common::spawn_app().await;
    let (_a_id, a_token) = common::create_verified_user(&app, "sender").await;
    let (b_id, b_token) = common::create_verified_user(&app, "receiver").await;

    let conv = start_conversation(&app, &a_token, b_id).await;
    let conv_id = conv["data"]["id"].as_i64().unwrap() as i32;

    send_message(&app, &a_token, conv_id, "first").await;
    send_message(&app, &a_token, conv_id, "second").await;

    // Receiver sees two unread; sender sees none.
    let resp = app
        .client
        .get(app.url("/conversations/unread-count"))
        .bearer_auth(&b_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["unread"], 2);

    let resp = app
        .client
        .get(app.url("/conversations/unread-count"))
        .bearer_auth(&a_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["unread"], 0);

    // Conversation list carries the denormalized last message + unread.
    let resp = app
        .client
        .get(app.url("/conversations"))
        .bearer_auth(&b_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["last_message"]["content"], "second");
    assert_eq!(list[0]["unread_count"], 2);

    // Messages list oldest-first.
    let resp = app
        .client
        .get(app.url(&format!("/conversations/{}/messages", conv_id)))
        .bearer_auth(&b_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["content"], "first");
    assert_eq!(items[1]["content"], "second");

    // Bulk mark-read flips both; badge drops to zero.
    let resp = app
        .client
        .put(app.url(&format!("/conversations/{}/messages/read", conv_id)))
        .bearer_auth(&b_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["marked"], 2);

    let resp = app
        .client
        .get(app.url("/conversations/unread-count"))
        .bearer_auth(&b_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["unread"], 0);
}

#[tokio::test]
async fn non_participant_is_forbidden() {
    let app = common::spawn_app().await;
    let (_a_id, a_token) = common::create_verified_user(&app, "insider_a").await;
    let (b_id, _b_token) = common::create_verified_user(&app, "insider_b").await;
    let (_c_id, c_token) = common::create_verified_user(&app, "outsider").await;

    let conv = start_conversation(&app, &a_token, b_id).await;
    let conv_id = conv["data"]["id"].as_i64().unwrap() as i32;

    let resp = app
        .client
        .get(app.url(&format!("/conversations/{}", conv_id)))
        .bearer_auth(&c_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .post(app.url(&format!("/conversations/{}/messages", conv_id)))
        .bearer_auth(&c_token)
        .json(&serde_json::json!({ "content": "let me in" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn delete_is_hard_and_cascades_messages() {
    let app = common::spawn_app().await;
    let (_a_id, a_token) = common::create_verified_user(&app, "deleter").await;
    let (b_id, b_token) = common::create_verified_user(&app, "bystander").await;

    let conv = start_conversation(&app, &a_token, b_id).await;
    let conv_id = conv["data"]["id"].as_i64().unwrap() as i32;
    send_message(&app, &a_token, conv_id, "soon gone").await;

    // Any participant may delete.
    let resp = app
        .client
        .delete(app.url(&format!("/conversations/{}", conv_id)))
        .bearer_auth(&b_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .client
        .get(app.url(&format!("/conversations/{}", conv_id)))
        .bearer_auth(&a_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Rows are really gone, unlike the soft-deleted wiki content.
    use sea_orm::{ConnectionTrait, Statement};
    let row = app
        .db
        .query_one(Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT COUNT(*) AS remaining FROM messages WHERE conversation_id = $1",
            vec![conv_id.into()],
        ))
        .await
        .unwrap()
        .unwrap();
    let remaining: i64 = row.try_get("", "remaining").unwrap();
    assert_eq!(remaining, 0);
}
