mod common;

use serde_json::Value;

struct Arena {
    app: common::TestApp,
    token: String,
    char1: i32,
    char2: i32,
    battle_id: i32,
}

/// Creator + a City Level vs Universal battle (probabilities 10/90).
async fn setup_battle() -> Arena {
    let app = common::spawn_app().await;
    let (_user_id, token) = common::create_verified_user(&app, "battler").await;
    let char1 = common::create_test_character(&app, &token, "City Hero", "City Level").await;
    let char2 = common::create_test_character(&app, &token, "Cosmic Entity", "Universal").await;

    let resp = app
        .client
        .post(app.url("/battles"))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "character1_id": char1, "character2_id": char2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let battle_id = body["data"]["id"].as_i64().unwrap() as i32;

    Arena {
        app,
        token,
        char1,
        char2,
        battle_id,
    }
}

async fn vote(arena: &Arena, token: &str, character_id: i32) -> reqwest::Response {
    arena
        .app
        .client
        .post(arena.app.url(&format!("/battles/{}/vote", arena.battle_id)))
        .bearer_auth(token)
        .json(&serde_json::json!({ "voted_character_id": character_id }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn higher_tier_gets_ninety_percent_probability() {
    let arena = setup_battle().await;

    let resp = arena
        .app
        .client
        .get(arena.app.url(&format!("/battles/{}", arena.battle_id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["win_probability_char1"], 10);
    assert_eq!(body["data"]["win_probability_char2"], 90);

    let winner = body["data"]["simulation_winner_id"].as_i64().unwrap() as i32;
    assert!(winner == arena.char1 || winner == arena.char2);
}

#[tokio::test]
async fn equal_tiers_split_fifty_fifty() {
    let app = common::spawn_app().await;
    let (_user_id, token) = common::create_verified_user(&app, "equal").await;
    let char1 = common::create_test_character(&app, &token, "Twin A", "Planet Level").await;
    let char2 = common::create_test_character(&app, &token, "Twin B", "Planet Level").await;

    let resp = app
        .client
        .post(app.url("/battles"))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "character1_id": char1, "character2_id": char2 }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["win_probability_char1"], 50);
    assert_eq!(body["data"]["win_probability_char2"], 50);
}

#[tokio::test]
async fn outcome_is_frozen_after_tier_edit() {
    let arena = setup_battle().await;

    // Buff the weaker character to the top tier...
    let resp = arena
        .app
        .client
        .put(arena.app.url(&format!("/characters/{}", arena.char1)))
        .bearer_auth(&arena.token)
        .json(&serde_json::json!({ "tier": "Omnipotent" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // ...the persisted probabilities do not move.
    let resp = arena
        .app
        .client
        .get(arena.app.url(&format!("/battles/{}", arena.battle_id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["win_probability_char1"], 10);
    assert_eq!(body["data"]["win_probability_char2"], 90);
}

#[tokio::test]
async fn self_battle_is_rejected() {
    let app = common::spawn_app().await;
    let (_user_id, token) = common::create_verified_user(&app, "selfbattle").await;
    let char1 = common::create_test_character(&app, &token, "Lonely One", "City Level").await;

    let resp = app
        .client
        .post(app.url("/battles"))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "character1_id": char1, "character2_id": char1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn missing_character_is_not_found() {
    let app = common::spawn_app().await;
    let (_user_id, token) = common::create_verified_user(&app, "ghostbattle").await;
    let char1 = common::create_test_character(&app, &token, "Real One", "City Level").await;

    let resp = app
        .client
        .post(app.url("/battles"))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "character1_id": char1, "character2_id": 999999 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn two_voters_on_opposite_sides() {
    let arena = setup_battle().await;
    let (_id2, token2) = common::create_verified_user(&arena.app, "voter2").await;

    let resp = vote(&arena, &arena.token, arena.char1).await;
    assert_eq!(resp.status(), 200);
    let resp = vote(&arena, &token2, arena.char2).await;
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["votes_char1"], 1);
    assert_eq!(body["data"]["votes_char2"], 1);
    assert_eq!(body["data"]["total_votes"], 2);
}

#[tokio::test]
async fn resubmitting_the_same_vote_is_a_noop() {
    let arena = setup_battle().await;

    let resp = vote(&arena, &arena.token, arena.char1).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total_votes"], 1);

    let resp = vote(&arena, &arena.token, arena.char1).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["votes_char1"], 1);
    assert_eq!(body["data"]["votes_char2"], 0);
    assert_eq!(body["data"]["total_votes"], 1);
}

#[tokio::test]
async fn switching_sides_moves_one_vote() {
    let arena = setup_battle().await;

    let _ = vote(&arena, &arena.token, arena.char1).await;
    let resp = vote(&arena, &arena.token, arena.char2).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["votes_char1"], 0);
    assert_eq!(body["data"]["votes_char2"], 1);
    assert_eq!(body["data"]["total_votes"], 1);

    // Exactly one vote row for the pair.
    use sea_orm::{ConnectionTrait, Statement};
    let row = arena
        .app
        .db
        .query_one(Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT COUNT(*) AS votes FROM battle_votes WHERE battle_id = $1",
            vec![arena.battle_id.into()],
        ))
        .await
        .unwrap()
        .unwrap();
    let votes: i64 = row.try_get("", "votes").unwrap();
    assert_eq!(votes, 1);
}

#[tokio::test]
async fn vote_target_must_belong_to_battle() {
    let arena = setup_battle().await;
    let outsider =
        common::create_test_character(&arena.app, &arena.token, "Outsider", "Street Level").await;

    let resp = vote(&arena, &arena.token, outsider).await;
    assert_eq!(resp.status(), 400);

    // Tallies untouched.
    let resp = arena
        .app
        .client
        .get(arena.app.url(&format!("/battles/{}", arena.battle_id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total_votes"], 0);
}

#[tokio::test]
async fn my_vote_returns_current_choice_or_null() {
    let arena = setup_battle().await;

    let resp = arena
        .app
        .client
        .get(arena.app.url(&format!("/battles/{}/my-vote", arena.battle_id)))
        .bearer_auth(&arena.token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"].is_null());

    let _ = vote(&arena, &arena.token, arena.char2).await;

    let resp = arena
        .app
        .client
        .get(arena.app.url(&format!("/battles/{}/my-vote", arena.battle_id)))
        .bearer_auth(&arena.token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["voted_character_id"].as_i64().unwrap() as i32, arena.char2);
}

#[tokio::test]
async fn only_creator_deletes_battle_and_soft_delete_hides_it() {
    let arena = setup_battle().await;
    let (_id2, token2) = common::create_verified_user(&arena.app, "notcreator").await;

    let resp = arena
        .app
        .client
        .delete(arena.app.url(&format!("/battles/{}", arena.battle_id)))
        .bearer_auth(&token2)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = arena
        .app
        .client
        .delete(arena.app.url(&format!("/battles/{}", arena.battle_id)))
        .bearer_auth(&arena.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = arena
        .app
        .client
        .get(arena.app.url(&format!("/battles/{}", arena.battle_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Voting on an inactive battle is NotFound too.
    let resp = vote(&arena, &arena.token, arena.char1).await;
    assert_eq!(resp.status(), 404);
}
