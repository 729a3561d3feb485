// tests/rating_messaging_tests.rs

mod common;

use common::{message_of, spawn_app};
use reqwest::StatusCode;
use serde_json::{Value, json};

fn rating_path(order_id: i64) -> String {
    format!("/api/orders/{}/rating", order_id)
}

#[tokio::test]
async fn rating_requires_a_completed_order() {
    let Some(app) = spawn_app().await else { return };
    let (buyer, _, _, order_id) = app.order_fixture(50.0).await;

    let response = app
        .post(&rating_path(order_id), Some(&buyer.token), json!({ "score": 5 }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(message_of(response).await.contains("completed"));
}

#[tokio::test]
async fn only_the_buyer_can_rate() {
    let Some(app) = spawn_app().await else { return };
    let (_, seller, _, order_id) = app.order_fixture(50.0).await;
    let stranger = app.register("client").await;
    app.complete(&seller, order_id).await;

    for user in [&seller, &stranger] {
        let response = app
            .post(&rating_path(order_id), Some(&user.token), json!({ "score": 5 }))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    let response = app
        .post(&rating_path(i64::MAX), Some(&seller.token), json!({ "score": 5 }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scores_outside_one_to_five_are_rejected() {
    let Some(app) = spawn_app().await else { return };
    let (buyer, seller, _, order_id) = app.order_fixture(50.0).await;
    app.complete(&seller, order_id).await;

    for score in [json!(0), json!(6), json!(4.5), json!(-1)] {
        let response = app
            .post(&rating_path(order_id), Some(&buyer.token), json!({ "score": score }))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "score {}", score);
    }

    // None of the rejected attempts consumed the single rating.
    let response = app
        .post(&rating_path(order_id), Some(&buyer.token), json!({ "score": 4 }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn an_order_is_rated_once() {
    let Some(app) = spawn_app().await else { return };
    let (buyer, seller, _, order_id) = app.order_fixture(50.0).await;
    app.complete(&seller, order_id).await;

    let response = app
        .post(
            &rating_path(order_id),
            Some(&buyer.token),
            json!({ "score": 4, "review": "Quick turnaround" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let order: Value = response.json().await.unwrap();
    assert_eq!(order["rating"]["score"].as_i64(), Some(4));
    assert_eq!(order["rating"]["review"], "Quick turnaround");
    assert!(order["rating"]["reviewedAt"].is_string());

    let response = app
        .post(&rating_path(order_id), Some(&buyer.token), json!({ "score": 1 }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let order: Value = app
        .get(&format!("/api/orders/{}", order_id), Some(&buyer.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(order["rating"]["score"].as_i64(), Some(4));
}

#[tokio::test]
async fn ratings_fold_into_seller_and_listing_averages() {
    let Some(app) = spawn_app().await else { return };
    let seller = app.register("freelancer").await;
    let buyer = app.register("client").await;
    let service_id = app.create_service(&seller, 30.0, "2 days").await;

    for score in [5, 2] {
        let order_id = app.create_order(&buyer, service_id).await["id"].as_i64().unwrap();
        app.complete(&seller, order_id).await;
        let response = app
            .post(&rating_path(order_id), Some(&buyer.token), json!({ "score": score }))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let profile: Value = app
        .get(&format!("/api/users/{}", seller.id), None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(profile["profile"]["reviewCount"].as_i64(), Some(2));
    assert!((profile["profile"]["rating"].as_f64().unwrap() - 3.5).abs() < 1e-9);

    let service: Value = app
        .get(&format!("/api/services/{}", service_id), None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(service["reviewCount"].as_i64(), Some(2));
    assert!((service["rating"].as_f64().unwrap() - 3.5).abs() < 1e-9);
}

#[tokio::test]
async fn concurrent_messages_are_all_kept_in_order() {
    let Some(app) = spawn_app().await else { return };
    let (buyer, seller, _, order_id) = app.order_fixture(50.0).await;
    let url = app.url(&format!("/api/orders/{}/messages", order_id));

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..10 {
        let client = app.client.clone();
        let url = url.clone();
        let token = if i % 2 == 0 { buyer.token.clone() } else { seller.token.clone() };
        tasks.spawn(async move {
            client
                .post(url)
                .bearer_auth(token)
                .json(&json!({ "message": format!("message {}", i) }))
                .send()
                .await
                .unwrap()
                .status()
        });
    }
    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::CREATED);
    }

    let order: Value = app
        .get(&format!("/api/orders/{}", order_id), Some(&seller.token))
        .await
        .json()
        .await
        .unwrap();
    let messages = order["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 10);

    let ids: Vec<i64> = messages.iter().map(|m| m["id"].as_i64().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    for i in 0..10 {
        let text = format!("message {}", i);
        assert!(messages.iter().any(|m| m["text"] == text.as_str()));
    }
}

#[tokio::test]
async fn messages_are_sanitized_and_party_only() {
    let Some(app) = spawn_app().await else { return };
    let (buyer, _, _, order_id) = app.order_fixture(50.0).await;
    let stranger = app.register("freelancer").await;
    let path = format!("/api/orders/{}/messages", order_id);

    let response = app
        .post(&path, Some(&buyer.token), json!({ "message": "<script>alert(1)</script>hello" }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let message: Value = response.json().await.unwrap();
    assert_eq!(message["text"], "hello");
    assert_eq!(message["sender"]["id"].as_i64(), Some(buyer.id));

    // Nothing left after cleaning.
    let response = app
        .post(&path, Some(&buyer.token), json!({ "text": "<script>alert(1)</script>" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post(&path, Some(&stranger.token), json!({ "message": "hi" }))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn concurrent_ratings_land_once() {
    let Some(app) = spawn_app().await else { return };
    let (buyer, seller, service_id, order_id) = app.order_fixture(50.0).await;
    app.complete(&seller, order_id).await;
    let path = rating_path(order_id);

    let (first, second) = tokio::join!(
        app.post(&path, Some(&buyer.token), json!({ "score": 5 })),
        app.post(&path, Some(&buyer.token), json!({ "score": 1 })),
    );

    let mut statuses = [first.status().as_u16(), second.status().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [200, 409]);

    let seller_reviews: i32 = sqlx::query_scalar("SELECT review_count FROM users WHERE id = $1")
        .bind(seller.id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    let service_reviews: i32 = sqlx::query_scalar("SELECT review_count FROM services WHERE id = $1")
        .bind(service_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!((seller_reviews, service_reviews), (1, 1));
}

#[tokio::test]
async fn caller_checks_precede_score_checks() {
    let Some(app) = spawn_app().await else { return };
    let (buyer, seller, _, order_id) = app.order_fixture(50.0).await;
    let stranger = app.register("client").await;
    app.complete(&seller, order_id).await;
    let path = rating_path(order_id);

    let response = app
        .post(&path, Some(&stranger.token), json!({ "score": "5" }))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post(&path, Some(&buyer.token), json!({ "score": "5" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.post(&path, Some(&buyer.token), json!({ "review": "no score" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
