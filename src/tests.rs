use crate::test_utils::{
    bearer, create_category, create_goal, get_as, post_as, register_and_login,
    setup_test_server,
};
use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::str::FromStr;

fn dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("Expected a decimal, got {}", other),
    }
}

fn d(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

#[tokio::test]
async fn test_health_check() {
    let server = setup_test_server().await;

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_prometheus_metrics_endpoint_disabled_in_tests() {
    let server = setup_test_server().await;
    server.get("/metrics").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_login_and_me() {
    let server = setup_test_server().await;
    let alice = register_and_login(&server, "alice").await;

    let me = get_as(&server, &alice, "/api/v1/users/me").await;
    assert_eq!(me["id"].as_i64(), Some(alice.id));
    assert_eq!(me["username"], "alice");
    assert_eq!(me["email"], "alice@example.com");
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_bad_input() {
    let server = setup_test_server().await;
    register_and_login(&server, "alice").await;

    let response = server
        .post("/api/v1/register")
        .json(&json!({ "username": "alice", "email": "other@example.com", "password": "secret123" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "ALREADY_EXISTS");

    let response = server
        .post("/api/v1/register")
        .json(&json!({ "username": "bob", "email": "alice@example.com", "password": "secret123" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/register")
        .json(&json!({ "username": "carol", "email": "not-an-email", "password": "secret123" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let server = setup_test_server().await;
    register_and_login(&server, "alice").await;

    let response = server
        .post("/api/v1/login")
        .json(&json!({ "username": "alice", "password": "wrong-password" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/v1/login")
        .json(&json!({ "username": "nobody", "password": "wrong-password" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let server = setup_test_server().await;

    server
        .get("/api/v1/users/me")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (name, value) = bearer("not-a-jwt");
    server
        .get("/api/v1/transactions")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let server = setup_test_server().await;
    let alice = register_and_login(&server, "alice").await;
    let bob = register_and_login(&server, "bob").await;

    let (name, value) = bearer(&alice.token);
    server
        .put(&format!("/api/v1/users/{}/change-password", bob.id))
        .add_header(name.clone(), value.clone())
        .json(&json!({ "new_password": "new-secret" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .put("/api/v1/users/9999/change-password")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "new_password": "new-secret" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .put(&format!("/api/v1/users/{}/change-password", alice.id))
        .add_header(name, value)
        .json(&json!({ "new_password": "new-secret" }))
        .await
        .assert_status_ok();

    server
        .post("/api/v1/login")
        .json(&json!({ "username": "alice", "password": "new-secret" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_category_crud() {
    let server = setup_test_server().await;
    let alice = register_and_login(&server, "alice").await;

    let salary = post_as(
        &server,
        &alice,
        "/api/v1/categories",
        json!({ "name": "Salary", "is_income": true }),
    )
    .await;
    assert_eq!(salary["is_income"], true);
    let food = create_category(&server, &alice, "Food").await;

    let all = get_as(&server, &alice, "/api/v1/categories").await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let fetched = get_as(&server, &alice, &format!("/api/v1/categories/{}", food)).await;
    assert_eq!(fetched["name"], "Food");
    assert_eq!(fetched["is_income"], false);

    let (name, value) = bearer(&alice.token);
    server
        .get("/api/v1/categories/999")
        .add_header(name.clone(), value.clone())
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .delete(&format!("/api/v1/categories/{}", food))
        .add_header(name, value)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_category_in_use_cannot_be_deleted() {
    let server = setup_test_server().await;
    let alice = register_and_login(&server, "alice").await;
    let food = create_category(&server, &alice, "Food").await;

    post_as(
        &server,
        &alice,
        "/api/v1/transactions",
        json!({ "category_id": food, "amount": "12.50", "type": "expense" }),
    )
    .await;

    let (name, value) = bearer(&alice.token);
    let response = server
        .delete(&format!("/api/v1/categories/{}", food))
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_goal_lifecycle_and_ownership() {
    let server = setup_test_server().await;
    let alice = register_and_login(&server, "alice").await;
    let bob = register_and_login(&server, "bob").await;

    let goal = post_as(
        &server,
        &alice,
        "/api/v1/goals",
        json!({ "title": "Bike", "target_amount": "800", "due_date": "2026-06-30", "current_amount": "500" }),
    )
    .await;
    assert_eq!(dec(&goal["current_amount"]), Decimal::ZERO);
    assert_eq!(goal["user_id"].as_i64(), Some(alice.id));
    let goal_id = goal["id"].as_i64().unwrap();

    assert_eq!(get_as(&server, &alice, "/api/v1/goals").await.as_array().unwrap().len(), 1);
    assert!(get_as(&server, &bob, "/api/v1/goals").await.as_array().unwrap().is_empty());

    let (bob_name, bob_value) = bearer(&bob.token);
    server
        .get(&format!("/api/v1/goals/{}", goal_id))
        .add_header(bob_name.clone(), bob_value.clone())
        .await
        .assert_status(StatusCode::FORBIDDEN);
    server
        .delete(&format!("/api/v1/goals/{}", goal_id))
        .add_header(bob_name, bob_value)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let (name, value) = bearer(&alice.token);
    let response = server
        .put(&format!("/api/v1/goals/{}", goal_id))
        .add_header(name.clone(), value.clone())
        .json(&json!({ "title": "Road bike", "target_amount": "1200" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["title"], "Road bike");
    assert_eq!(dec(&body["data"]["target_amount"]), d(1200));

    server
        .put(&format!("/api/v1/goals/{}", goal_id))
        .add_header(name.clone(), value.clone())
        .json(&json!({ "target_amount": "-1" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .delete(&format!("/api/v1/goals/{}", goal_id))
        .add_header(name.clone(), value.clone())
        .await
        .assert_status_ok();
    server
        .get(&format!("/api/v1/goals/{}", goal_id))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_transaction_keeps_goal_amount_in_sync() {
    let server = setup_test_server().await;
    let alice = register_and_login(&server, "alice").await;
    let savings = create_category(&server, &alice, "Savings").await;
    let goal = create_goal(&server, &alice, "Holiday").await;
    let goal_path = format!("/api/v1/goals/{}", goal);

    let tx = post_as(
        &server,
        &alice,
        "/api/v1/transactions",
        json!({
            "category_id": savings,
            "amount": "50",
            "type": "income",
            "linked_object_id": goal,
            "linked_object_type": "goal",
        }),
    )
    .await;
    assert_eq!(tx["linked_object_type"], "goal");
    assert_eq!(dec(&get_as(&server, &alice, &goal_path).await["current_amount"]), d(50));

    let tx_path = format!("/api/v1/transactions/{}", tx["id"].as_i64().unwrap());
    let (name, value) = bearer(&alice.token);
    let response = server
        .patch(&tx_path)
        .add_header(name.clone(), value.clone())
        .json(&json!({ "amount": "30" }))
        .await;
    response.assert_status_ok();
    assert_eq!(dec(&get_as(&server, &alice, &goal_path).await["current_amount"]), d(30));

    let details = get_as(&server, &alice, &format!("{}/details", goal_path)).await;
    assert_eq!(details["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(dec(&details["goal"]["current_amount"]), d(30));

    server
        .delete(&tx_path)
        .add_header(name, value)
        .await
        .assert_status_ok();
    assert_eq!(dec(&get_as(&server, &alice, &goal_path).await["current_amount"]), Decimal::ZERO);
}

#[tokio::test]
async fn test_relink_from_goal_to_budget() {
    let server = setup_test_server().await;
    let alice = register_and_login(&server, "alice").await;
    let food = create_category(&server, &alice, "Food").await;
    let goal = create_goal(&server, &alice, "Holiday").await;
    let budget = post_as(
        &server,
        &alice,
        "/api/v1/budgets",
        json!({ "month": "2025-03-15", "categories": [food] }),
    )
    .await;
    let budget_id = budget["id"].as_i64().unwrap();

    let tx = post_as(
        &server,
        &alice,
        "/api/v1/transactions",
        json!({
            "category_id": food,
            "amount": "40",
            "type": "expense",
            "occurred_at": "2025-03-10T12:00:00Z",
            "linked_object_id": goal,
            "linked_object_type": "goal",
        }),
    )
    .await;
    let goal_path = format!("/api/v1/goals/{}", goal);
    let budget_path = format!("/api/v1/budgets/{}", budget_id);
    assert_eq!(dec(&get_as(&server, &alice, &goal_path).await["current_amount"]), d(-40));

    let (name, value) = bearer(&alice.token);
    server
        .patch(&format!("/api/v1/transactions/{}", tx["id"].as_i64().unwrap()))
        .add_header(name, value)
        .json(&json!({ "linked_object_id": budget_id, "linked_object_type": "budget" }))
        .await
        .assert_status_ok();

    assert_eq!(dec(&get_as(&server, &alice, &goal_path).await["current_amount"]), Decimal::ZERO);
    let budget = get_as(&server, &alice, &budget_path).await;
    assert_eq!(dec(&budget["current_amount"]), d(40));
    assert_eq!(dec(&budget["categories"][0]["current_amount"]), d(40));
}

#[tokio::test]
async fn test_transaction_link_errors() {
    let server = setup_test_server().await;
    let alice = register_and_login(&server, "alice").await;
    let bob = register_and_login(&server, "bob").await;
    let food = create_category(&server, &alice, "Food").await;
    let bobs_goal = create_goal(&server, &bob, "Car").await;
    let (name, value) = bearer(&alice.token);

    // Half link
    let response = server
        .post("/api/v1/transactions")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "category_id": food, "amount": "5", "type": "income", "linked_object_id": 1 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // Missing target
    server
        .post("/api/v1/transactions")
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "category_id": food, "amount": "5", "type": "income",
            "linked_object_id": 999, "linked_object_type": "goal",
        }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Someone else's goal
    server
        .post("/api/v1/transactions")
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "category_id": food, "amount": "5", "type": "income",
            "linked_object_id": bobs_goal, "linked_object_type": "goal",
        }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // Non-positive amount
    server
        .post("/api/v1/transactions")
        .add_header(name, value)
        .json(&json!({ "category_id": food, "amount": "0", "type": "income" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert!(get_as(&server, &alice, "/api/v1/transactions").await.as_array().unwrap().is_empty());
    let goal = get_as(&server, &bob, &format!("/api/v1/goals/{}", bobs_goal)).await;
    assert_eq!(dec(&goal["current_amount"]), Decimal::ZERO);
}

#[tokio::test]
async fn test_transactions_are_private() {
    let server = setup_test_server().await;
    let alice = register_and_login(&server, "alice").await;
    let bob = register_and_login(&server, "bob").await;
    let food = create_category(&server, &alice, "Food").await;

    let tx = post_as(
        &server,
        &alice,
        "/api/v1/transactions",
        json!({ "category_id": food, "amount": "9.99", "type": "expense", "description": "Lunch" }),
    )
    .await;
    let tx_path = format!("/api/v1/transactions/{}", tx["id"].as_i64().unwrap());

    assert!(get_as(&server, &bob, "/api/v1/transactions").await.as_array().unwrap().is_empty());

    let (name, value) = bearer(&bob.token);
    server
        .get(&tx_path)
        .add_header(name.clone(), value.clone())
        .await
        .assert_status(StatusCode::FORBIDDEN);
    server
        .patch(&tx_path)
        .add_header(name.clone(), value.clone())
        .json(&json!({ "amount": "1" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    server
        .delete(&tx_path)
        .add_header(name, value)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let (name, value) = bearer(&alice.token);
    server
        .patch(&tx_path)
        .add_header(name, value)
        .json(&json!({ "description": "x".repeat(256) }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let fetched = get_as(&server, &alice, &tx_path).await;
    assert_eq!(dec(&fetched["amount"]), Decimal::from_str("9.99").unwrap());
    assert_eq!(fetched["description"], "Lunch");
}

#[tokio::test]
async fn test_budget_overview_and_details() {
    let server = setup_test_server().await;
    let alice = register_and_login(&server, "alice").await;
    let food = create_category(&server, &alice, "Food").await;
    let rent = create_category(&server, &alice, "Rent").await;

    let budget = post_as(
        &server,
        &alice,
        "/api/v1/budgets",
        json!({ "month": "2025-03-15", "categories": [food, rent] }),
    )
    .await;
    assert_eq!(budget["month"], "2025-03-01");
    assert_eq!(budget["categories"].as_array().unwrap().len(), 2);
    let budget_id = budget["id"].as_i64().unwrap();
    let budget_path = format!("/api/v1/budgets/{}", budget_id);

    for (amount, linked) in [("25", true), ("70", false)] {
        let mut body = json!({
            "category_id": food,
            "amount": amount,
            "type": "expense",
            "occurred_at": "2025-03-05T08:00:00Z",
        });
        if linked {
            body["linked_object_id"] = json!(budget_id);
            body["linked_object_type"] = json!("budget");
        }
        post_as(&server, &alice, "/api/v1/transactions", body).await;
    }

    let overview = get_as(&server, &alice, &budget_path).await;
    assert_eq!(dec(&overview["categories"][0]["current_amount"]), d(95));
    assert_eq!(overview["categories"][0]["category"]["name"], "Food");
    assert_eq!(dec(&overview["categories"][1]["current_amount"]), Decimal::ZERO);
    assert_eq!(dec(&overview["current_amount"]), d(25));

    let details = get_as(&server, &alice, &format!("{}/details", budget_path)).await;
    assert_eq!(dec(&details["budget"]["categories"][0]["current_amount"]), d(25));
    assert_eq!(details["transactions"].as_array().unwrap().len(), 1);

    let listed = get_as(&server, &alice, "/api/v1/budgets").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_budget_update_and_delete() {
    let server = setup_test_server().await;
    let alice = register_and_login(&server, "alice").await;
    let bob = register_and_login(&server, "bob").await;
    let food = create_category(&server, &alice, "Food").await;
    let rent = create_category(&server, &alice, "Rent").await;

    let budget = post_as(
        &server,
        &alice,
        "/api/v1/budgets",
        json!({ "month": "2025-03-01", "categories": [food] }),
    )
    .await;
    let budget_id = budget["id"].as_i64().unwrap();
    let budget_path = format!("/api/v1/budgets/{}", budget_id);

    let (name, value) = bearer(&alice.token);
    let response = server
        .put(&budget_path)
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "month": "2025-04-20",
            "categories": [{ "category_id": rent, "limit_amount": "900" }],
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["month"], "2025-04-01");
    let categories = body["data"]["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0]["category_id"].as_i64(), Some(rent));
    assert_eq!(dec(&categories[0]["limit_amount"]), d(900));

    server
        .put(&budget_path)
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "month": "2025-04-01",
            "categories": [
                { "category_id": rent, "limit_amount": "1" },
                { "category_id": rent, "limit_amount": "2" },
            ],
        }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .put(&budget_path)
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "month": "2025-04-01",
            "categories": [{ "category_id": rent, "limit_amount": "-5" }],
        }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    let unchanged = get_as(&server, &alice, &budget_path).await;
    assert_eq!(dec(&unchanged["categories"][0]["limit_amount"]), d(900));

    let tx = post_as(
        &server,
        &alice,
        "/api/v1/transactions",
        json!({
            "category_id": rent, "amount": "900", "type": "expense",
            "occurred_at": "2025-04-02T09:00:00Z",
            "linked_object_id": budget_id, "linked_object_type": "budget",
        }),
    )
    .await;

    let (bob_name, bob_value) = bearer(&bob.token);
    server
        .delete(&budget_path)
        .add_header(bob_name, bob_value)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .delete(&budget_path)
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let tx = get_as(
        &server,
        &alice,
        &format!("/api/v1/transactions/{}", tx["id"].as_i64().unwrap()),
    )
    .await;
    assert!(tx["linked_object_id"].is_null());
    assert!(tx["linked_object_type"].is_null());
}

#[tokio::test]
async fn test_budget_categories_endpoints() {
    let server = setup_test_server().await;
    let alice = register_and_login(&server, "alice").await;
    let bob = register_and_login(&server, "bob").await;
    let food = create_category(&server, &alice, "Food").await;

    post_as(
        &server,
        &alice,
        "/api/v1/budgets",
        json!({ "month": "2025-03-01", "categories": [food] }),
    )
    .await;

    let rows = get_as(&server, &alice, "/api/v1/budget-categories").await;
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    let row_path = format!("/api/v1/budget-categories/{}", rows[0]["id"].as_i64().unwrap());
    assert!(get_as(&server, &bob, "/api/v1/budget-categories").await.as_array().unwrap().is_empty());

    let row = get_as(&server, &alice, &row_path).await;
    assert_eq!(row["category_id"].as_i64(), Some(food));
    assert_eq!(dec(&row["limit_amount"]), Decimal::ZERO);

    let (bob_name, bob_value) = bearer(&bob.token);
    server
        .delete(&row_path)
        .add_header(bob_name, bob_value)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let (name, value) = bearer(&alice.token);
    server
        .delete(&row_path)
        .add_header(name.clone(), value.clone())
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get(&row_path)
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
