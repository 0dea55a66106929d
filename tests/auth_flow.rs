//! Authentication integration tests: tokens, sessions and permissions.

use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_token_is_stable_and_authenticates() {
    let server = common::spawn_server(common::test_config()).await;
    let first = server.admin_token().await;
    let second = server.admin_token().await;
    assert_eq!(first, second);
    assert_eq!(first.len(), 40);

    let res = server.client.get(server.url("/api/users/")).send().await.unwrap();
    assert_eq!(res.status(), 401);
    assert_eq!(res.headers()["www-authenticate"], "Token");

    let res = server
        .client
        .get(server.url("/api/users/"))
        .header("Authorization", format!("Token {}", first))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let users: Value = res.json().await.unwrap();
    assert_eq!(users[0]["username"], "admin");
}

#[tokio::test]
async fn test_bad_credentials() {
    let server = common::spawn_server(common::test_config()).await;
    let res = server
        .client
        .post(server.url("/api-token-auth/"))
        .json(&json!({ "username": "admin", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "non_field_errors": ["Unable to log in with provided credentials."] })
    );
}

#[tokio::test]
async fn test_token_accepts_form_bodies() {
    let server = common::spawn_server(common::test_config()).await;
    let res = server
        .client
        .post(server.url("/api-token-auth/"))
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(format!("username=admin&password={}", common::ADMIN_PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_session_login_and_logout() {
    let server = common::spawn_server(common::test_config()).await;
    let res = server
        .client
        .post(server.url("/api-auth/login/"))
        .json(&json!({ "username": "admin", "password": common::ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let set_cookie = res.headers()["set-cookie"].to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    assert!(cookie.starts_with("sessionid="));

    let res = server
        .client
        .post(server.url("/api/sample-periods/"))
        .header("Cookie", &cookie)
        .json(&json!({ "type": "morning", "period_start": "07:00", "period_end": "09:00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);

    let res = server
        .client
        .get(server.url("/api-auth/logout/"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    // The old cookie no longer authenticates.
    let res = server
        .client
        .post(server.url("/api/sample-periods/"))
        .header("Cookie", &cookie)
        .json(&json!({ "type": "evening", "period_start": "16:00", "period_end": "19:00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn test_non_staff_user_permissions() {
    let server = common::spawn_server(common::test_config()).await;
    let admin = format!("Token {}", server.admin_token().await);

    let res = server
        .client
        .post(server.url("/api/users/"))
        .header("Authorization", &admin)
        .json(&json!({ "username": "planner", "password": "transit" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);

    let planner = format!("Token {}", server.token("planner", "transit").await);

    let users: Value = server
        .client
        .get(server.url("/api/users/"))
        .header("Authorization", &planner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(users.as_array().unwrap().len(), 1);
    assert_eq!(users[0]["username"], "planner");

    let res = server
        .client
        .post(server.url("/api/users/"))
        .header("Authorization", &planner)
        .json(&json!({ "username": "intruder", "password": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    // Config endpoints require authentication even for reads.
    let res = server.client.get(server.url("/api/config/")).send().await.unwrap();
    assert_eq!(res.status(), 401);
    let res = server
        .client
        .get(server.url("/api/config/"))
        .header("Authorization", &planner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_credential_endpoints_are_throttled() {
    let mut config = common::test_config();
    config.auth.requests_per_second = 1;
    config.auth.burst_size = 3;
    let server = common::spawn_server(config).await;

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let res = server
            .client
            .post(server.url("/api-token-auth/"))
            .json(&json!({ "username": "nobody", "password": "x" }))
            .send()
            .await
            .unwrap();
        statuses.push(res.status().as_u16());
    }
    assert!(statuses.contains(&429), "statuses: {:?}", statuses);
    assert_eq!(statuses[0], 400);
}
