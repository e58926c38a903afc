use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_body(access: &str, refresh: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": 7200,
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = refresh.into();
    }
    body
}

/// Code exchange for `code` answered with a fresh token pair.
#[allow(dead_code)]
pub async fn mount_code_exchange(server: &MockServer, code: &str, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains(format!("code={code}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access, Some(refresh))))
        .mount(server)
        .await;
}

/// Refresh of `refresh` answered with a new access token; the refresh token
/// rotates to `rotated` when given.
#[allow(dead_code)]
pub async fn mount_refresh(
    server: &MockServer,
    refresh: &str,
    access: &str,
    rotated: Option<&str>,
    expected_calls: u64,
) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains(format!("refresh_token={refresh}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access, rotated)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Refresh of `refresh` refused as `invalid_grant`.
#[allow(dead_code)]
pub async fn mount_refresh_rejected(server: &MockServer, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains(format!("refresh_token={refresh}")))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "The provided authorization grant is invalid"
            })),
        )
        .expect(1)
        .mount(server)
        .await;
}

/// Profile endpoint that only accepts `access`.
#[allow(dead_code)]
pub async fn mount_profile(server: &MockServer, access: &str, user: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v2/me"))
        .and(header("authorization", format!("Bearer {access}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(user))
        .mount(server)
        .await;
}

/// Profile endpoint refusing `access`.
#[allow(dead_code)]
pub async fn mount_profile_unauthorized(server: &MockServer, access: &str) {
    Mock::given(method("GET"))
        .and(path("/v2/me"))
        .and(header("authorization", format!("Bearer {access}").as_str()))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;
}
