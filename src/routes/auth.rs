use crate::auth::{MaybeSession, SESSION_COOKIE, cookie_session_id, session_cookie_value};
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::hub::Hub;
use crate::models::session::{AuthStatusResponse, LoginRequest, LoginResponse, LogoutResponse};
use crate::store::sessions::SessionStore;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::serde::json::Json;
use rocket::{State, routes};
use std::sync::Arc;
use tracing::info;

#[rocket::post("/login", data = "<payload>")]
pub async fn login(
    hub: &State<Arc<Hub>>,
    sessions: &State<Arc<SessionStore>>,
    cookies: &CookieJar<'_>,
    payload: JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let LoginRequest { device_id, password } = payload.into_inner();

    let hub = Arc::clone(hub.inner());
    let device_id = tokio::task::spawn_blocking(move || hub.credentials().verify(device_id.trim(), &password)).await??;

    let session = sessions.create(device_id.clone(), cookie_session_id(cookies)).await;
    cookies.add_private(
        Cookie::build((SESSION_COOKIE, session_cookie_value(&session)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build(),
    );

    info!(device_id = %device_id, session_id = %session.id, "login succeeded");
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        device_id,
    }))
}

#[rocket::post("/logout")]
pub async fn logout(sessions: &State<Arc<SessionStore>>, cookies: &CookieJar<'_>) -> Json<LogoutResponse> {
    if let Some(session_id) = cookie_session_id(cookies) {
        sessions.revoke(&session_id).await;
    }
    cookies.remove_private(Cookie::build(SESSION_COOKIE).path("/").build());
    Json(LogoutResponse { success: true })
}

#[rocket::get("/auth-status")]
pub fn auth_status(session: MaybeSession) -> Json<AuthStatusResponse> {
    let device_id = session.0.map(|session| session.device_id);
    Json(AuthStatusResponse {
        authenticated: device_id.is_some(),
        device_id,
    })
}

pub fn routes() -> Vec<rocket::Route> {
    routes![login, logout, auth_status]
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{login, test_client};
    use rocket::http::{ContentType, Status};
    use serde_json::{Value, json};
    use tempfile::TempDir;

    #[rocket::async_test]
    async fn login_sets_session_and_status_reports_it() {
        let dir = TempDir::new().unwrap();
        let client = test_client(&dir).await;

        let response = client.get("/api/auth-status").dispatch().await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["authenticated"], false);

        login(&client, "raspi-001", "Bag@123").await;

        let body: Value = client.get("/api/auth-status").dispatch().await.into_json().await.unwrap();
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["deviceId"], "raspi-001");
    }

    #[rocket::async_test]
    async fn login_rejects_unknown_device_and_bad_password() {
        let dir = TempDir::new().unwrap();
        let client = test_client(&dir).await;

        for (device_id, password) in [("raspi-999", "Bag@123"), ("raspi-001", "wrong")] {
            let response = client
                .post("/api/login")
                .header(ContentType::JSON)
                .body(json!({"deviceId": device_id, "password": password}).to_string())
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::Unauthorized);
            let body: Value = response.into_json().await.unwrap();
            assert_eq!(body["success"], false);
        }
    }

    #[rocket::async_test]
    async fn malformed_login_body_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let client = test_client(&dir).await;

        let response = client.post("/api/login").header(ContentType::JSON).body("{\"deviceId\": 1").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn logout_ends_the_session() {
        let dir = TempDir::new().unwrap();
        let client = test_client(&dir).await;
        login(&client, "raspi-001", "Bag@123").await;

        let response = client.post("/api/logout").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let body: Value = client.get("/api/auth-status").dispatch().await.into_json().await.unwrap();
        assert_eq!(body["authenticated"], false);
        assert_eq!(client.get("/api/user-config").dispatch().await.status(), Status::Unauthorized);
    }
}
