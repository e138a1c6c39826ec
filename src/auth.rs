use crate::error::app_error::AppError;
use crate::models::device::DeviceId;
use crate::models::session::Session;
use crate::store::sessions::SessionStore;
use rocket::http::{CookieJar, Status};
use rocket::outcome::Outcome;
use rocket::request::{FromRequest, Outcome as RequestOutcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{Object, Responses, SecurityRequirement, SecurityScheme, SecuritySchemeData};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";

/// The signed-in browser session, resolved from the private `session` cookie.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentSession {
    pub session_id: Uuid,
    pub device_id: DeviceId,
}

/// The session, if any, without failing the request. Used where an anonymous
/// caller still gets an answer.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

pub(crate) fn session_cookie_value(session: &Session) -> String {
    format!("{}:{}", session.id, session.device_id)
}

pub(crate) fn parse_session_cookie_value(value: &str) -> Option<(Uuid, &str)> {
    let (session_id_str, device_id) = value.split_once(':')?;
    let session_id = Uuid::parse_str(session_id_str).ok()?;
    if device_id.is_empty() {
        return None;
    }
    Some((session_id, device_id))
}

/// Session id carried by the cookie, whether or not it is still live.
pub(crate) fn cookie_session_id(cookies: &CookieJar<'_>) -> Option<Uuid> {
    let cookie = cookies.get_private(SESSION_COOKIE)?;
    parse_session_cookie_value(cookie.value()).map(|(session_id, _)| session_id)
}

async fn resolve_session(req: &Request<'_>, sessions: &SessionStore) -> Option<Session> {
    let cookie = req.cookies().get_private(SESSION_COOKIE)?;
    let (session_id, device_id) = parse_session_cookie_value(cookie.value())?;
    sessions
        .get_active(&session_id)
        .await
        .filter(|session| session.device_id.as_str() == device_id)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentSession {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let Some(sessions) = req.rocket().state::<Arc<SessionStore>>() else {
            return Outcome::Error((Status::InternalServerError, AppError::Task("session store not managed".to_string())));
        };

        match resolve_session(req, sessions).await {
            Some(session) => {
                let current = CurrentSession {
                    session_id: session.id,
                    device_id: session.device_id,
                };
                req.local_cache(|| Some(current.clone()));
                Outcome::Success(current)
            }
            None => Outcome::Error((Status::Unauthorized, AppError::Unauthenticated)),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MaybeSession {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let Some(sessions) = req.rocket().state::<Arc<SessionStore>>() else {
            return Outcome::Error((Status::InternalServerError, AppError::Task("session store not managed".to_string())));
        };
        Outcome::Success(MaybeSession(resolve_session(req, sessions).await))
    }
}

impl<'a> OpenApiFromRequest<'a> for CurrentSession {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        let security_scheme = SecurityScheme {
            description: Some("Cookie-based authentication. Log in via POST /api/login to obtain the session cookie.".to_string()),
            data: SecuritySchemeData::ApiKey {
                name: SESSION_COOKIE.to_string(),
                location: "cookie".to_string(),
            },
            extensions: Object::default(),
        };

        let mut security_req = SecurityRequirement::new();
        security_req.insert("cookieAuth".to_string(), Vec::new());

        Ok(RequestHeaderInput::Security("cookieAuth".to_string(), security_scheme, security_req))
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response};
        let mut responses = Responses::default();
        responses.responses.insert(
            "401".to_string(),
            RefOr::Object(Response {
                description: "Unauthorized - Authentication required".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}

impl<'a> OpenApiFromRequest<'a> for MaybeSession {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
