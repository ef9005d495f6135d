use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::http::{header, StatusCode};
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use chrono::{Duration, Utc};
use futures_util::future::{ready, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SESSION_COOKIE: &str = "greeter_session";

/// Where a visitor is in the name → upload → camera flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Anonymous,
    Named {
        username: String,
    },
    Viewing {
        username: String,
        image_id: String,
    },
}

impl SessionState {
    pub fn named(username: impl Into<String>) -> Self {
        SessionState::Named {
            username: username.into(),
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Named { username } | SessionState::Viewing { username, .. } => {
                Some(username)
            }
        }
    }

    pub fn current_image_id(&self) -> Option<&str> {
        match self {
            SessionState::Viewing { image_id, .. } => Some(image_id),
            _ => None,
        }
    }

    /// Attach an uploaded image. Anonymous sessions stay anonymous.
    pub fn with_image(self, image_id: impl Into<String>) -> Self {
        match self {
            SessionState::Anonymous => SessionState::Anonymous,
            SessionState::Named { username } | SessionState::Viewing { username, .. } => {
                SessionState::Viewing {
                    username,
                    image_id: image_id.into(),
                }
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub session: SessionState,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No name in session")]
    Anonymous,
    #[error("Session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("Session keys are not registered")]
    Unconfigured,
}

impl ResponseError for SessionError {
    fn status_code(&self) -> StatusCode {
        match self {
            SessionError::Anonymous => StatusCode::FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            SessionError::Anonymous => HttpResponse::Found()
                .insert_header((header::LOCATION, "/"))
                .finish(),
            _ => HttpResponse::InternalServerError().body(self.to_string()),
        }
    }
}

/// Signs and verifies the session cookie.
pub struct SessionKeys {
    secret: String,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: impl Into<String>, ttl_hours: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Encode a session state as a signed token.
    pub fn encode(&self, session: &SessionState) -> Result<String, SessionError> {
        let now = Utc::now();
        let claims = Claims {
            session: session.clone(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }

    /// Verify a token and return the session it carries.
    pub fn decode(&self, token: &str) -> Result<SessionState, SessionError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims.session)
    }

    /// Session carried by the request. Anything missing or invalid is anonymous.
    pub fn read(&self, req: &HttpRequest) -> SessionState {
        let Some(cookie) = req.cookie(SESSION_COOKIE) else {
            return SessionState::Anonymous;
        };
        if cookie.value().is_empty() {
            return SessionState::Anonymous;
        }

        match self.decode(cookie.value()) {
            Ok(session) => session,
            Err(e) => {
                log::debug!("Discarding session cookie: {}", e);
                SessionState::Anonymous
            }
        }
    }

    /// Browser-session cookie holding `session`.
    pub fn cookie(&self, session: &SessionState) -> Result<Cookie<'static>, SessionError> {
        let token = self.encode(session)?;
        Ok(Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .finish())
    }

    /// Cookie that makes the browser drop the session.
    pub fn removal_cookie() -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
        cookie.make_removal();
        cookie
    }
}

fn session_keys(req: &HttpRequest) -> Result<&SessionKeys, SessionError> {
    req.app_data::<web::Data<SessionKeys>>()
        .map(|keys| keys.get_ref())
        .ok_or(SessionError::Unconfigured)
}

impl FromRequest for SessionState {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            session_keys(req)
                .map(|keys| keys.read(req))
                .map_err(Into::into),
        )
    }
}

/// A visitor who has entered a name. Extracting it on an anonymous
/// request redirects to the name form.
#[derive(Debug, Clone)]
pub struct Visitor {
    pub username: String,
    pub session: SessionState,
}

impl FromRequest for Visitor {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = session_keys(req).and_then(|keys| {
            let session = keys.read(req);
            match session.username() {
                Some(username) => Ok(Visitor {
                    username: username.to_string(),
                    session: session.clone(),
                }),
                None => Err(SessionError::Anonymous),
            }
        });
        ready(result.map_err(Into::into))
    }
}
