//! Per-request session context.
//!
//! The caller's role and identity arrive as headers, are parsed into a
//! [`Session`] once at the edge, and the value is then handed to every backend
//! call that needs authorisation headers.

use std::fmt;
use std::str::FromStr;

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub const USER_ROLE: HeaderName = HeaderName::from_static("user-role");
pub const USERNAME: HeaderName = HeaderName::from_static("username");
pub const INSTRUCTOR_LOGIN: HeaderName = HeaderName::from_static("instructor-login");
/// Backend bearer token forwarded on behalf of the caller.
pub const BACKEND_TOKEN: HeaderName = HeaderName::from_static("x-backend-token");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Instructor,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Teacher => "teacher",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "instructor" => Ok(Role::Instructor),
            "teacher" => Ok(Role::Teacher),
            other => Err(SessionError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Missing user-role header")]
    MissingRole,
    #[error("Unknown user role: {0}")]
    UnknownRole(String),
    #[error("Header {0} is not valid text")]
    InvalidHeader(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub role: Role,
    pub username: Option<String>,
    pub instructor_login: Option<String>,
    pub token: Option<String>,
}

fn header_text(headers: &HeaderMap, name: &HeaderName) -> Result<Option<String>, SessionError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|s| Some(s.trim().to_string()).filter(|s| !s.is_empty()))
            .map_err(|_| SessionError::InvalidHeader(name.as_str().to_owned())),
    }
}

impl Session {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            username: None,
            instructor_login: None,
            token: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn from_headers(headers: &HeaderMap) -> Result<Self, SessionError> {
        let role = header_text(headers, &USER_ROLE)?
            .ok_or(SessionError::MissingRole)?
            .parse()?;
        Ok(Self {
            role,
            username: header_text(headers, &USERNAME)?,
            instructor_login: header_text(headers, &INSTRUCTOR_LOGIN)?,
            token: header_text(headers, &BACKEND_TOKEN)?,
        })
    }

    /// Headers the backend expects on every call made for this session.
    pub fn backend_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_ROLE, HeaderValue::from_static(self.role.as_str()));
        if let Some(value) = self.username.as_deref().and_then(|u| HeaderValue::from_str(u).ok()) {
            headers.insert(USERNAME, value);
        }
        // instructor-scoped endpoints identify the caller by login
        let login = self.instructor_login.as_deref().or(match self.role {
            Role::Instructor => self.username.as_deref(),
            _ => None,
        });
        if let Some(value) = login.and_then(|l| HeaderValue::from_str(l).ok()) {
            headers.insert(INSTRUCTOR_LOGIN, value);
        }
        if let Some(value) = self
            .token
            .as_deref()
            .and_then(|t| HeaderValue::from_str(&format!("Bearer {t}")).ok())
        {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" teacher ".parse::<Role>().unwrap(), Role::Teacher);
        assert_eq!(
            "student".parse::<Role>().unwrap_err(),
            SessionError::UnknownRole("student".into())
        );
    }

    #[test]
    fn test_session_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ROLE, HeaderValue::from_static("instructor"));
        headers.insert(USERNAME, HeaderValue::from_static("petrenko"));
        let session = Session::from_headers(&headers).unwrap();
        assert_eq!(session.role, Role::Instructor);
        assert_eq!(session.username.as_deref(), Some("petrenko"));
        assert!(session.token.is_none());
    }

    #[test]
    fn test_session_requires_role() {
        let headers = HeaderMap::new();
        assert_eq!(
            Session::from_headers(&headers).unwrap_err(),
            SessionError::MissingRole
        );
    }

    #[test]
    fn test_backend_headers() {
        let session = Session::new(Role::Instructor)
            .with_username("petrenko")
            .with_token("abc");
        let headers = session.backend_headers();
        assert_eq!(headers.get(&USER_ROLE).unwrap(), "instructor");
        assert_eq!(headers.get(&USERNAME).unwrap(), "petrenko");
        assert_eq!(headers.get(&INSTRUCTOR_LOGIN).unwrap(), "petrenko");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");

        let admin = Session::new(Role::Admin).backend_headers();
        assert_eq!(admin.get(&USER_ROLE).unwrap(), "admin");
        assert!(admin.get(&USERNAME).is_none());
        assert!(admin.get(&INSTRUCTOR_LOGIN).is_none());
    }
}
