use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};

use crate::AppState;
use crate::error::ApiError;
use crate::session::Session;
use crate::settings::Settings;

pub fn verify_token(
    settings: &Settings,
    auth: Option<Authorization<Bearer>>,
    query_token: Option<&str>,
) -> Result<(), ApiError> {
    let provided_token = auth
        .map(|a| a.token().to_string())
        .or_else(|| query_token.map(|s| s.to_string()));
    match provided_token {
        Some(token) if token == settings.auth_token => Ok(()),
        _ => Err(ApiError::Unauthorized(
            "Invalid authentication token".into(),
        )),
    }
}

fn token_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
}

/// A console caller that presented the access token, with the session built
/// from its role headers.
#[derive(Debug, Clone)]
pub struct Authorized(pub Session);

impl FromRequestParts<AppState> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = parts.headers.typed_get::<Authorization<Bearer>>();
        let query_token = parts.uri.query().and_then(token_from_query);
        verify_token(&state.settings, auth, query_token.as_deref())?;
        Ok(Authorized(Session::from_headers(&parts.headers)?))
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn settings() -> Settings {
        Settings {
            backend_base_url: Url::parse("http://localhost:5000").unwrap(),
            debug: false,
            auth_token: "secret".to_string(),
            enable_swagger: true,
            port: 8080,
            calendar_name: "Driving School Schedule".to_string(),
        }
    }

    #[test]
    fn test_verify_token_header() {
        let auth = Authorization::bearer("secret").unwrap();
        assert!(verify_token(&settings(), Some(auth), None).is_ok());
        let wrong = Authorization::bearer("nope").unwrap();
        assert!(verify_token(&settings(), Some(wrong), Some("secret")).is_err());
    }

    #[test]
    fn test_verify_token_query() {
        assert!(verify_token(&settings(), None, Some("secret")).is_ok());
        assert!(verify_token(&settings(), None, Some("bad")).is_err());
        assert!(verify_token(&settings(), None, None).is_err());
    }

    #[test]
    fn test_token_from_query() {
        assert_eq!(
            token_from_query("year=2024&token=s%20t").as_deref(),
            Some("s t")
        );
        assert_eq!(token_from_query("year=2024"), None);
    }
}
