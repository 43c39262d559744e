use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub backend_base_url: Url,
    pub debug: bool,
    pub auth_token: String,
    pub enable_swagger: bool,
    pub port: u16,
    pub calendar_name: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // APP_BACKEND_BASE_URL, APP_AUTH_TOKEN, ...
            .add_source(Environment::with_prefix("APP").try_parsing(true))
            .set_default("backend_base_url", "http://localhost:5000")?
            .set_default("debug", false)?
            .set_default("auth_token", "default-token-change-me")?
            .set_default("enable_swagger", true)?
            .set_default("port", 8080)?
            .set_default("calendar_name", "Driving School Schedule")?
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const KEYS: [&str; 4] = [
        "APP_BACKEND_BASE_URL",
        "APP_PORT",
        "APP_DEBUG",
        "APP_CALENDAR_NAME",
    ];

    fn clear_env() {
        for key in KEYS {
            // SAFETY: tests touching the environment run serially.
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.backend_base_url.as_str(), "http://localhost:5000/");
        assert_eq!(settings.port, 8080);
        assert!(settings.enable_swagger);
        assert_eq!(settings.calendar_name, "Driving School Schedule");
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        // SAFETY: tests touching the environment run serially.
        unsafe {
            std::env::set_var("APP_BACKEND_BASE_URL", "http://backend.internal:7000");
            std::env::set_var("APP_PORT", "9090");
            std::env::set_var("APP_DEBUG", "true");
            std::env::set_var("APP_CALENDAR_NAME", "Night classes");
        }
        let settings = Settings::from_env().unwrap();
        clear_env();
        assert_eq!(settings.backend_base_url.host_str(), Some("backend.internal"));
        assert_eq!(settings.port, 9090);
        assert!(settings.debug);
        assert_eq!(settings.calendar_name, "Night classes");
    }
}
