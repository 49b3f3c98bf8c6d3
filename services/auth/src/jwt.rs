//! JWT service for access token generation and validation
//!
//! Tokens are signed with HS256 using the shared `SECRET_KEY`. The subject
//! claim carries the user id, which the middleware turns into a
//! [`Caller`](crate::stores::Caller).

use anyhow::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Settings;
use crate::models::User;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret for signing and verifying tokens
    pub secret: String,
    /// Access token expiration time in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
}

impl JwtConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        JwtConfig {
            secret: settings.secret_key.clone(),
            access_token_expiry: settings.access_token_expiry,
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: i64,
    /// Username at issue time, informational only
    pub username: String,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        if config.secret.is_empty() {
            anyhow::bail!("SECRET_KEY must not be empty");
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    /// Generate an access token for a user
    pub fn generate_access_token(&self, user: &User) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
            .as_secs();

        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            iat: now,
            exp: now + self.config.access_token_expiry,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Get the access token expiry time
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn service(secret: &str, expiry: u64) -> JwtService {
        JwtService::new(JwtConfig {
            secret: secret.to_string(),
            access_token_expiry: expiry,
        })
        .unwrap()
    }

    fn user() -> User {
        User {
            id: 42,
            username: "Darth_Vader".to_string(),
            email: "darth_vader@bewith.you".to_string(),
            password_hash: String::new(),
            active: true,
            created_at: Utc::now(),
            last_login_at: None,
            current_login_at: None,
            login_count: 0,
        }
    }

    #[test]
    fn test_token_carries_user_id() {
        let jwt = service("test-secret", 900);
        let token = jwt.generate_access_token(&user()).unwrap();

        let claims = jwt.validate_token(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "Darth_Vader");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let token = service("one-secret", 900)
            .generate_access_token(&user())
            .unwrap();
        assert!(service("another-secret", 900).validate_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let jwt = service("test-secret", 0);
        let token = jwt.generate_access_token(&user()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(jwt.validate_token(&token).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(service("test-secret", 900).validate_token("not.a.token").is_err());
    }

    #[test]
    fn test_empty_secret_is_refused() {
        let result = JwtService::new(JwtConfig {
            secret: String::new(),
            access_token_expiry: 900,
        });
        assert!(result.is_err());
    }
}
