//! JWT bearer-token strategy.

use axum::body::Body;
use axum::http::{HeaderName, Request};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::auth::{AuthOutcome, AuthStrategy, DenyReason, Identity};
use crate::config::{ClaimsConfig, ConfigError, JwtAlgorithm, JwtAuthConfig};

/// Auth type routes use to require this strategy.
pub const JWT_AUTH_TYPE: &str = "jwt";

type Claims = Map<String, Value>;

/// Verifies an HMAC-signed JWT and maps configured claims to an identity.
pub struct JwtStrategy {
    key: DecodingKey,
    validation: Validation,
    header: HeaderName,
    claims: ClaimsConfig,
}

impl std::fmt::Debug for JwtStrategy {
    // Keeps the key out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtStrategy")
            .field("header", &self.header)
            .field("claims", &self.claims)
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl JwtStrategy {
    pub fn from_config(config: &JwtAuthConfig) -> Result<Self, ConfigError> {
        if config.secret.is_empty() {
            return Err(ConfigError::InvalidAuth("jwt-auth secret is empty".into()));
        }
        let header = HeaderName::from_bytes(config.auth_header.as_bytes()).map_err(|_| {
            ConfigError::InvalidAuth(format!(
                "jwt-auth auth-header {:?} is not a valid header name",
                config.auth_header
            ))
        })?;
        if config.claims.user_id.is_empty() || config.claims.role.is_empty() {
            return Err(ConfigError::InvalidAuth(
                "jwt-auth claim names must not be empty".into(),
            ));
        }

        let algorithm = match config.algorithm {
            JwtAlgorithm::HS256 => Algorithm::HS256,
            JwtAlgorithm::HS384 => Algorithm::HS384,
            JwtAlgorithm::HS512 => Algorithm::HS512,
        };
        let mut validation = Validation::new(algorithm);
        // `exp` is checked when present but tokens without one are accepted.
        validation.required_spec_claims.clear();
        if let Some(leeway) = config.leeway_secs {
            validation.leeway = leeway;
        }
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            header,
            claims: config.claims.clone(),
        })
    }

    fn token<'r>(&self, request: &'r Request<Body>) -> Option<&'r str> {
        let value = request.headers().get(&self.header)?.to_str().ok()?.trim_start();
        let token = match value.get(..7) {
            Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => &value[7..],
            _ => value,
        }
        .trim();
        (!token.is_empty()).then_some(token)
    }

    fn identity(&self, claims: &Claims) -> Result<Identity, DenyReason> {
        let user_id = match claims.get(&self.claims.user_id) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(DenyReason::MissingClaim(self.claims.user_id.clone()))
            }
            Some(_) => return Err(DenyReason::MalformedClaim(self.claims.user_id.clone())),
        };

        let roles = match claims.get(&self.claims.role) {
            Some(Value::Array(items)) if !items.is_empty() => items,
            Some(Value::Array(_)) | Some(Value::Null) | None => {
                return Err(DenyReason::MissingClaim(self.claims.role.clone()))
            }
            Some(_) => return Err(DenyReason::MalformedClaim(self.claims.role.clone())),
        };
        // Every element must be a string; one bad entry rejects the claim.
        let roles = roles
            .iter()
            .map(|role| role.as_str().map(str::to_owned))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| DenyReason::MalformedClaim(self.claims.role.clone()))?;

        Ok(Identity { user_id, roles })
    }
}

impl AuthStrategy for JwtStrategy {
    fn identifier(&self) -> &str {
        JWT_AUTH_TYPE
    }

    fn authenticate(&self, request: &Request<Body>) -> AuthOutcome {
        let Some(token) = self.token(request) else {
            return AuthOutcome::Denied(DenyReason::MissingHeader);
        };

        let data = match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => data,
            Err(e) => return AuthOutcome::Denied(DenyReason::InvalidToken(e.to_string())),
        };

        match self.identity(&data.claims) {
            Ok(identity) => AuthOutcome::Authenticated(identity),
            Err(reason) => AuthOutcome::Denied(reason),
        }
    }
}
