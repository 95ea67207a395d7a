use crate::config::schema::{str_to_hex_hash, AccessSettings, HttpFrontend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    Writer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("NEED_ACCESS_TOKEN")]
    NeedAccessToken,

    #[error("INVALID_AUTHORIZATION_HEADER")]
    InvalidAuthorizationHeader,

    #[error("WRONG_PASSWORD")]
    WrongPassword,

    #[error("TOKEN_NOT_NEEDED")]
    TokenNotNeeded,

    #[error("WRITE_DISABLED")]
    WriteDisabled,
}

/// Who may change upload records. Everything else this service exposes is
/// public.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    pub write: AccessSettings,
}

impl AccessPolicy {
    pub fn from_config(config: &HttpFrontend) -> Self {
        Self {
            write: config.write_access.clone(),
        }
    }

    pub fn free_for_all() -> Self {
        Self {
            write: AccessSettings::Any,
        }
    }

    pub fn with_write_disabled(self) -> Self {
        Self {
            write: AccessSettings::Off,
        }
    }

    pub fn with_write_password(self, password: &str) -> Self {
        Self {
            write: AccessSettings::Password {
                sha256_hash: str_to_hex_hash(password),
            },
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> Result<Option<String>, AuthError> {
    match header {
        None => Ok(None),
        Some(value) => match value.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
            _ => Err(AuthError::InvalidAuthorizationHeader),
        },
    }
}

pub fn token_to_principal(
    token: Option<String>,
    policy: &AccessPolicy,
) -> Result<Principal, AuthError> {
    match (token, &policy.write) {
        (None, AccessSettings::Password { .. }) => Err(AuthError::NeedAccessToken),
        (None, _) => Ok(Principal::Anonymous),
        (Some(_), AccessSettings::Any) => Err(AuthError::TokenNotNeeded),
        (Some(_), AccessSettings::Off) => Err(AuthError::WriteDisabled),
        (Some(t), AccessSettings::Password { sha256_hash })
            if str_to_hex_hash(&t) == sha256_hash.as_str() =>
        {
            Ok(Principal::Writer)
        }
        (Some(_), AccessSettings::Password { .. }) => Err(AuthError::WrongPassword),
    }
}

pub fn can_write(principal: &Principal, policy: &AccessPolicy) -> bool {
    matches!(
        (principal, &policy.write),
        // Writer is only ever issued against a password
        (Principal::Writer, _) | (_, AccessSettings::Any)
    )
}

/// Resolve the `Authorization` header of a request that changes upload records
pub fn authorize_write(
    header: Option<&str>,
    policy: &AccessPolicy,
) -> Result<Principal, AuthError> {
    let principal = token_to_principal(bearer_token(header)?, policy)?;
    if can_write(&principal, policy) {
        Ok(principal)
    } else {
        Err(AuthError::WriteDisabled)
    }
}
