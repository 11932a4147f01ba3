//! # Authentication
//!
//! Bearer tokens map to principals through a static table loaded from the
//! `AUTH_TOKENS` secret, one grant per line:
//!
//! ```text
//! <token>:<principal id>:<role>
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Issuing and verifying
//! signed tokens belongs to the identity provider in front of this service.
//!
//! Roles are not an access policy: every authenticated role may call every
//! route. The role is logged next to the principal id on each prescription.
use std::{collections::HashMap, str::FromStr, sync::Arc};

use anyhow::{Error, anyhow};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub role: String,
}

#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    grants: HashMap<String, Principal>,
}

impl TokenTable {
    pub fn get(&self, token: &str) -> Option<&Principal> {
        self.grants.get(token)
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

impl FromStr for TokenTable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut grants = HashMap::new();

        for (number, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.splitn(3, ':').map(str::trim);
            let (Some(token), Some(id), Some(role)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(anyhow!("line {}: expected token:principal:role", number + 1));
            };

            if token.is_empty() || id.is_empty() || role.is_empty() {
                return Err(anyhow!("line {}: empty field", number + 1));
            }

            grants.insert(
                token.to_string(),
                Principal {
                    id: id.to_string(),
                    role: role.to_string(),
                },
            );
        }

        if grants.is_empty() {
            return Err(anyhow!("no tokens configured"));
        }

        Ok(Self { grants })
    }
}

pub fn bearer(header: Option<&str>) -> Option<&str> {
    header?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_principal(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let principal = bearer(header)
        .and_then(|token| state.config.tokens.get(token))
        .cloned()
        .ok_or_else(|| {
            warn!("Rejected request to {} without a valid token", req.uri().path());
            AppError::Unauthorized
        })?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table() {
        let table: TokenTable = "
            # staff
            t-1:counselor-1:counselor
            t-2 : admin-1 : admin
        "
        .parse()
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get("t-2"),
            Some(&Principal {
                id: "admin-1".into(),
                role: "admin".into()
            })
        );
        assert_eq!(table.get("t-3"), None);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("t-1:counselor-1".parse::<TokenTable>().is_err());
        assert!("t-1::admin".parse::<TokenTable>().is_err());
        assert!("# only comments".parse::<TokenTable>().is_err());
    }

    #[test]
    fn test_bearer() {
        assert_eq!(bearer(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer(Some("Bearer   ")), None);
        assert_eq!(bearer(Some("Basic abc")), None);
        assert_eq!(bearer(None), None);
    }
}
