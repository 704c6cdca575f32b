use std::fmt;

use arca_types::NamespaceId;
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};

use crate::config::{AuthConfig, TokenGrant};
use crate::error::ServerResult;

/// What the caller presented.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Anonymous,
}

impl Credentials {
    /// Read a bearer token from the `Authorization` header.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| Self::Bearer(token.trim().to_string()))
            .unwrap_or(Self::Anonymous)
    }
}

/// Access levels, each implying the ones below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
    Admin,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

/// Decides whether a caller may act on a namespace.
#[async_trait]
pub trait NamespaceAuthorizer: Send + Sync {
    async fn authorize(
        &self,
        credentials: &Credentials,
        namespace: &NamespaceId,
        access: Access,
    ) -> ServerResult<bool>;
}

/// Grants everything to everyone.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllAuthorizer;

#[async_trait]
impl NamespaceAuthorizer for AllowAllAuthorizer {
    async fn authorize(&self, _: &Credentials, _: &NamespaceId, _: Access) -> ServerResult<bool> {
        Ok(true)
    }
}

/// Static bearer tokens with per-namespace grants.
///
/// Anonymous callers get full access when `allow_anonymous` is set and
/// nothing otherwise.
#[derive(Debug, Clone)]
pub struct TokenAuthorizer {
    allow_anonymous: bool,
    grants: Vec<TokenGrant>,
}

impl TokenAuthorizer {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            allow_anonymous: config.allow_anonymous,
            grants: config.tokens.clone(),
        }
    }
}

#[async_trait]
impl NamespaceAuthorizer for TokenAuthorizer {
    async fn authorize(
        &self,
        credentials: &Credentials,
        namespace: &NamespaceId,
        access: Access,
    ) -> ServerResult<bool> {
        let allowed = match credentials {
            Credentials::Anonymous => self.allow_anonymous,
            Credentials::Bearer(token) => self
                .grants
                .iter()
                .filter(|grant| grant.token == *token)
                .any(|grant| grant.access >= access && grant.covers(namespace)),
        };
        if !allowed {
            tracing::debug!(namespace = %namespace, access = %access, "access denied");
        }
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn ns(name: &str) -> NamespaceId {
        NamespaceId::new(name).unwrap()
    }

    fn authorizer(allow_anonymous: bool) -> TokenAuthorizer {
        TokenAuthorizer::from_config(&AuthConfig {
            allow_anonymous,
            tokens: vec![
                TokenGrant {
                    token: "ci".into(),
                    namespaces: vec!["builds".into()],
                    access: Access::Write,
                },
                TokenGrant {
                    token: "ops".into(),
                    namespaces: vec!["*".into()],
                    access: Access::Admin,
                },
            ],
        })
    }

    #[test]
    fn access_ordering_and_display() {
        assert!(Access::Admin > Access::Write);
        assert!(Access::Write > Access::Read);
        assert_eq!(Access::Read.to_string(), "read");
    }

    #[test]
    fn credentials_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(Credentials::from_headers(&headers), Credentials::Anonymous);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(Credentials::from_headers(&headers), Credentials::Bearer("abc".into()));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(Credentials::from_headers(&headers), Credentials::Anonymous);
    }

    #[tokio::test]
    async fn token_grants_are_scoped() {
        let auth = authorizer(false);
        let ci = Credentials::Bearer("ci".into());
        assert!(auth.authorize(&ci, &ns("builds"), Access::Read).await.unwrap());
        assert!(auth.authorize(&ci, &ns("builds"), Access::Write).await.unwrap());
        assert!(!auth.authorize(&ci, &ns("builds"), Access::Admin).await.unwrap());
        assert!(!auth.authorize(&ci, &ns("other"), Access::Read).await.unwrap());

        let ops = Credentials::Bearer("ops".into());
        assert!(auth.authorize(&ops, &ns("other"), Access::Admin).await.unwrap());

        let stranger = Credentials::Bearer("nope".into());
        assert!(!auth.authorize(&stranger, &ns("builds"), Access::Read).await.unwrap());
    }

    #[tokio::test]
    async fn anonymous_follows_config() {
        let anon = Credentials::Anonymous;
        assert!(!authorizer(false)
            .authorize(&anon, &ns("builds"), Access::Read)
            .await
            .unwrap());
        assert!(authorizer(true)
            .authorize(&anon, &ns("builds"), Access::Admin)
            .await
            .unwrap());
        assert!(AllowAllAuthorizer
            .authorize(&anon, &ns("x"), Access::Admin)
            .await
            .unwrap());
    }
}
