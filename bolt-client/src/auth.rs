//! Credentials and the auth-reattempt callback (§6's "Auth reattempt
//! callback" collaborator, absent from the DATA MODEL section but required
//! by every real `INIT` call site).

use std::sync::Arc;

use bolt_wire::value::{PropMap, Value};
use bolt_wire::BoltError;

/// The `INIT` auth token: scheme, principal, credentials, and an optional
/// realm, matching the shape every Bolt v1/v2 server expects in the
/// handshake's auth map.
#[derive(Debug, Clone, PartialEq)]
pub struct Auth {
    pub scheme: String,
    pub principal: String,
    pub credentials: String,
    pub realm: Option<String>,
}

impl Auth {
    pub fn basic(principal: impl Into<String>, credentials: impl Into<String>) -> Self {
        Auth {
            scheme: "basic".into(),
            principal: principal.into(),
            credentials: credentials.into(),
            realm: None,
        }
    }

    /// No authentication at all — some deployments run with auth disabled.
    pub fn none() -> Self {
        Auth {
            scheme: "none".into(),
            principal: String::new(),
            credentials: String::new(),
            realm: None,
        }
    }

    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    pub(crate) fn to_prop_map(&self) -> PropMap {
        let mut entries = vec![
            (Arc::from("scheme"), Value::from(self.scheme.as_str())),
            (Arc::from("principal"), Value::from(self.principal.as_str())),
            (Arc::from("credentials"), Value::from(self.credentials.as_str())),
        ];
        if let Some(realm) = &self.realm {
            entries.push((Arc::from("realm"), Value::from(realm.as_str())));
        }
        PropMap::new(entries)
    }
}

/// What to do after an `INIT` attempt fails authentication (§6): retry with
/// different credentials, or give up and surface the error.
pub enum AuthAction {
    Retry(Auth),
    GiveUp,
}

/// The auth-reattempt callback collaborator. `attempt` is 1 on the first
/// retry (the initial attempt itself doesn't go through this trait).
pub trait AuthReattempt: Send + Sync {
    fn reattempt(&self, host: &str, attempt: u32, prior_error: &BoltError) -> AuthAction;
}

/// The default: never retry, surface the first authentication failure.
pub struct NoReattempt;

impl AuthReattempt for NoReattempt {
    fn reattempt(&self, _host: &str, _attempt: u32, _prior_error: &BoltError) -> AuthAction {
        AuthAction::GiveUp
    }
}
