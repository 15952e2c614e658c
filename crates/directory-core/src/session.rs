//! Session context
//!
//! The signed-in identity travels as an explicit value handed to each
//! operation. It is populated from the identity provider on session check and
//! cleared on sign-out.

use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;
use crate::model::IdentityId;

/// An authenticated session as issued by the identity provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub identity_id: IdentityId,
}

/// External identity provider (sign-up, sign-in and sign-out live there)
pub trait IdentityProvider {
    fn current_session(&self) -> Option<Session>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    session: Option<Session>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self { session: None }
    }

    pub fn signed_in(identity: IdentityId) -> Self {
        Self {
            session: Some(Session { identity_id: identity }),
        }
    }

    /// Ask the provider for the current session, replacing whatever was held
    pub fn refresh(&mut self, provider: &impl IdentityProvider) {
        self.session = provider.current_session();
    }

    pub fn clear(&mut self) {
        self.session = None;
    }

    pub fn identity(&self) -> Option<&IdentityId> {
        self.session.as_ref().map(|s| &s.identity_id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn require_identity(&self) -> Result<&IdentityId, DirectoryError> {
        self.identity()
            .ok_or_else(|| DirectoryError::Permission("You must be logged in".to_string()))
    }
}
