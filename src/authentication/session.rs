use serde::{Deserialize, Serialize};

use crate::{
    error::ServiceError,
    schema::{Id, User, UserRole},
};

use super::permissions::ActionType;

/// Identity of an authenticated caller as handed over by the session provider.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), ServiceError> {
        if !action.authenticate(self) {
            return Err(ServiceError::Forbidden);
        }
        Ok(())
    }

    /// Owners may always act; anyone else needs `override_action`.
    pub fn authenticate_owner(
        &self,
        owner_id: Id,
        own_action: ActionType,
        override_action: ActionType,
    ) -> Result<(), ServiceError> {
        self.authenticate(own_action)?;

        if owner_id == self.user_id {
            return Ok(());
        }
        self.authenticate(override_action)
    }
}

impl From<&User> for SessionData {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.to_owned(),
            role: user.role,
        }
    }
}

/// Who is asking: an authenticated user or an anonymous visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Viewer {
    #[default]
    Anonymous,
    Authenticated(SessionData),
}

impl Viewer {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::Authenticated(_))
    }

    pub fn user_id(&self) -> Option<Id> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Authenticated(session) => Some(session.user_id),
        }
    }

    /// The session behind this viewer, or [`ServiceError::Forbidden`] for anonymous callers.
    pub fn session(&self) -> Result<&SessionData, ServiceError> {
        match self {
            Viewer::Anonymous => Err(ServiceError::Forbidden),
            Viewer::Authenticated(session) => Ok(session),
        }
    }
}

impl From<Option<SessionData>> for Viewer {
    fn from(session: Option<SessionData>) -> Self {
        match session {
            Some(session) => Viewer::Authenticated(session),
            None => Viewer::Anonymous,
        }
    }
}

impl From<SessionData> for Viewer {
    fn from(session: SessionData) -> Self {
        Viewer::Authenticated(session)
    }
}
