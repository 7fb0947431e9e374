//! Bearer credential sources.

use crate::domain::ports::CredentialProvider;
use std::sync::{PoisonError, RwLock};

/// Credential fixed at startup (e.g. `DASHBOARD_API_TOKEN`), replaceable at
/// runtime when the collaborator that owns sign-in refreshes it.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_can_be_replaced() {
        let credentials = StaticCredentials::new(Some("first".into()));
        assert_eq!(credentials.bearer_token().as_deref(), Some("first"));

        credentials.set_token(None);
        assert!(credentials.bearer_token().is_none());

        credentials.set_token(Some(String::new()));
        assert!(credentials.bearer_token().is_none());
    }

    #[test]
    fn test_token_survives_poisoned_lock() {
        let credentials = std::sync::Arc::new(StaticCredentials::new(Some("first".into())));
        let holder = credentials.clone();
        let crashed = std::thread::spawn(move || {
            let _guard = holder.token.write().unwrap();
            panic!("refresh crashed while holding the token");
        })
        .join();
        assert!(crashed.is_err());
        assert!(credentials.token.is_poisoned());

        assert_eq!(credentials.bearer_token().as_deref(), Some("first"));
        credentials.set_token(Some("second".into()));
        assert_eq!(credentials.bearer_token().as_deref(), Some("second"));
    }
}
