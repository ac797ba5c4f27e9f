//! The `current_password` rule
//!
//! The host application owns password storage, so the rule delegates to a
//! checker it registers at startup. The checker is process-wide: every
//! validator instance reads the same slot. The user id comes from the
//! sibling `user_id` field of the struct being validated.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use tracing::debug;

use super::Rule;
use crate::errors::RuleError;
use crate::field::FieldLevel;

/// Sibling field holding the id of the user whose password is checked
pub const USER_ID_FIELD: &str = "user_id";

static SHARED: Lazy<PasswordSlot> = Lazy::new(PasswordSlot::default);

/// Verifies a user's current password
#[async_trait]
pub trait CurrentPasswordChecker: Send + Sync {
    async fn check(&self, user_id: u64, password: &str) -> bool;
}

#[async_trait]
impl<F> CurrentPasswordChecker for F
where
    F: Fn(u64, &str) -> bool + Send + Sync,
{
    async fn check(&self, user_id: u64, password: &str) -> bool {
        self(user_id, password)
    }
}

/// Holder for the registered checker, replaceable at any time
#[derive(Clone, Default)]
pub struct PasswordSlot {
    inner: Arc<RwLock<Option<Arc<dyn CurrentPasswordChecker>>>>,
}

impl PasswordSlot {
    /// A private slot, not shared with anything else
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the process-wide slot
    pub fn shared() -> Self {
        SHARED.clone()
    }

    /// Install or replace the checker
    pub fn set(&self, checker: Arc<dyn CurrentPasswordChecker>) {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(checker);
    }

    /// Currently installed checker
    pub fn get(&self) -> Option<Arc<dyn CurrentPasswordChecker>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Whether a checker has been installed
    pub fn is_registered(&self) -> bool {
        self.get().is_some()
    }
}

impl std::fmt::Debug for PasswordSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordSlot")
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// Rule object bound to a checker slot
pub struct CurrentPasswordRule {
    slot: PasswordSlot,
}

impl CurrentPasswordRule {
    /// Rule reading its checker from `slot`
    pub fn new(slot: PasswordSlot) -> Self {
        Self { slot }
    }
}

#[async_trait]
impl Rule for CurrentPasswordRule {
    async fn check(&self, field: &FieldLevel<'_>) -> Result<bool, RuleError> {
        let Some(checker) = self.slot.get() else {
            debug!(field = field.field(), "no current password checker registered");
            return Ok(false);
        };

        let Some(user_id) = field.sibling(USER_ID_FIELD).and_then(|v| v.as_u64()) else {
            debug!(field = field.field(), "no unsigned user_id next to password field");
            return Ok(false);
        };

        let password = field.as_text();
        Ok(checker.check(user_id, &password).await)
    }
}
