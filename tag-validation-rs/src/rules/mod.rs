//! Rule callbacks
//!
//! Every tag name resolves to a [`Rule`]. The general rules live in
//! [`general`]; the database, password and mobile rules sit in their own
//! modules because each pulls in a dependency of its own.

pub mod database;
pub mod general;
pub mod mobile;
pub mod password;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::RuleError;
use crate::field::FieldLevel;

pub use database::{InMemoryRecordLookup, PgRecordLookup, RecordLookup, RecordRule, TableColumn};
pub use mobile::{is_mobile, MOBILE_PATTERN};
pub use password::{CurrentPasswordChecker, CurrentPasswordRule, PasswordSlot};

/// A named check applied to one field
#[async_trait]
pub trait Rule: Send + Sync {
    /// Accept or reject the field; `Err` means the check could not run
    async fn check(&self, field: &FieldLevel<'_>) -> Result<bool, RuleError>;
}

/// Plain predicates are rules
#[async_trait]
impl<F> Rule for F
where
    F: Fn(&FieldLevel<'_>) -> bool + Send + Sync,
{
    async fn check(&self, field: &FieldLevel<'_>) -> Result<bool, RuleError> {
        Ok(self(field))
    }
}

/// Adapter for predicates that can reject their param
pub struct FallibleRule<F>(pub F);

#[async_trait]
impl<F> Rule for FallibleRule<F>
where
    F: Fn(&FieldLevel<'_>) -> Result<bool, RuleError> + Send + Sync,
{
    async fn check(&self, field: &FieldLevel<'_>) -> Result<bool, RuleError> {
        (self.0)(field)
    }
}

/// Box a predicate as a shareable rule
pub fn from_fn<F>(f: F) -> Arc<dyn Rule>
where
    F: for<'a, 'b> Fn(&'a FieldLevel<'b>) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Tag name to rule
pub type RuleMap = HashMap<String, Arc<dyn Rule>>;

/// The nullable marker: passes for every value
pub fn nullable(_field: &FieldLevel<'_>) -> bool {
    true
}

/// Fetch the rule param or complain that it is missing
pub(crate) fn required_param<'a>(field: &FieldLevel<'a>, rule: &str) -> Result<&'a str, RuleError> {
    match field.param() {
        Some(param) if !param.trim().is_empty() => Ok(param),
        _ => Err(RuleError::Misuse(format!(
            "rule '{rule}' on field '{}' needs a parameter",
            field.field()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_closure_is_rule() {
        let rule = from_fn(|fl| fl.as_text() == "ok");
        let ok = json!("ok");
        let bad = json!("nope");

        assert!(rule.check(&FieldLevel::new("f", &ok, None, None)).await.unwrap());
        assert!(!rule.check(&FieldLevel::new("f", &bad, None, None)).await.unwrap());
    }

    #[tokio::test]
    async fn test_nullable_always_passes() {
        for value in [json!(null), json!(""), json!("x"), json!(0)] {
            assert!(nullable(&FieldLevel::new("f", &value, None, None)));
        }
    }

    #[test]
    fn test_required_param() {
        let v = json!("x");
        assert!(required_param(&FieldLevel::new("f", &v, None, None), "min").is_err());
        assert!(required_param(&FieldLevel::new("f", &v, Some(" "), None), "min").is_err());
        assert_eq!(
            required_param(&FieldLevel::new("f", &v, Some("3"), None), "min").unwrap(),
            "3"
        );
    }
}
