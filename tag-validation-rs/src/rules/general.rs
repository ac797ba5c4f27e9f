//! General-purpose rules
//!
//! Size rules (`min`, `max`, `len`, `gt`, ...) compare numbers by value,
//! strings by character count and arrays or objects by item count.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::{required_param, FallibleRule, Rule, RuleMap};
use crate::errors::RuleError;
use crate::field::{is_empty_value, FieldLevel};

use std::sync::Arc;

lazy_static! {
    static ref ALPHA: Regex = Regex::new(r"^[a-zA-Z]+$").unwrap();
    static ref ALPHANUM: Regex = Regex::new(r"^[a-zA-Z0-9]+$").unwrap();
    static ref ALPHA_UNICODE: Regex = Regex::new(r"^\p{L}+$").unwrap();
    static ref ALPHANUM_UNICODE: Regex = Regex::new(r"^[\p{L}\p{N}]+$").unwrap();
    static ref ASCII: Regex = Regex::new(r"^[\x00-\x7F]*$").unwrap();
    static ref NUMERIC: Regex = Regex::new(r"^[-+]?[0-9]+(?:\.[0-9]+)?$").unwrap();
    static ref NUMBER: Regex = Regex::new(r"^[0-9]+$").unwrap();
}

/// Register every general rule into `rules`
pub fn register_all(rules: &mut RuleMap) {
    add(rules, "required", Arc::new(required));
    add(rules, "min", Arc::new(FallibleRule(min)));
    add(rules, "max", Arc::new(FallibleRule(max)));
    add(rules, "len", Arc::new(FallibleRule(len)));
    add(rules, "eq", Arc::new(FallibleRule(eq)));
    add(rules, "ne", Arc::new(FallibleRule(ne)));
    add(rules, "gt", Arc::new(FallibleRule(gt)));
    add(rules, "gte", Arc::new(FallibleRule(gte)));
    add(rules, "lt", Arc::new(FallibleRule(lt)));
    add(rules, "lte", Arc::new(FallibleRule(lte)));
    add(rules, "oneof", Arc::new(FallibleRule(one_of)));
    add(rules, "eqfield", Arc::new(FallibleRule(eq_field)));
    add(rules, "nefield", Arc::new(FallibleRule(ne_field)));
    add(rules, "email", Arc::new(email));
    add(rules, "url", Arc::new(url));
    add(rules, "ip", Arc::new(ip));
    add(rules, "ipv4", Arc::new(ipv4));
    add(rules, "ipv6", Arc::new(ipv6));
    add(rules, "uuid", Arc::new(is_uuid));
    add(rules, "numeric", Arc::new(numeric));
    add(rules, "number", Arc::new(number));
    add(rules, "alpha", Arc::new(alpha));
    add(rules, "alphanum", Arc::new(alphanum));
    add(rules, "alphaunicode", Arc::new(alpha_unicode));
    add(rules, "alphanumunicode", Arc::new(alphanum_unicode));
    add(rules, "ascii", Arc::new(ascii));
}

fn add(rules: &mut RuleMap, name: &str, rule: Arc<dyn Rule>) {
    rules.insert(name.to_string(), rule);
}

/// Numeric size of a value for the size rules
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(items) => Some(items.len() as f64),
        Value::Object(map) => Some(map.len() as f64),
        Value::Null => Some(0.0),
        Value::Bool(_) => None,
    }
}

fn size_param(field: &FieldLevel<'_>, rule: &str) -> Result<(f64, f64), RuleError> {
    let param = required_param(field, rule)?;
    let limit = param.trim().parse::<f64>().map_err(|_| {
        RuleError::Misuse(format!(
            "rule '{rule}' on field '{}' has non-numeric parameter '{param}'",
            field.field()
        ))
    })?;
    let size = measure(field.value()).ok_or_else(|| {
        RuleError::Misuse(format!(
            "rule '{rule}' cannot size field '{}'",
            field.field()
        ))
    })?;
    Ok((size, limit))
}

/// Value is present and not its type's zero value
pub fn required(field: &FieldLevel<'_>) -> bool {
    !is_empty_value(field.value())
}

/// Length for strings and collections, magnitude for numbers, at least the param
pub fn min(field: &FieldLevel<'_>) -> Result<bool, RuleError> {
    let (size, limit) = size_param(field, "min")?;
    Ok(size >= limit)
}

/// Length or magnitude at most the param
pub fn max(field: &FieldLevel<'_>) -> Result<bool, RuleError> {
    let (size, limit) = size_param(field, "max")?;
    Ok(size <= limit)
}

/// Length or magnitude exactly the param
pub fn len(field: &FieldLevel<'_>) -> Result<bool, RuleError> {
    let (size, limit) = size_param(field, "len")?;
    Ok(size == limit)
}

/// Length or magnitude greater than the param
pub fn gt(field: &FieldLevel<'_>) -> Result<bool, RuleError> {
    let (size, limit) = size_param(field, "gt")?;
    Ok(size > limit)
}

/// Length or magnitude greater than or equal to the param
pub fn gte(field: &FieldLevel<'_>) -> Result<bool, RuleError> {
    let (size, limit) = size_param(field, "gte")?;
    Ok(size >= limit)
}

/// Length or magnitude less than the param
pub fn lt(field: &FieldLevel<'_>) -> Result<bool, RuleError> {
    let (size, limit) = size_param(field, "lt")?;
    Ok(size < limit)
}

/// Length or magnitude less than or equal to the param
pub fn lte(field: &FieldLevel<'_>) -> Result<bool, RuleError> {
    let (size, limit) = size_param(field, "lte")?;
    Ok(size <= limit)
}

/// Strings compare by content, everything else by size
pub fn eq(field: &FieldLevel<'_>) -> Result<bool, RuleError> {
    match field.value() {
        Value::String(s) => Ok(s == required_param(field, "eq")?),
        _ => {
            let (size, limit) = size_param(field, "eq")?;
            Ok(size == limit)
        }
    }
}

/// Strings differ from the param by content, everything else by size
pub fn ne(field: &FieldLevel<'_>) -> Result<bool, RuleError> {
    match field.value() {
        Value::String(s) => Ok(s != required_param(field, "ne")?),
        _ => {
            let (size, limit) = size_param(field, "ne")?;
            Ok(size != limit)
        }
    }
}

/// Text form is one of the space-separated param values
pub fn one_of(field: &FieldLevel<'_>) -> Result<bool, RuleError> {
    let options = required_param(field, "oneof")?;
    if !matches!(field.value(), Value::String(_) | Value::Number(_)) {
        return Ok(false);
    }
    let text = field.as_text();
    Ok(options.split_whitespace().any(|option| option == text))
}

/// Equal to the sibling field named by the param
pub fn eq_field(field: &FieldLevel<'_>) -> Result<bool, RuleError> {
    let other = required_param(field, "eqfield")?;
    Ok(field.sibling(other) == Some(field.value()))
}

/// Different from the sibling field named by the param
pub fn ne_field(field: &FieldLevel<'_>) -> Result<bool, RuleError> {
    let other = required_param(field, "nefield")?;
    Ok(field.sibling(other) != Some(field.value()))
}

fn text_of<'a>(field: &'a FieldLevel<'_>) -> Option<&'a str> {
    field.value().as_str()
}

/// Valid email address
pub fn email(field: &FieldLevel<'_>) -> bool {
    text_of(field).map(validator::validate_email).unwrap_or(false)
}

/// Valid absolute URL
pub fn url(field: &FieldLevel<'_>) -> bool {
    text_of(field).map(validator::validate_url).unwrap_or(false)
}

/// IPv4 or IPv6 address
pub fn ip(field: &FieldLevel<'_>) -> bool {
    text_of(field).map(validator::validate_ip).unwrap_or(false)
}

/// IPv4 address
pub fn ipv4(field: &FieldLevel<'_>) -> bool {
    text_of(field).map(validator::validate_ip_v4).unwrap_or(false)
}

/// IPv6 address
pub fn ipv6(field: &FieldLevel<'_>) -> bool {
    text_of(field).map(validator::validate_ip_v6).unwrap_or(false)
}

/// UUID in any of its textual forms
pub fn is_uuid(field: &FieldLevel<'_>) -> bool {
    text_of(field)
        .map(|s| uuid::Uuid::parse_str(s).is_ok())
        .unwrap_or(false)
}

/// Numbers pass outright; strings must look like a decimal
pub fn numeric(field: &FieldLevel<'_>) -> bool {
    match field.value() {
        Value::Number(_) => true,
        Value::String(s) => NUMERIC.is_match(s),
        _ => false,
    }
}

/// Unsigned integer digits, or a JSON number that is one
pub fn number(field: &FieldLevel<'_>) -> bool {
    match field.value() {
        Value::Number(n) => n.is_u64(),
        Value::String(s) => NUMBER.is_match(s),
        _ => false,
    }
}

fn matches(field: &FieldLevel<'_>, re: &Regex) -> bool {
    text_of(field).map(|s| re.is_match(s)).unwrap_or(false)
}

/// ASCII letters only
pub fn alpha(field: &FieldLevel<'_>) -> bool {
    matches(field, &ALPHA)
}

/// ASCII letters and digits only
pub fn alphanum(field: &FieldLevel<'_>) -> bool {
    matches(field, &ALPHANUM)
}

/// Unicode letters only
pub fn alpha_unicode(field: &FieldLevel<'_>) -> bool {
    matches(field, &ALPHA_UNICODE)
}

/// Unicode letters and digits only
pub fn alphanum_unicode(field: &FieldLevel<'_>) -> bool {
    matches(field, &ALPHANUM_UNICODE)
}

/// ASCII characters only
pub fn ascii(field: &FieldLevel<'_>) -> bool {
    matches(field, &ASCII)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn fl<'a>(value: &'a Value, param: Option<&'a str>) -> FieldLevel<'a> {
        FieldLevel::new("field", value, param, None)
    }

    #[test]
    fn test_required() {
        assert!(required(&fl(&json!("x"), None)));
        assert!(!required(&fl(&json!(""), None)));
        assert!(!required(&fl(&json!(null), None)));
        assert!(!required(&fl(&json!(0), None)));
    }

    #[test_case(json!("hello"), "3", true ; "string long enough")]
    #[test_case(json!("hi"), "3", false ; "string too short")]
    #[test_case(json!("سلام"), "4", true ; "counts characters not bytes")]
    #[test_case(json!(10), "10", true ; "number at limit")]
    #[test_case(json!(9.5), "10", false ; "number below limit")]
    #[test_case(json!([1, 2]), "3", false ; "array too short")]
    fn test_min(value: Value, param: &str, expected: bool) {
        assert_eq!(min(&fl(&value, Some(param))).unwrap(), expected);
    }

    #[test]
    fn test_size_rules() {
        let v = json!("abcd");
        assert!(max(&fl(&v, Some("4"))).unwrap());
        assert!(len(&fl(&v, Some("4"))).unwrap());
        assert!(!gt(&fl(&v, Some("4"))).unwrap());
        assert!(gte(&fl(&v, Some("4"))).unwrap());
        assert!(lt(&fl(&v, Some("5"))).unwrap());
        assert!(lte(&fl(&v, Some("3"))).is_ok_and(|ok| !ok));
    }

    #[test]
    fn test_size_rule_misuse() {
        let v = json!("abc");
        assert!(min(&fl(&v, None)).is_err());
        assert!(min(&fl(&v, Some("three"))).is_err());
        assert!(min(&fl(&json!(true), Some("1"))).is_err());
    }

    #[test]
    fn test_eq_and_ne() {
        assert!(eq(&fl(&json!("admin"), Some("admin"))).unwrap());
        assert!(!eq(&fl(&json!("user"), Some("admin"))).unwrap());
        assert!(eq(&fl(&json!(5), Some("5"))).unwrap());
        assert!(ne(&fl(&json!("user"), Some("admin"))).unwrap());
    }

    #[test]
    fn test_one_of() {
        assert!(one_of(&fl(&json!("red"), Some("red green blue"))).unwrap());
        assert!(!one_of(&fl(&json!("pink"), Some("red green blue"))).unwrap());
        assert!(one_of(&fl(&json!(2), Some("1 2 3"))).unwrap());
    }

    #[test]
    fn test_field_comparisons() {
        let parent = json!({"password": "s3cret", "password_confirmation": "s3cret"});
        let parent = parent.as_object().unwrap();
        let value = parent.get("password_confirmation").unwrap();
        let field = FieldLevel::new("password_confirmation", value, Some("password"), Some(parent));

        assert!(eq_field(&field).unwrap());
        assert!(!ne_field(&field).unwrap());
    }

    #[test]
    fn test_format_rules() {
        assert!(email(&fl(&json!("user@example.com"), None)));
        assert!(!email(&fl(&json!("not-an-email"), None)));
        assert!(url(&fl(&json!("https://example.com/a"), None)));
        assert!(!url(&fl(&json!("example"), None)));
        assert!(ip(&fl(&json!("192.168.1.1"), None)));
        assert!(ipv6(&fl(&json!("::1"), None)));
        assert!(!ipv4(&fl(&json!("::1"), None)));
        assert!(is_uuid(&fl(&json!("550e8400-e29b-41d4-a716-446655440000"), None)));
        assert!(!email(&fl(&json!(12), None)));
    }

    #[test]
    fn test_character_classes() {
        assert!(alpha(&fl(&json!("abc"), None)));
        assert!(!alpha(&fl(&json!("abc1"), None)));
        assert!(alphanum(&fl(&json!("abc1"), None)));
        assert!(alpha_unicode(&fl(&json!("سلام"), None)));
        assert!(alphanum_unicode(&fl(&json!("سلام۱۲"), None)));
        assert!(ascii(&fl(&json!("plain text!"), None)));
        assert!(!ascii(&fl(&json!("سلام"), None)));
        assert!(numeric(&fl(&json!("-12.5"), None)));
        assert!(!numeric(&fl(&json!("12a"), None)));
        assert!(number(&fl(&json!("0912"), None)));
        assert!(!number(&fl(&json!(-3), None)));
    }
}
