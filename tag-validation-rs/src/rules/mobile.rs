//! Iranian mobile numbers: `09` followed by nine digits

use lazy_static::lazy_static;
use regex::Regex;

use crate::field::FieldLevel;

/// Iranian mobile numbers: `09` followed by nine digits
pub const MOBILE_PATTERN: &str = r"^09\d{9}$";

lazy_static! {
    static ref MOBILE_REGEX: Regex = Regex::new(MOBILE_PATTERN).unwrap();
}

/// Whether `s` is a mobile number in ASCII digits
pub fn is_mobile(s: &str) -> bool {
    // \d is Unicode-aware, so restrict to ASCII before matching
    s.is_ascii() && MOBILE_REGEX.is_match(s)
}

/// The `mobile` rule
pub fn mobile(field: &FieldLevel<'_>) -> bool {
    is_mobile(&field.as_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("09121234567", true ; "valid number")]
    #[test_case("09350000000", true ; "another operator")]
    #[test_case("0912123456", false ; "ten digits")]
    #[test_case("091212345678", false ; "twelve digits")]
    #[test_case("08121234567", false ; "wrong prefix")]
    #[test_case("+989121234567", false ; "international form")]
    #[test_case("0912123456a", false ; "letter")]
    #[test_case("۰۹۱۲۱۲۳۴۵۶۷", false ; "persian digits")]
    #[test_case("", false ; "empty")]
    fn test_is_mobile(input: &str, expected: bool) {
        assert_eq!(is_mobile(input), expected);
    }

    #[test]
    fn test_mobile_rule_reads_field_text() {
        let v = json!("09121234567");
        assert!(mobile(&FieldLevel::new("mobile", &v, None, None)));
        let v = json!(9121234567u64);
        assert!(!mobile(&FieldLevel::new("mobile", &v, None, None)));
    }
}
