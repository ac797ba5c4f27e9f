//! Locale translation of rule failures
//!
//! A [`Translator`] holds message tables per locale. Templates may use
//! `{field}`, `{param}` and `{tag}`. Tables for `en` and `fa` ship with the
//! crate; more can be loaded from TOML files shaped like:
//!
//! ```toml
//! locale = "de"
//!
//! [messages]
//! required = "{field} ist ein Pflichtfeld"
//!
//! [attributes]
//! mobile = "Handynummer"
//! ```

use std::collections::HashMap;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{ValidationError, ValidationResult};

lazy_static! {
    static ref WORD_BOUNDARY: Regex = Regex::new(r"(.)([A-Z][a-z]+)").unwrap();
    static ref CASE_BOUNDARY: Regex = Regex::new(r"([a-z0-9])([A-Z])").unwrap();
    static ref PLACEHOLDER: Regex = Regex::new(r"\{(field|param|tag)\}").unwrap();
}

/// `UserID` -> `user_id`, `firstName` -> `first_name`
pub fn to_snake_case(s: &str) -> String {
    let s = WORD_BOUNDARY.replace_all(s, "${1}_${2}");
    let s = CASE_BOUNDARY.replace_all(&s, "${1}_${2}");
    s.replace('-', "_").to_lowercase()
}

/// A single failure awaiting translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Field name as serialized
    pub field: String,
    /// Tag the field failed on, e.g. `required` or `string`
    pub tag: String,
    pub param: Option<String>,
}

impl Failure {
    /// Failure of `field` on `tag`
    pub fn new<F: Into<String>, T: Into<String>>(field: F, tag: T, param: Option<String>) -> Self {
        Self {
            field: field.into(),
            tag: tag.into(),
            param,
        }
    }
}

/// Message table for one locale
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocaleTable {
    pub locale: String,
    #[serde(default)]
    pub messages: HashMap<String, String>,
    /// Display names for fields
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl LocaleTable {
    fn from_pairs(locale: &str, pairs: &[(&str, &str)]) -> Self {
        Self {
            locale: locale.to_string(),
            messages: pairs
                .iter()
                .map(|(tag, template)| (tag.to_string(), template.to_string()))
                .collect(),
            attributes: HashMap::new(),
        }
    }

    /// Parse a TOML table
    pub fn from_toml(source: &str) -> ValidationResult<Self> {
        let table: LocaleTable =
            toml::from_str(source).map_err(|e| ValidationError::Translation(e.to_string()))?;
        if table.locale.trim().is_empty() {
            return Err(ValidationError::Translation(
                "translation table has no locale".to_string(),
            ));
        }
        Ok(table)
    }

    /// Built-in English table
    pub fn english() -> Self {
        Self::from_pairs(
            "en",
            &[
                ("required", "{field} is a required field"),
                ("min", "{field} must be at least {param}"),
                ("max", "{field} must be at most {param}"),
                ("len", "{field} must be exactly {param} in length"),
                ("eq", "{field} is not equal to {param}"),
                ("ne", "{field} should not be equal to {param}"),
                ("gt", "{field} must be greater than {param}"),
                ("gte", "{field} must be at least {param}"),
                ("lt", "{field} must be less than {param}"),
                ("lte", "{field} must be at most {param}"),
                ("oneof", "{field} must be one of [{param}]"),
                ("eqfield", "{field} must be equal to {param}"),
                ("nefield", "{field} cannot be equal to {param}"),
                ("email", "{field} must be a valid email address"),
                ("url", "{field} must be a valid URL"),
                ("ip", "{field} must be a valid IP address"),
                ("ipv4", "{field} must be a valid IPv4 address"),
                ("ipv6", "{field} must be a valid IPv6 address"),
                ("uuid", "{field} must be a valid UUID"),
                ("numeric", "{field} must be a valid numeric value"),
                ("number", "{field} must be a valid number"),
                ("alpha", "{field} can only contain alphabetic characters"),
                ("alphanum", "{field} can only contain alphanumeric characters"),
                ("alphaunicode", "{field} can only contain letters"),
                ("alphanumunicode", "{field} can only contain letters and digits"),
                ("ascii", "{field} must contain only ascii characters"),
                ("string", "{field} must be a valid string"),
                ("exists", "the selected {field} does not exist"),
                ("uq", "{field} has already been taken"),
                ("current_password", "{field} does not match your current password"),
                ("mobile", "{field} must be a valid mobile number"),
            ],
        )
    }

    /// Built-in Persian table
    pub fn persian() -> Self {
        Self::from_pairs(
            "fa",
            &[
                ("required", "فیلد {field} اجباری است"),
                ("min", "{field} باید حداقل {param} باشد"),
                ("max", "{field} باید حداکثر {param} باشد"),
                ("len", "طول {field} باید دقیقا {param} باشد"),
                ("eq", "{field} باید برابر با {param} باشد"),
                ("ne", "{field} نباید برابر با {param} باشد"),
                ("gt", "{field} باید بزرگتر از {param} باشد"),
                ("gte", "{field} باید حداقل {param} باشد"),
                ("lt", "{field} باید کوچکتر از {param} باشد"),
                ("lte", "{field} باید حداکثر {param} باشد"),
                ("oneof", "{field} باید یکی از مقادیر [{param}] باشد"),
                ("eqfield", "{field} باید با {param} یکسان باشد"),
                ("nefield", "{field} نباید با {param} یکسان باشد"),
                ("email", "{field} باید یک ایمیل معتبر باشد"),
                ("url", "{field} باید یک آدرس اینترنتی معتبر باشد"),
                ("ip", "{field} باید یک آدرس IP معتبر باشد"),
                ("ipv4", "{field} باید یک آدرس IPv4 معتبر باشد"),
                ("ipv6", "{field} باید یک آدرس IPv6 معتبر باشد"),
                ("uuid", "{field} باید یک UUID معتبر باشد"),
                ("numeric", "{field} باید یک مقدار عددی معتبر باشد"),
                ("number", "{field} باید یک عدد معتبر باشد"),
                ("alpha", "{field} فقط می‌تواند شامل حروف انگلیسی باشد"),
                ("alphanum", "{field} فقط می‌تواند شامل حروف و اعداد انگلیسی باشد"),
                ("alphaunicode", "{field} فقط می‌تواند شامل حروف باشد"),
                ("alphanumunicode", "{field} فقط می‌تواند شامل حروف و اعداد باشد"),
                ("ascii", "{field} فقط می‌تواند شامل کاراکترهای ascii باشد"),
                ("string", "{field} باید یک رشته معتبر باشد"),
                ("exists", "{field} انتخاب شده وجود ندارد"),
                ("uq", "{field} قبلا ثبت شده است"),
                ("current_password", "{field} با رمز عبور فعلی شما مطابقت ندارد"),
                ("mobile", "{field} باید یک شماره موبایل معتبر باشد"),
            ],
        )
    }

    fn fallback_template(&self) -> &'static str {
        match self.locale.as_str() {
            "fa" => "{field} نامعتبر است",
            _ => "{field} failed on the '{tag}' rule",
        }
    }
}

/// Turns failures into messages in the configured locale
#[derive(Debug, Clone)]
pub struct Translator {
    locale: String,
    fallback_locale: String,
    tables: HashMap<String, LocaleTable>,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new("fa", "en")
    }
}

impl Translator {
    /// Translator with the built-in tables
    pub fn new(locale: &str, fallback_locale: &str) -> Self {
        let mut tables = HashMap::new();
        for table in [LocaleTable::english(), LocaleTable::persian()] {
            tables.insert(table.locale.clone(), table);
        }

        if !tables.contains_key(locale) {
            warn!(locale, "no built-in messages for locale");
        }

        Self {
            locale: locale.to_string(),
            fallback_locale: fallback_locale.to_string(),
            tables,
        }
    }

    /// Main locale
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Locale consulted when the main one has no message
    pub fn fallback_locale(&self) -> &str {
        &self.fallback_locale
    }

    /// Whether a table is loaded for `locale`
    pub fn has_locale(&self, locale: &str) -> bool {
        self.tables.contains_key(locale)
    }

    /// Merge a table over any existing table for the same locale
    pub fn add_table(&mut self, table: LocaleTable) {
        let entry = self
            .tables
            .entry(table.locale.clone())
            .or_insert_with(|| LocaleTable {
                locale: table.locale.clone(),
                ..LocaleTable::default()
            });
        entry.messages.extend(table.messages);
        entry.attributes.extend(table.attributes);
    }

    /// Override one message template
    pub fn add_message(&mut self, locale: &str, tag: &str, template: &str) {
        let mut table = LocaleTable {
            locale: locale.to_string(),
            ..LocaleTable::default()
        };
        table.messages.insert(tag.to_string(), template.to_string());
        self.add_table(table);
    }

    /// Set the display name of a field
    pub fn add_attribute(&mut self, locale: &str, field: &str, display: &str) {
        let mut table = LocaleTable {
            locale: locale.to_string(),
            ..LocaleTable::default()
        };
        table.attributes.insert(field.to_string(), display.to_string());
        self.add_table(table);
    }

    /// Load one TOML table from a file
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> ValidationResult<()> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::Translation(format!("cannot read {}: {}", path.display(), e))
        })?;
        let table = LocaleTable::from_toml(&source)?;
        debug!(locale = %table.locale, path = %path.display(), "loaded translation table");
        self.add_table(table);
        Ok(())
    }

    /// Load every `*.toml` file in a directory
    pub fn load_dir<P: AsRef<Path>>(&mut self, dir: P) -> ValidationResult<usize> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            ValidationError::Translation(format!("cannot read {}: {}", dir.display(), e))
        })?;

        let mut loaded = 0;
        for entry in entries {
            let path = entry
                .map_err(|e| ValidationError::Translation(e.to_string()))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("toml") {
                self.load_file(&path)?;
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    fn template(&self, tag: &str) -> &str {
        for locale in [&self.locale, &self.fallback_locale] {
            if let Some(template) = self
                .tables
                .get(locale)
                .and_then(|table| table.messages.get(tag))
            {
                return template;
            }
        }

        // No message anywhere: generic wording in the main locale if known
        self.tables
            .get(&self.locale)
            .or_else(|| self.tables.get(&self.fallback_locale))
            .map(LocaleTable::fallback_template)
            .unwrap_or("{field} failed on the '{tag}' rule")
    }

    fn display_name(&self, field: &str) -> String {
        for locale in [&self.locale, &self.fallback_locale] {
            if let Some(name) = self
                .tables
                .get(locale)
                .and_then(|table| table.attributes.get(field))
            {
                return name.clone();
            }
        }
        field.to_string()
    }

    /// Render the message for one failure
    pub fn translate(&self, failure: &Failure) -> String {
        let key = to_snake_case(&failure.field);
        let template = self.template(&failure.tag);
        let param = failure
            .param
            .as_deref()
            .map(|p| self.param_display(&failure.tag, p))
            .unwrap_or_default();

        let field = self.display_name(&key);

        // One pass, so substituted text is never expanded again
        PLACEHOLDER
            .replace_all(template, |caps: &regex::Captures<'_>| match &caps[1] {
                "field" => field.clone(),
                "param" => param.clone(),
                _ => failure.tag.clone(),
            })
            .into_owned()
    }

    /// Field-comparison params name another field
    fn param_display(&self, tag: &str, param: &str) -> String {
        match tag {
            "eqfield" | "nefield" => self.display_name(&to_snake_case(param)),
            _ => param.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_case::test_case;

    #[test_case("UserID", "user_id" ; "acronym suffix")]
    #[test_case("userId", "user_id" ; "camel case")]
    #[test_case("FirstName", "first_name" ; "pascal case")]
    #[test_case("HTTPServer", "http_server" ; "acronym prefix")]
    #[test_case("mobile", "mobile" ; "already snake")]
    #[test_case("password_confirmation", "password_confirmation" ; "underscored")]
    fn test_to_snake_case(input: &str, expected: &str) {
        assert_eq!(to_snake_case(input), expected);
    }

    #[test]
    fn test_translate_english() {
        let translator = Translator::new("en", "en");
        let msg = translator.translate(&Failure::new("Name", "min", Some("3".to_string())));
        assert_eq!(msg, "name must be at least 3");
    }

    #[test]
    fn test_substituted_text_is_not_expanded_again() {
        let translator = Translator::new("en", "en");
        let msg = translator.translate(&Failure::new(
            "color",
            "oneof",
            Some("{tag} {field}".to_string()),
        ));
        assert_eq!(msg, "color must be one of [{tag} {field}]");
    }

    #[test]
    fn test_translate_persian_default() {
        let translator = Translator::default();
        let msg = translator.translate(&Failure::new("mobile", "mobile", None));
        assert_eq!(msg, "mobile باید یک شماره موبایل معتبر باشد");
    }

    #[test]
    fn test_fallback_locale_and_generic_message() {
        let mut translator = Translator::new("fa", "en");
        translator.add_message("en", "even", "{field} must be even");
        assert_eq!(
            translator.translate(&Failure::new("count", "even", None)),
            "count must be even"
        );

        let translator = Translator::new("en", "en");
        assert_eq!(
            translator.translate(&Failure::new("count", "odd", None)),
            "count failed on the 'odd' rule"
        );
    }

    #[test]
    fn test_unknown_locale_uses_fallback() {
        let translator = Translator::new("de", "en");
        assert!(!translator.has_locale("de"));
        assert_eq!(
            translator.translate(&Failure::new("email", "required", None)),
            "email is a required field"
        );
    }

    #[test]
    fn test_attributes_rename_fields() {
        let mut translator = Translator::new("fa", "en");
        translator.add_attribute("fa", "mobile", "شماره موبایل");
        assert_eq!(
            translator.translate(&Failure::new("mobile", "required", None)),
            "فیلد شماره موبایل اجباری است"
        );
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
locale = "de"

[messages]
required = "{{field}} ist ein Pflichtfeld"

[attributes]
mobile = "Handynummer"
"#
        )
        .unwrap();

        let mut translator = Translator::new("de", "en");
        translator.load_file(file.path()).unwrap();

        assert!(translator.has_locale("de"));
        assert_eq!(
            translator.translate(&Failure::new("mobile", "required", None)),
            "Handynummer ist ein Pflichtfeld"
        );
        assert_eq!(
            translator.translate(&Failure::new("mobile", "mobile", None)),
            "Handynummer must be a valid mobile number"
        );
    }

    #[test]
    fn test_load_dir_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("en.toml"),
            "locale = \"en\"\n[messages]\nmobile = \"{field} is not a mobile\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut translator = Translator::new("en", "en");
        assert_eq!(translator.load_dir(dir.path()).unwrap(), 1);
        assert_eq!(
            translator.translate(&Failure::new("mobile", "mobile", None)),
            "mobile is not a mobile"
        );
    }

    #[test]
    fn test_bad_toml_is_rejected() {
        assert!(LocaleTable::from_toml("messages = 3").is_err());
        assert!(LocaleTable::from_toml("locale = \"\"").is_err());
    }
}
