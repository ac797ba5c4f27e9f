//! The validator instance
//!
//! [`Validation`] owns the rule registry, aliases and translator. The
//! current-password checker is process-wide and shared by every instance.
//! A process-wide instance is set up once with
//! [`Validation::init`]; independent instances can be built with
//! [`Validation::new`] for tests or multi-tenant hosts.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::errors::{FieldErrors, RuleError, ValidationError, ValidationResult};
use crate::field::{is_empty_value, FieldLevel};
use crate::rules::{
    self, general, mobile, CurrentPasswordChecker, CurrentPasswordRule, InMemoryRecordLookup,
    PasswordSlot, PgRecordLookup, RecordLookup, RecordRule, Rule, RuleMap,
};
use crate::schema::Validate;
use crate::settings::ValidationSettings;
use crate::tags::{parse_tag, Segment, OMIT_EMPTY};
use crate::translation::{to_snake_case, Failure, Translator};

/// Alias registered at startup
pub const STRING_ALIAS: (&str, &str) = ("string", "alphanumunicode|alphaunicode|ascii");

static INSTANCE: OnceCell<Validation> = OnceCell::new();

/// Collects failures reported by struct-level validators
#[derive(Debug)]
pub struct StructLevel<'a> {
    fields: &'a Map<String, Value>,
    failures: Vec<Failure>,
}

impl<'a> StructLevel<'a> {
    fn new(fields: &'a Map<String, Value>) -> Self {
        Self {
            fields,
            failures: Vec::new(),
        }
    }

    /// Serialized value of a field
    pub fn field(&self, name: &str) -> Option<&'a Value> {
        self.fields.get(name)
    }

    /// Record a failure to be translated like a field rule failure
    pub fn report_error(&mut self, field: &str, tag: &str, param: Option<&str>) {
        self.failures
            .push(Failure::new(field, tag, param.map(str::to_string)));
    }
}

trait StructRule: Send + Sync {
    fn run(&self, value: &dyn Any, level: &mut StructLevel<'_>);
}

struct TypedStructRule<T, F> {
    f: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> StructRule for TypedStructRule<T, F>
where
    T: 'static,
    F: Fn(&T, &mut StructLevel<'_>) + Send + Sync,
{
    fn run(&self, value: &dyn Any, level: &mut StructLevel<'_>) {
        if let Some(value) = value.downcast_ref::<T>() {
            (self.f)(value, level);
        }
    }
}

/// Rule registry and entry points
pub struct Validation {
    rules: RwLock<RuleMap>,
    aliases: RwLock<HashMap<String, String>>,
    struct_rules: RwLock<HashMap<TypeId, Arc<dyn StructRule>>>,
    translator: Translator,
    passwords: PasswordSlot,
}

impl std::fmt::Debug for Validation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validation")
            .field("locale", &self.translator.locale())
            .field("passwords", &self.passwords)
            .finish()
    }
}

impl Validation {
    /// Instance with the built-in translator (`fa`, falling back to `en`)
    pub fn new(lookup: Arc<dyn RecordLookup>) -> Self {
        Self::with_translator(lookup, Translator::default())
    }

    /// Instance with a caller-supplied translator
    pub fn with_translator(lookup: Arc<dyn RecordLookup>, translator: Translator) -> Self {
        let passwords = PasswordSlot::shared();

        let mut registry = RuleMap::new();
        general::register_all(&mut registry);
        registry.insert("nullable".to_string(), Arc::new(rules::nullable));
        registry.insert("mobile".to_string(), Arc::new(mobile::mobile));
        registry.insert(
            "exists".to_string(),
            Arc::new(RecordRule::exists(lookup.clone())),
        );
        registry.insert("uq".to_string(), Arc::new(RecordRule::unique(lookup)));
        registry.insert(
            "current_password".to_string(),
            Arc::new(CurrentPasswordRule::new(passwords.clone())),
        );

        let mut aliases = HashMap::new();
        aliases.insert(STRING_ALIAS.0.to_string(), STRING_ALIAS.1.to_string());

        Self {
            rules: RwLock::new(registry),
            aliases: RwLock::new(aliases),
            struct_rules: RwLock::new(HashMap::new()),
            translator,
            passwords,
        }
    }

    /// Build from settings: connects PostgreSQL when a URL is set and
    /// loads extra translation tables
    pub async fn from_settings(settings: &ValidationSettings) -> ValidationResult<Self> {
        let lookup: Arc<dyn RecordLookup> = match &settings.database_url {
            Some(url) => Arc::new(
                PgRecordLookup::connect(url, settings.max_connections)
                    .await
                    .map_err(|e| ValidationError::Config(format!("{:#}", e)))?,
            ),
            None => {
                warn!("no database_url configured, exists/uq use an empty in-memory lookup");
                Arc::new(InMemoryRecordLookup::new())
            }
        };

        let mut translator = Translator::new(&settings.locale, &settings.fallback_locale);
        if let Some(dir) = &settings.translations_dir {
            let loaded = translator.load_dir(dir)?;
            info!(loaded, dir = %dir.display(), "loaded translation tables");
        }

        Ok(Self::with_translator(lookup, translator))
    }

    /// Set up the process-wide instance; later calls return the first one
    pub fn init(lookup: Arc<dyn RecordLookup>) -> &'static Validation {
        INSTANCE.get_or_init(|| {
            info!("validation initialized");
            Validation::new(lookup)
        })
    }

    /// Like [`init`](Self::init), building the instance from settings
    pub async fn init_from_settings(
        settings: &ValidationSettings,
    ) -> ValidationResult<&'static Validation> {
        if let Some(existing) = INSTANCE.get() {
            return Ok(existing);
        }

        let validation = Validation::from_settings(settings).await?;
        Ok(INSTANCE.get_or_init(|| {
            info!(locale = %settings.locale, "validation initialized");
            validation
        }))
    }

    /// The process-wide instance, if initialized
    pub fn global() -> Option<&'static Validation> {
        INSTANCE.get()
    }

    /// Translator used for failure messages
    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Register a rule under a tag name, replacing any existing one
    pub fn register_validation<R>(&self, name: &str, rule: R) -> ValidationResult<()>
    where
        R: Rule + 'static,
    {
        self.insert_rule(name, Arc::new(rule))
    }

    /// Register a plain predicate as a rule
    pub fn register_validation_fn<F>(&self, name: &str, f: F) -> ValidationResult<()>
    where
        F: for<'a, 'b> Fn(&'a FieldLevel<'b>) -> bool + Send + Sync + 'static,
    {
        self.insert_rule(name, rules::from_fn(f))
    }

    fn insert_rule(&self, name: &str, rule: Arc<dyn Rule>) -> ValidationResult<()> {
        check_tag_name(name)?;
        self.rules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), rule);
        debug!(rule = name, "registered validation");
        Ok(())
    }

    /// Make `alias` stand for `tags` wherever it appears as a segment
    pub fn register_alias(&self, alias: &str, tags: &str) -> ValidationResult<()> {
        check_tag_name(alias)?;
        self.aliases
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(alias.to_string(), tags.to_string());
        Ok(())
    }

    /// Add a whole-struct check for `T`, run after its field rules
    pub fn register_struct_validation<T, F>(&self, f: F)
    where
        T: 'static,
        F: Fn(&T, &mut StructLevel<'_>) + Send + Sync + 'static,
    {
        let rule = TypedStructRule {
            f,
            _marker: PhantomData,
        };
        self.struct_rules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(TypeId::of::<T>(), Arc::new(rule));
    }

    /// Install the host's current-password checker for every instance
    pub fn register_app_dependencies<C>(&self, checker: C)
    where
        C: CurrentPasswordChecker + 'static,
    {
        self.passwords.set(Arc::new(checker));
        info!("current password checker registered");
    }

    /// Validate a struct against its declared rules
    ///
    /// Every field named in the rules must be present in the serialized
    /// struct; a `None` that serializes as `null` counts, a field skipped
    /// by `skip_serializing_if` is misuse.
    pub async fn validate<T: Validate>(&self, input: &T) -> ValidationResult<()> {
        let value = serde_json::to_value(input)
            .map_err(|e| self.misuse(format!("cannot serialize input: {e}")))?;
        let Value::Object(fields) = value else {
            return Err(self.misuse("validate expects a struct with named fields"));
        };

        let mut failures = Vec::new();
        for (field, tag) in T::rules().iter() {
            let segments = self.parse(tag)?;
            let Some(value) = fields.get(field) else {
                return Err(self.misuse(format!("unknown field '{field}'")));
            };
            if let Some(failure) = self
                .run_field(field, value, Some(&fields), &segments)
                .await?
            {
                failures.push(failure);
            }
        }

        let struct_rule = self
            .struct_rules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<T>())
            .cloned();
        if let Some(struct_rule) = struct_rule {
            let mut level = StructLevel::new(&fields);
            struct_rule.run(input, &mut level);
            failures.extend(level.failures);
        }

        self.finish(failures)
    }

    /// Validate a single value against a tag
    ///
    /// Failures are keyed by the empty field name.
    pub async fn var_validate<V: Serialize>(&self, value: V, tag: &str) -> ValidationResult<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| self.misuse(format!("cannot serialize value: {e}")))?;
        let segments = self.parse(tag)?;

        let failures = self
            .run_field("", &value, None, &segments)
            .await?
            .into_iter()
            .collect();
        self.finish(failures)
    }

    fn parse(&self, tag: &str) -> ValidationResult<Vec<Segment>> {
        let aliases = self.aliases.read().unwrap_or_else(|e| e.into_inner());
        parse_tag(tag, &aliases).map_err(|e| self.misuse(e.to_string()))
    }

    fn rule(&self, name: &str) -> ValidationResult<Arc<dyn Rule>> {
        self.rules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| self.misuse(format!("undefined validation rule '{name}'")))
    }

    /// Run a field's segments, stopping at the first one that fails
    async fn run_field(
        &self,
        field: &str,
        value: &Value,
        parent: Option<&Map<String, Value>>,
        segments: &[Segment],
    ) -> ValidationResult<Option<Failure>> {
        for segment in segments {
            if segment.is_omit_empty() {
                if is_empty_value(value) {
                    return Ok(None);
                }
                continue;
            }

            let mut passed = false;
            for call in &segment.alternatives {
                let rule = self.rule(&call.name)?;
                let level = FieldLevel::new(field, value, call.param.as_deref(), parent);
                match rule.check(&level).await {
                    Ok(true) => {
                        passed = true;
                        break;
                    }
                    Ok(false) => {}
                    Err(RuleError::Misuse(detail)) => return Err(self.misuse(detail)),
                    Err(RuleError::Lookup(reason)) => {
                        return Err(ValidationError::Lookup {
                            rule: call.name.clone(),
                            reason,
                        })
                    }
                }
            }

            if !passed {
                debug!(field, tag = %segment.tag, "field failed validation");
                return Ok(Some(Failure::new(
                    field,
                    segment.tag.clone(),
                    segment.param.clone(),
                )));
            }
        }

        Ok(None)
    }

    fn finish(&self, failures: Vec<Failure>) -> ValidationResult<()> {
        if failures.is_empty() {
            return Ok(());
        }

        let mut errors = FieldErrors::new();
        for failure in &failures {
            errors.add(
                to_snake_case(&failure.field),
                self.translator.translate(failure),
            );
        }
        Err(ValidationError::Failed(errors))
    }

    fn misuse<S: Into<String>>(&self, detail: S) -> ValidationError {
        let detail = detail.into();
        warn!(%detail, "validation misuse");
        ValidationError::Misuse(detail)
    }
}

fn check_tag_name(name: &str) -> ValidationResult<()> {
    let invalid = name.is_empty()
        || name == OMIT_EMPTY
        || name.contains([',', '|', '=', ';'])
        || name.chars().any(char::is_whitespace);
    if invalid {
        return Err(ValidationError::misuse(format!(
            "'{name}' cannot be used as a rule name"
        )));
    }
    Ok(())
}
