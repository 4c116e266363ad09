//! Whole-object validation hooks.
//!
//! Cross-field rules that per-field validation cannot express are attached
//! to a schema after definition. Pre hooks run against the raw input
//! mapping before field validation and may rewrite it; post hooks observe
//! the validated field map afterwards. Parameter shape is enforced by the
//! function types; the checks that stay dynamic are the naming rules.

use crate::error::ConfigError;
use crate::schema::RecordSchema;
use crate::value::Value;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;

/// Runs before field validation; may rewrite the raw mapping.
pub type PreValidatorFn = Arc<
    dyn Fn(&RecordSchema, &mut Map<String, JsonValue>) -> std::result::Result<(), String>
        + Send
        + Sync,
>;

/// Runs after field validation over the validated values.
pub type PostValidatorFn = Arc<
    dyn Fn(&RecordSchema, &HashMap<String, Value>) -> std::result::Result<(), String>
        + Send
        + Sync,
>;

/// A hook to register; the variant decides which list it joins.
#[derive(Clone)]
pub enum RootValidator {
    Pre(PreValidatorFn),
    Post(PostValidatorFn),
}

#[derive(Debug, Clone)]
pub struct HookOptions {
    /// Skip this post hook when field validation has already failed.
    pub skip_on_failure: bool,
    /// Replace a hook previously registered under the same name on the same
    /// schema instead of failing.
    pub allow_reuse: bool,
    /// Insertion position within the pre- or post-list; append by default.
    pub index: Option<usize>,
}

impl Default for HookOptions {
    fn default() -> Self {
        HookOptions {
            skip_on_failure: false,
            allow_reuse: true,
            index: None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct PreHook {
    pub name: String,
    pub func: PreValidatorFn,
}

#[derive(Clone)]
pub(crate) struct PostHook {
    pub name: String,
    pub skip_on_failure: bool,
    pub func: PostValidatorFn,
}

impl std::fmt::Debug for PreHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreHook").field("name", &self.name).finish()
    }
}

impl std::fmt::Debug for PostHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostHook")
            .field("name", &self.name)
            .field("skip_on_failure", &self.skip_on_failure)
            .finish()
    }
}

/// Members of the record API surface; a hook may not shadow one.
const RESERVED_MEMBERS: &[&str] = &[
    "dict",
    "json",
    "json_bytes",
    "yaml",
    "yaml_dict",
    "xml",
    "parse_value",
    "parse_raw",
    "parse_file",
    "add_root_validator",
    "elements_sequence",
    "has_resource_base",
    "get_resource_type",
    "get_json_encoder",
    "resource_type",
    "schema",
    "get",
    "set",
];

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl RecordSchema {
    /// Register an additional whole-object validator on this type.
    ///
    /// Fails without mutating anything when the name shadows a record API
    /// member or an ancestor's hook, collides with a declared field, or is
    /// not a plain identifier.
    pub fn add_root_validator(
        &self,
        name: &str,
        validator: RootValidator,
        options: &HookOptions,
    ) -> std::result::Result<(), ConfigError> {
        let own_conflict = self.hook_registered(name);
        if RESERVED_MEMBERS.contains(&name)
            || self.ancestry_hook_registered(name)
            || (own_conflict && !options.allow_reuse)
        {
            return Err(ConfigError::DuplicateMember {
                type_name: self.qualified_name(),
                name: name.to_string(),
            });
        }
        if self.field(name).is_some() {
            return Err(ConfigError::DuplicateField {
                type_name: self.qualified_name(),
                name: name.to_string(),
            });
        }
        if !is_identifier(name) {
            return Err(ConfigError::InvalidValidatorName(name.to_string()));
        }

        match validator {
            RootValidator::Pre(func) => {
                let mut hooks = self.pre_validators.write().expect("hook lock poisoned");
                let hook = PreHook {
                    name: name.to_string(),
                    func,
                };
                if let Some(existing) = hooks.iter_mut().find(|h| h.name == name) {
                    *existing = hook;
                } else {
                    match options.index {
                        Some(index) if index <= hooks.len() => hooks.insert(index, hook),
                        _ => hooks.push(hook),
                    }
                }
            }
            RootValidator::Post(func) => {
                let mut hooks = self.post_validators.write().expect("hook lock poisoned");
                let hook = PostHook {
                    name: name.to_string(),
                    skip_on_failure: options.skip_on_failure,
                    func,
                };
                if let Some(existing) = hooks.iter_mut().find(|h| h.name == name) {
                    *existing = hook;
                } else {
                    match options.index {
                        Some(index) if index <= hooks.len() => hooks.insert(index, hook),
                        _ => hooks.push(hook),
                    }
                }
            }
        }
        Ok(())
    }

    fn hook_registered(&self, name: &str) -> bool {
        self.pre_validators
            .read()
            .expect("hook lock poisoned")
            .iter()
            .any(|h| h.name == name)
            || self
                .post_validators
                .read()
                .expect("hook lock poisoned")
                .iter()
                .any(|h| h.name == name)
    }

    fn ancestry_hook_registered(&self, name: &str) -> bool {
        let mut current = self.base();
        while let Some(schema) = current {
            if schema.hook_registered(name) {
                return true;
            }
            current = schema.base();
        }
        false
    }
}
