// src/config/vars.rs

//! `${name}` interpolation for string options.
//!
//! - `${name}` looks up `[vars].name`.
//! - `${env.NAME}` reads the process environment.
//! - `$${...}` is left as a literal `${...}`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?\$\{([A-Za-z_][A-Za-z0-9_.\-]*)\}").expect("variable pattern compiles")
});

#[derive(Debug)]
pub struct VarExpander<'a> {
    vars: &'a BTreeMap<String, String>,
}

impl<'a> VarExpander<'a> {
    pub fn new(vars: &'a BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Expand every variable reference in `input`.
    ///
    /// Returns an error naming the first unknown variable.
    pub fn expand(&self, input: &str) -> Result<String, String> {
        if !input.contains("${") {
            return Ok(input.to_string());
        }

        let mut missing: Option<String> = None;
        let expanded = VAR_PATTERN.replace_all(input, |caps: &Captures<'_>| {
            let whole = &caps[0];
            if whole.starts_with("$$") {
                return whole[1..].to_string();
            }
            let key = &caps[1];
            match self.lookup(key) {
                Some(value) => value,
                None => {
                    missing.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(key) => Err(format!("unknown variable '${{{key}}}' in '{input}'")),
            None => Ok(expanded.into_owned()),
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        if let Some(env_key) = key.strip_prefix("env.") {
            return std::env::var(env_key).ok();
        }
        self.vars.get(key).cloned()
    }
}
