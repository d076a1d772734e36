//! Minimal `{{ name }}` templating for generated config files.

use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::{BuildpackError, Result};

pub const NGINX_CONF: &str = include_str!("../templates/nginx.conf.tpl");
pub const PHP_FPM_CONF: &str = include_str!("../templates/php-fpm.conf.tpl");
pub const PHP_INI: &str = include_str!("../templates/php.ini.tpl");

fn placeholder_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap())
}

/// Variables available to a template
#[derive(Debug, Clone, Default)]
pub struct Vars {
    values: IndexMap<String, String>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: impl ToString) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Render `template`, failing on placeholders without a value
pub fn render(name: &str, template: &str, vars: &Vars) -> Result<String> {
    let mut missing = Vec::new();

    let rendered = placeholder_regex().replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        match vars.get(key) {
            Some(value) => value.to_string(),
            None => {
                missing.push(key.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(BuildpackError::Template {
            template: name.to_string(),
            reason: format!("no value for {}", missing.join(", ")),
        });
    }

    Ok(rendered.into_owned())
}
