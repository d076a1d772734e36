//! Worker pool sizing.
//!
//! An oracle turns a memory budget and the effective PHP `memory_limit` into
//! a php-fpm worker count. [`MemoryAutotune`] is built in; [`CommandOracle`]
//! delegates to an external program.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::{BuildpackError, Result};

/// Budget used when `MEMORY_AVAILABLE` is not set
pub const DEFAULT_MEMORY_BUDGET: &str = "512M";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sizing {
    /// Never below 1
    pub concurrency: u32,
    /// Per-worker memory limit in php.ini notation
    pub memory_limit: String,
}

#[async_trait]
pub trait SizingOracle: Send + Sync {
    async fn size(&self, php_ini: &Path, document_root: &Path, budget: &str) -> Result<Sizing>;
}

/// Parse a php.ini size (`128M`, `1G`, `65536`, `-1`) into bytes
pub fn parse_size(value: &str) -> Option<i64> {
    let value = value.trim().trim_matches('"');
    if value == "-1" {
        return Some(-1);
    }

    let (digits, multiplier) = match value.chars().last()? {
        'k' | 'K' => (&value[..value.len() - 1], 1024),
        'm' | 'M' => (&value[..value.len() - 1], 1024 * 1024),
        'g' | 'G' => (&value[..value.len() - 1], 1024 * 1024 * 1024),
        _ => (value, 1),
    };

    digits.trim().parse::<i64>().ok()?.checked_mul(multiplier)
}

/// Parse a memory budget into bytes. Platforms report `MEMORY_AVAILABLE` as
/// a plain megabyte count, so a bare number means megabytes here, unlike in
/// php.ini.
pub fn parse_budget(value: &str) -> Option<i64> {
    let value = value.trim();
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        return value.parse::<i64>().ok()?.checked_mul(1024 * 1024);
    }
    parse_size(value)
}

/// Value of `key` in an ini file, the last assignment wins
fn ini_value(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with(';') && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .filter(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.split(';').next().unwrap_or("").trim().to_string())
        .last()
}

/// The `memory_limit` in effect for requests: php.ini, overridden by a
/// `.user.ini` in the document root
pub fn effective_memory_limit(php_ini: &Path, document_root: &Path) -> Result<String> {
    let mut limit = ini_value(&std::fs::read_to_string(php_ini)?, "memory_limit");

    let user_ini = document_root.join(".user.ini");
    if user_ini.is_file() {
        if let Some(value) = ini_value(&std::fs::read_to_string(&user_ini)?, "memory_limit") {
            log::debug!("memory_limit {} from {}", value, user_ini.display());
            limit = Some(value);
        }
    }

    // PHP's compiled-in default
    Ok(limit.unwrap_or_else(|| "128M".to_string()))
}

/// Fits as many workers as the budget allows at the effective memory limit
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryAutotune;

#[async_trait]
impl SizingOracle for MemoryAutotune {
    async fn size(&self, php_ini: &Path, document_root: &Path, budget: &str) -> Result<Sizing> {
        let memory_limit = effective_memory_limit(php_ini, document_root)?;

        let budget_bytes = parse_budget(budget)
            .filter(|b| *b > 0)
            .ok_or_else(|| BuildpackError::Config(format!("invalid memory budget {}", budget)))?;

        let concurrency = match parse_size(&memory_limit) {
            Some(limit) if limit > 0 => (budget_bytes / limit).clamp(1, u32::MAX as i64) as u32,
            Some(_) => 1,
            None => {
                return Err(BuildpackError::Config(format!(
                    "invalid memory_limit {}",
                    memory_limit
                )))
            }
        };

        Ok(Sizing {
            concurrency,
            memory_limit,
        })
    }
}

/// Runs `<command> <php.ini> <document root> <budget>`, which prints
/// `<concurrency> <memory_limit>`
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandOracle {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// From a whitespace separated command line such as `bin/autotune -v`
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut words = command_line.split_whitespace();
        let program = words.next()?;
        Some(Self {
            program: PathBuf::from(program),
            args: words.map(str::to_string).collect(),
        })
    }
}

#[async_trait]
impl SizingOracle for CommandOracle {
    async fn size(&self, php_ini: &Path, document_root: &Path, budget: &str) -> Result<Sizing> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(php_ini)
            .arg(document_root)
            .arg(budget)
            .output()
            .await
            .map_err(|source| BuildpackError::Spawn {
                name: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(BuildpackError::Supervisor(format!(
                "sizing command exited with {}",
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut fields = stdout.split_whitespace();
        let concurrency = fields.next().and_then(|c| c.parse::<u32>().ok());
        let memory_limit = fields.next();

        match (concurrency, memory_limit) {
            (Some(concurrency), Some(memory_limit)) => Ok(Sizing {
                concurrency: concurrency.max(1),
                memory_limit: memory_limit.to_string(),
            }),
            _ => Err(BuildpackError::Supervisor(format!(
                "unexpected sizing output: {}",
                stdout.trim()
            ))),
        }
    }
}
