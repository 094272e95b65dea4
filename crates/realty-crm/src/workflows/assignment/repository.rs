use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::rules::{AssignmentRule, RuleKind, RuleSet, RuleValidationError};

/// Storage abstraction for the three rule collections.
///
/// Writes are whole-set replacements: implementations must either persist every collection
/// or none of them.
pub trait RuleRepository: Send + Sync {
    /// Every stored rule, active or not, in stored order.
    fn load(&self) -> Result<RuleSet, RepositoryError>;

    /// Persist an already validated rule set.
    fn store(&self, rules: RuleSet) -> Result<(), RepositoryError>;

    fn active_rules(&self, kind: RuleKind) -> Result<Vec<AssignmentRule>, RepositoryError> {
        Ok(self.load()?.active(kind))
    }

    fn replace_all(
        &self,
        geolocation: Vec<AssignmentRule>,
        capacity: Vec<AssignmentRule>,
        specialization: Vec<AssignmentRule>,
    ) -> Result<(), RepositoryError> {
        let rules = RuleSet::new(geolocation, capacity, specialization);
        rules.validate()?;
        self.store(rules)
    }
}

/// Error enumeration for rule persistence.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Invalid(#[from] RuleValidationError),
    #[error("rule store unavailable: {0}")]
    Unavailable(String),
    #[error("rule document could not be parsed: {0}")]
    Serialization(String),
}

impl From<io::Error> for RepositoryError {
    fn from(value: io::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

/// Rule repository held entirely in memory; each save swaps the snapshot whole.
#[derive(Debug, Default)]
pub struct InMemoryRuleRepository {
    rules: RwLock<RuleSet>,
}

impl InMemoryRuleRepository {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }
}

impl RuleRepository for InMemoryRuleRepository {
    fn load(&self) -> Result<RuleSet, RepositoryError> {
        let guard = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.clone())
    }

    fn store(&self, rules: RuleSet) -> Result<(), RepositoryError> {
        let mut guard = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        *guard = rules;
        Ok(())
    }
}

/// On-disk layout: the three named collections plus a save timestamp.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleDocument {
    #[serde(flatten)]
    rules: RuleSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// Rule repository persisted as a single JSON document.
///
/// Saves are written to a sibling temporary file and renamed over the target, so a reader
/// sees either the previous document or the new one. A missing file reads as an empty set.
#[derive(Debug)]
pub struct JsonFileRuleRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileRuleRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse and validate a rules document without installing it.
    pub fn read_document(path: &Path) -> Result<RuleSet, RepositoryError> {
        let raw = fs::read_to_string(path)?;
        let document: RuleDocument = serde_json::from_str(&raw)?;
        document.rules.validate()?;
        Ok(document.rules)
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "assignment-rules.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RuleRepository for JsonFileRuleRepository {
    fn load(&self) -> Result<RuleSet, RepositoryError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(RuleSet::default()),
            Err(err) => return Err(err.into()),
        };
        let document: RuleDocument = serde_json::from_str(&raw)?;
        Ok(document.rules)
    }

    fn store(&self, rules: RuleSet) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let total = rules.len();
        let document = RuleDocument {
            rules,
            updated_at: Some(Utc::now()),
        };
        let payload = serde_json::to_vec_pretty(&document)?;

        let staging = self.staging_path();
        {
            let mut file = fs::File::create(&staging)?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        if let Err(err) = fs::rename(&staging, &self.path) {
            let _ = fs::remove_file(&staging);
            return Err(err.into());
        }

        info!(path = %self.path.display(), rules = total, "assignment rules saved");
        Ok(())
    }
}
