//! Homepage configuration parsing.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use termhome_common::{TermhomeError, TermhomeResult};
use termhome_status::{RuntimeConfig, Target};

/// Homepage configuration (config.yaml).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomeConfig {
    /// Page title.
    #[serde(default)]
    pub title: Option<String>,

    /// Status monitoring settings.
    #[serde(default)]
    pub status: StatusSettings,

    /// Docker runtime to reconcile container targets against.
    #[serde(default)]
    pub docker: Option<RuntimeConfig>,

    /// Services by group name.
    #[serde(default)]
    pub services: BTreeMap<String, Vec<Target>>,
}

/// Status monitoring settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSettings {
    /// Seconds between checks for every target, overriding their own.
    #[serde(default)]
    pub check_interval: Option<u64>,
}

impl HomeConfig {
    /// Parse from YAML.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the document is malformed or a
    /// service name is empty or used twice.
    pub fn from_yaml(yaml: &str) -> TermhomeResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or invalid.
    pub fn from_file(path: &Path) -> TermhomeResult<Self> {
        if !path.exists() {
            return Err(TermhomeError::Config {
                message: format!("configuration file not found: {}", path.display()),
            });
        }
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Self::from_yaml(&content)
    }

    /// Page title, or a default.
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("termhome")
    }

    /// Every configured target with its group filled in.
    #[must_use]
    pub fn targets(&self) -> Vec<Target> {
        self.services
            .iter()
            .flat_map(|(group, targets)| {
                targets
                    .iter()
                    .map(move |target| target.clone().with_group(group.clone()))
            })
            .collect()
    }

    fn validate(&self) -> TermhomeResult<()> {
        let mut seen = HashSet::new();
        for (group, targets) in &self.services {
            for target in targets {
                if target.name.trim().is_empty() {
                    return Err(TermhomeError::Config {
                        message: format!("service without a name in group '{group}'"),
                    });
                }
                if !seen.insert(target.name.as_str()) {
                    return Err(TermhomeError::Config {
                        message: format!("duplicate service name '{}'", target.name),
                    });
                }
            }
        }
        Ok(())
    }
}
