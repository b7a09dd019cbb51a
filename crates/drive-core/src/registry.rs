use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use contracts::{Drive, EngineConfig};
use tracing::info;

use crate::drive::{apply_satisfaction, SatisfactionError};

#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    DuplicateDrive { name: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateDrive { name } => write!(f, "drive {name} is already registered"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Name-keyed set of drives. BTreeMap keeps iteration order stable for
/// display and persistence; correctness never depends on order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriveRegistry {
    drives: BTreeMap<String, Drive>,
}

impl DriveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh registry with every configured drive at zero pressure.
    pub fn bootstrap(config: &EngineConfig) -> Self {
        let mut drives = BTreeMap::new();
        for spec in &config.drives {
            drives.insert(spec.name.clone(), spec.to_drive());
        }
        Self { drives }
    }

    /// Re-creates configured drives that have gone missing, returning the
    /// names re-created. Drives not named by the config are left alone.
    pub fn ensure_configured(&mut self, config: &EngineConfig) -> Vec<String> {
        let mut recreated = Vec::new();
        for spec in &config.drives {
            if !self.drives.contains_key(&spec.name) {
                info!(drive = %spec.name, "re-creating missing configured drive");
                self.drives.insert(spec.name.clone(), spec.to_drive());
                recreated.push(spec.name.clone());
            }
        }
        recreated
    }

    pub fn register(&mut self, drive: Drive) -> Result<(), RegistryError> {
        if self.drives.contains_key(&drive.name) {
            return Err(RegistryError::DuplicateDrive { name: drive.name });
        }
        self.drives.insert(drive.name.clone(), drive);
        Ok(())
    }

    /// Replaces a drive wholesale, registering it if absent.
    pub fn replace(&mut self, drive: Drive) {
        self.drives.insert(drive.name.clone(), drive);
    }

    pub fn get(&self, name: &str) -> Option<&Drive> {
        self.drives.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Drive> {
        self.drives.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Drive> {
        self.drives.values_mut()
    }

    pub fn len(&self) -> usize {
        self.drives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drives.is_empty()
    }

    pub fn into_drives(self) -> Vec<Drive> {
        self.drives.into_values().collect()
    }

    /// Applies satisfaction to one drive by name.
    pub fn satisfy(
        &mut self,
        name: &str,
        delta: f64,
        now: DateTime<Utc>,
    ) -> Result<f64, SatisfactionError> {
        match self.drives.get_mut(name) {
            Some(drive) => apply_satisfaction(drive, delta, now),
            None => Err(SatisfactionError::UnknownDrive {
                name: name.to_string(),
            }),
        }
    }
}
