use serde::Serialize;
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::models::{CorruptRecord, DataState, SecurityState};
use crate::utils::logging::{
    log_corrupt_record, log_persistence_error, log_persistence_operation,
};

pub const SECURITY_FILE: &str = "security.json";
pub const DATA_FILE: &str = "data.json";
const TEMP_FILE_SUFFIX: &str = ".tmp";
const CORRUPT_FILE_SUFFIX: &str = ".corrupt";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {document}: {source}")]
    Serialize {
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// What a load found, for startup diagnostics.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub security_found: bool,
    pub data_found: bool,
    /// Documents that could not be parsed at all and were moved aside.
    pub unreadable: Vec<PathBuf>,
    /// Individual records skipped inside otherwise readable documents.
    pub corrupt: Vec<CorruptRecord>,
}

/// Durable storage for the security and data documents.
///
/// Each document is written to a sibling temp file, synced, then renamed
/// over the live file, so a reader only ever sees a complete document.
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    data_dir: PathBuf,
}

impl PersistenceManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn security_path(&self) -> PathBuf {
        self.data_dir.join(SECURITY_FILE)
    }

    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join(DATA_FILE)
    }

    pub fn save(&self, security: &SecurityState, data: &DataState) -> Result<(), PersistenceError> {
        self.save_document("security", &self.security_path(), security)?;
        self.save_document("data", &self.data_path(), data)?;
        Ok(())
    }

    /// Never fails: a missing document is a first run, an unreadable one
    /// is moved aside and replaced by empty state.
    pub fn load(&self) -> (SecurityState, DataState, LoadReport) {
        let mut report = LoadReport::default();

        let security = match self.read_document(&self.security_path(), &mut report) {
            Some(document) => {
                report.security_found = true;
                let (state, corrupt) = SecurityState::from_json(&document);
                report.corrupt.extend(corrupt);
                state
            }
            None => SecurityState::default(),
        };

        let data = match self.read_document(&self.data_path(), &mut report) {
            Some(document) => {
                report.data_found = true;
                let (state, corrupt) = DataState::from_json(&document);
                report.corrupt.extend(corrupt);
                state
            }
            None => DataState::default(),
        };

        for record in &report.corrupt {
            log_corrupt_record(record.section, &record.key, &record.reason);
        }
        log_persistence_operation(
            "load",
            &self.data_dir.display().to_string(),
            Some(&format!(
                "{} roles, {} bans, {} warnings, {} users, {} tasks, {} skipped",
                security.roles.len(),
                security.bans.len(),
                security.warnings.len(),
                data.users.len(),
                data.tasks.len(),
                report.corrupt.len()
            )),
        );

        (security, data, report)
    }

    fn save_document<T: Serialize>(
        &self,
        document: &'static str,
        path: &Path,
        value: &T,
    ) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|source| PersistenceError::Serialize { document, source })?;
        write_atomic(path, &bytes)?;
        log_persistence_operation("save", document, Some(&format!("{} bytes", bytes.len())));
        Ok(())
    }

    fn read_document(&self, path: &Path, report: &mut LoadReport) -> Option<Value> {
        match read_json(path) {
            Ok(document) => document,
            Err(e) => {
                log_persistence_error("load", &path.display().to_string(), &e.to_string());
                if matches!(e, PersistenceError::Parse { .. }) {
                    let aside = with_suffix(path, CORRUPT_FILE_SUFFIX);
                    if let Err(rename_err) = fs::rename(path, &aside) {
                        log_persistence_error(
                            "quarantine",
                            &path.display().to_string(),
                            &rename_err.to_string(),
                        );
                    }
                }
                report.unreadable.push(path.to_path_buf());
                None
            }
        }
    }
}

fn read_json(path: &Path) -> Result<Option<Value>, PersistenceError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let document = serde_json::from_str(&text).map_err(|source| PersistenceError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(document))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let io_err = |source: std::io::Error| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = with_suffix(path, TEMP_FILE_SUFFIX);
    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));
    if let Err(source) = written {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                log_persistence_error("remove temp file", &tmp.display().to_string(), &cleanup.to_string());
            }
        }
        return Err(io_err(source));
    }
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", path.display(), suffix))
}
