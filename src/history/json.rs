//! JSON flat-file history backend.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    check_unrecord, completes, new_intent, next_record, HistoryError, HistoryRecord, HistoryStore,
    Intent,
};
use crate::files::atomic::write_atomic;
use crate::migration::Direction;

/// On-disk layout version of the history document.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryDocument {
    format: u32,
    records: Vec<HistoryRecord>,
    #[serde(default)]
    in_flight: Option<Intent>,
}

/// History kept in a single JSON document.
///
/// Every change rewrites the whole document through
/// [`write_atomic`], so the file on disk is always one complete version.
#[derive(Debug)]
pub struct JsonFileHistory {
    path: PathBuf,
    doc: HistoryDocument,
    initialized: bool,
}

impl JsonFileHistory {
    /// Load history from `path`. A missing file means "no history yet".
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let path = path.into();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no history file yet");
                return Ok(Self {
                    path,
                    doc: HistoryDocument {
                        format: FORMAT_VERSION,
                        ..Default::default()
                    },
                    initialized: false,
                });
            }
            Err(source) => return Err(HistoryError::Io { path, source }),
        };

        let mut doc: HistoryDocument =
            serde_json::from_str(&contents).map_err(|source| HistoryError::Corrupt {
                path: path.clone(),
                source,
            })?;
        if doc.format != FORMAT_VERSION {
            return Err(HistoryError::UnsupportedFormat {
                path,
                found: doc.format,
                expected: FORMAT_VERSION,
            });
        }
        doc.records.sort_by_key(|r| r.order_index);

        Ok(Self {
            path,
            doc,
            initialized: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `doc`, then adopt it as the in-memory state.
    fn commit(&mut self, doc: HistoryDocument) -> Result<(), HistoryError> {
        let json = serde_json::to_vec_pretty(&doc).map_err(|source| HistoryError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &json).map_err(|source| HistoryError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), records = doc.records.len(), "history written");
        self.doc = doc;
        self.initialized = true;
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), HistoryError> {
        if self.initialized {
            Ok(())
        } else {
            Err(HistoryError::NotInitialized)
        }
    }
}

impl HistoryStore for JsonFileHistory {
    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn init(&mut self) -> Result<bool, HistoryError> {
        if self.initialized {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| HistoryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.commit(self.doc.clone())?;
        Ok(true)
    }

    fn applied(&self) -> &[HistoryRecord] {
        &self.doc.records
    }

    fn record(&mut self, identity: &str) -> Result<HistoryRecord, HistoryError> {
        self.ensure_initialized()?;
        let record = next_record(&self.doc.records, identity)?;

        let mut doc = self.doc.clone();
        doc.records.push(record.clone());
        if completes(doc.in_flight.as_ref(), identity, Direction::Up) {
            doc.in_flight = None;
        }
        self.commit(doc)?;
        Ok(record)
    }

    fn unrecord(&mut self, identity: &str) -> Result<HistoryRecord, HistoryError> {
        self.ensure_initialized()?;
        check_unrecord(&self.doc.records, identity)?;

        let mut doc = self.doc.clone();
        let removed = doc.records.pop().ok_or_else(|| HistoryError::NotApplied {
            identity: identity.to_string(),
        })?;
        if completes(doc.in_flight.as_ref(), identity, Direction::Down) {
            doc.in_flight = None;
        }
        self.commit(doc)?;
        Ok(removed)
    }

    fn intent(&self) -> Option<&Intent> {
        self.doc.in_flight.as_ref()
    }

    fn begin(&mut self, identity: &str, direction: Direction) -> Result<Intent, HistoryError> {
        self.ensure_initialized()?;
        let intent = new_intent(self.doc.in_flight.as_ref(), identity, direction)?;

        let mut doc = self.doc.clone();
        doc.in_flight = Some(intent.clone());
        self.commit(doc)?;
        Ok(intent)
    }

    fn clear_intent(&mut self) -> Result<(), HistoryError> {
        self.ensure_initialized()?;
        if self.doc.in_flight.is_none() {
            return Ok(());
        }
        let mut doc = self.doc.clone();
        doc.in_flight = None;
        self.commit(doc)
    }
}
