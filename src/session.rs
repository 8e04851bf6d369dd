//! Logged-in employee, persisted between runs as a small JSON file of
//! string keys and values.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};

use crate::model::employee::Employee;

pub const CURRENT_EMPLOYEE: &str = "currentEmployee";
pub const EMPLOYEE: &str = "employee";
pub const IS_LOGGED_IN: &str = "isLoggedIn";

pub struct SessionStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl SessionStore {
    /// Loads `path` if it exists. An unreadable file starts an empty
    /// session instead of failing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("Session file {} is corrupt, starting empty: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading session file {}", path.display()));
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn set_item(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.update(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        let present = self.lock().contains_key(key);
        if present {
            self.update(|entries| {
                entries.remove(key);
            })?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.update(BTreeMap::clear)
    }

    pub fn login(&self, employee: &Employee) -> Result<()> {
        let json = serde_json::to_string(employee)?;
        self.update(|entries| {
            entries.insert(CURRENT_EMPLOYEE.to_string(), json.clone());
            entries.insert(EMPLOYEE.to_string(), json);
            entries.insert(IS_LOGGED_IN.to_string(), "true".to_string());
        })?;

        log::info!("Session started for {}", employee.full_name());
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        self.update(|entries| {
            for key in [CURRENT_EMPLOYEE, EMPLOYEE, IS_LOGGED_IN] {
                entries.remove(key);
            }
        })?;

        log::info!("Session ended");
        Ok(())
    }

    /// The stored employee, `currentEmployee` first. A value that does not
    /// parse is treated as no session.
    pub fn current_employee(&self) -> Option<Employee> {
        let raw = self
            .get_item(CURRENT_EMPLOYEE)
            .or_else(|| self.get_item(EMPLOYEE))?;
        match serde_json::from_str(&raw) {
            Ok(employee) => Some(employee),
            Err(e) => {
                log::warn!("Stored employee could not be parsed: {}", e);
                None
            }
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.get_item(IS_LOGGED_IN).as_deref() == Some("true")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `change` to a copy and keeps it only once it is on disk.
    fn update(&self, change: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let mut entries = self.lock();
        let mut next = entries.clone();
        change(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating session directory {}", dir.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing session file {}", self.path.display()))?;
        Ok(())
    }
}
