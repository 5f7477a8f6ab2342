//! In-memory `SecurityService` holding synthetic descriptors and a scripted
//! account directory, with injectable read, write and lookup failures.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::descriptor::{DescriptorUpdate, SecurityDescriptor};
use crate::error::{codes, Applied, Result, SecurityError};
use crate::service::{Resolution, SecurityService};
use crate::sid::Sid;

/// A failure the fake can be told to produce. Cloned into a fresh
/// `SecurityError` every time it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    AccessDenied,
    NotFound,
    InvalidDescriptor(String),
    Api(u32),
}

impl Fault {
    fn raise(&self, path: &Path, context: &str) -> SecurityError {
        match self {
            Fault::AccessDenied => SecurityError::AccessDenied {
                path: path.to_path_buf(),
            },
            Fault::NotFound => SecurityError::ObjectNotFound {
                path: path.to_path_buf(),
            },
            Fault::InvalidDescriptor(detail) => SecurityError::InvalidDescriptor(detail.clone()),
            Fault::Api(code) => SecurityError::api(*code, context),
        }
    }
}

#[derive(Default)]
struct State {
    descriptors: HashMap<PathBuf, SecurityDescriptor>,
    accounts: HashMap<Sid, String>,
    names: HashMap<String, Sid>,
    read_faults: HashMap<PathBuf, Fault>,
    owner_write_faults: HashMap<PathBuf, Fault>,
    dacl_write_faults: HashMap<PathBuf, Fault>,
    lookup_faults: HashMap<Sid, u32>,
    written: HashSet<PathBuf>,
}

#[derive(Default)]
pub struct MemorySecurityService {
    state: Mutex<State>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    lookups: AtomicUsize,
}

impl MemorySecurityService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a live account; its SID resolves and its name can be looked up.
    pub fn add_account(&self, sid: Sid, name: impl Into<String>) -> &Self {
        let name = name.into();
        let mut state = self.state();
        state.names.insert(name.to_lowercase(), sid.clone());
        state.accounts.insert(sid, name);
        self
    }

    pub fn remove_account(&self, sid: &Sid) -> &Self {
        let mut state = self.state();
        if let Some(name) = state.accounts.remove(sid) {
            state.names.remove(&name.to_lowercase());
        }
        self
    }

    pub fn set_descriptor(&self, path: impl Into<PathBuf>, descriptor: SecurityDescriptor) -> &Self {
        self.state().descriptors.insert(path.into(), descriptor);
        self
    }

    pub fn descriptor(&self, path: &Path) -> Option<SecurityDescriptor> {
        self.state().descriptors.get(path).cloned()
    }

    pub fn fail_read(&self, path: impl Into<PathBuf>, fault: Fault) -> &Self {
        self.state().read_faults.insert(path.into(), fault);
        self
    }

    pub fn fail_owner_write(&self, path: impl Into<PathBuf>, fault: Fault) -> &Self {
        self.state().owner_write_faults.insert(path.into(), fault);
        self
    }

    pub fn fail_dacl_write(&self, path: impl Into<PathBuf>, fault: Fault) -> &Self {
        self.state().dacl_write_faults.insert(path.into(), fault);
        self
    }

    /// Makes `resolve_principal` fail for `sid` with an environment error.
    pub fn fail_lookup(&self, sid: Sid, code: u32) -> &Self {
        self.state().lookup_faults.insert(sid, code);
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `write_descriptor` calls, successful or not.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn was_written(&self, path: &Path) -> bool {
        self.state().written.contains(path)
    }
}

impl SecurityService for MemorySecurityService {
    fn read_descriptor(&self, path: &Path) -> Result<SecurityDescriptor> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if let Some(fault) = state.read_faults.get(path) {
            return Err(fault.raise(path, "read descriptor"));
        }
        state
            .descriptors
            .get(path)
            .cloned()
            .ok_or_else(|| SecurityError::ObjectNotFound {
                path: path.to_path_buf(),
            })
    }

    fn write_descriptor(&self, path: &Path, update: &DescriptorUpdate) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(dacl) = &update.dacl {
            dacl.validate()?;
        }
        let mut guard = self.state();
        let state = &mut *guard;
        let Some(sd) = state.descriptors.get_mut(path) else {
            return Err(SecurityError::ObjectNotFound {
                path: path.to_path_buf(),
            });
        };

        let mut applied = Applied::default();
        let mut failure = None;

        if let Some(owner) = &update.owner {
            match state.owner_write_faults.get(path) {
                Some(fault) => failure = Some(fault.raise(path, "set owner")),
                None => {
                    sd.owner = Some(owner.clone());
                    applied.owner = true;
                }
            }
        }
        if let Some(dacl) = &update.dacl {
            match state.dacl_write_faults.get(path) {
                Some(fault) => {
                    failure.get_or_insert_with(|| fault.raise(path, "set DACL"));
                }
                None => {
                    sd.dacl = Some(dacl.clone());
                    sd.dacl_protected = update.dacl_protected;
                    applied.dacl = true;
                }
            }
        }
        if applied.owner || applied.dacl {
            state.written.insert(path.to_path_buf());
        }

        match failure {
            None => Ok(()),
            Some(err) if applied.owner || applied.dacl => Err(SecurityError::PartialWriteFailure {
                applied,
                source: Box::new(err),
            }),
            Some(err) => Err(err),
        }
    }

    fn resolve_principal(&self, sid: &Sid) -> Result<Resolution> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if let Some(code) = state.lookup_faults.get(sid) {
            return Err(SecurityError::api(*code, format!("LookupAccountSid({sid})")));
        }
        Ok(match state.accounts.get(sid) {
            Some(name) => Resolution::Resolved {
                account_name: name.clone(),
            },
            None => Resolution::Unresolved,
        })
    }

    fn lookup_account(&self, name: &str) -> Result<Sid> {
        self.state()
            .names
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| SecurityError::api(codes::ERROR_NONE_MAPPED, format!("LookupAccountName({name})")))
    }
}
