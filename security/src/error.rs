use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SecurityError>;

/// Win32 codes the platform service maps onto dedicated variants.
pub mod codes {
    pub const ERROR_FILE_NOT_FOUND: u32 = 2;
    pub const ERROR_PATH_NOT_FOUND: u32 = 3;
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    pub const ERROR_INVALID_OWNER: u32 = 1307;
    pub const ERROR_PRIVILEGE_NOT_HELD: u32 = 1314;
    pub const ERROR_NONE_MAPPED: u32 = 1332;
    pub const ERROR_INVALID_SID: u32 = 1337;
    pub const ERROR_INVALID_ACL: u32 = 1336;
    pub const ERROR_INVALID_SECURITY_DESCR: u32 = 1338;

    /// Short symbolic name for the codes worth naming in a report row.
    pub fn describe(code: u32) -> Option<&'static str> {
        match code {
            ERROR_FILE_NOT_FOUND => Some("ERROR_FILE_NOT_FOUND"),
            ERROR_PATH_NOT_FOUND => Some("ERROR_PATH_NOT_FOUND"),
            ERROR_ACCESS_DENIED => Some("ERROR_ACCESS_DENIED"),
            ERROR_INVALID_OWNER => Some("ERROR_INVALID_OWNER"),
            ERROR_PRIVILEGE_NOT_HELD => Some("ERROR_PRIVILEGE_NOT_HELD"),
            ERROR_NONE_MAPPED => Some("ERROR_NONE_MAPPED"),
            ERROR_INVALID_SID => Some("ERROR_INVALID_SID"),
            ERROR_INVALID_ACL => Some("ERROR_INVALID_ACL"),
            ERROR_INVALID_SECURITY_DESCR => Some("ERROR_INVALID_SECURITY_DESCR"),
            _ => None,
        }
    }
}

/// Which half of a descriptor update reached the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Applied {
    pub owner: bool,
    pub dacl: bool,
}

#[derive(Error, Debug)]
pub enum SecurityError {
    #[error("Access denied: {}", .path.display())]
    AccessDenied { path: PathBuf },

    #[error("Object not found: {}", .path.display())]
    ObjectNotFound { path: PathBuf },

    #[error("Invalid security descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid ACL: {0}")]
    InvalidAcl(String),

    #[error("Invalid SID: {0}")]
    InvalidSid(String),

    #[error("Replacement principal '{principal}' is not usable: {reason}")]
    InvalidReplacementPrincipal { principal: String, reason: String },

    #[error("{context} failed with code {code}{}", codes::describe(*.code).map(|n| format!(" ({n})")).unwrap_or_default())]
    ApiFailure { code: u32, context: String },

    #[error("Partial write (owner applied: {}, DACL applied: {}): {source}", .applied.owner, .applied.dacl)]
    PartialWriteFailure {
        applied: Applied,
        #[source]
        source: Box<SecurityError>,
    },
}

impl SecurityError {
    pub fn api(code: u32, context: impl Into<String>) -> Self {
        SecurityError::ApiFailure {
            code,
            context: context.into(),
        }
    }

    /// Folds the codes every service call can hit onto the dedicated variants.
    pub fn from_code(code: u32, path: &std::path::Path, context: &str) -> Self {
        match code {
            codes::ERROR_ACCESS_DENIED | codes::ERROR_PRIVILEGE_NOT_HELD => {
                SecurityError::AccessDenied {
                    path: path.to_path_buf(),
                }
            }
            codes::ERROR_FILE_NOT_FOUND | codes::ERROR_PATH_NOT_FOUND => {
                SecurityError::ObjectNotFound {
                    path: path.to_path_buf(),
                }
            }
            codes::ERROR_INVALID_ACL => {
                SecurityError::InvalidAcl(format!("{context} rejected the ACL (code {code})"))
            }
            other => SecurityError::api(other, context),
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, SecurityError::AccessDenied { .. })
    }
}
