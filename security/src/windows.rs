//! `SecurityService` backed by the Win32 security API.
//!
//! Raw pointers stay inside this module: descriptors are copied out of the
//! API-owned allocation and decoded with the safe codec, and updates are
//! encoded into DWORD-aligned buffers before being handed to the API.

use std::ffi::c_void;
use std::path::Path;
use std::ptr::{null, null_mut};

use log::{debug, warn};
use widestring::U16CString;
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, LocalFree, ERROR_INSUFFICIENT_BUFFER, ERROR_NOT_ALL_ASSIGNED,
    ERROR_SUCCESS, HANDLE, LUID,
};
use windows_sys::Win32::Security::Authorization::{
    GetNamedSecurityInfoW, SetNamedSecurityInfoW, SE_FILE_OBJECT,
};
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, GetSecurityDescriptorLength, LookupAccountNameW, LookupAccountSidW,
    LookupPrivilegeValueW, ACL, DACL_SECURITY_INFORMATION, LUID_AND_ATTRIBUTES,
    OWNER_SECURITY_INFORMATION, PROTECTED_DACL_SECURITY_INFORMATION, SE_PRIVILEGE_ENABLED,
    TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

use crate::descriptor::{DescriptorUpdate, SecurityDescriptor};
use crate::error::{codes, Result, SecurityError};
use crate::service::{Resolution, SecurityService};
use crate::sid::Sid;

const ERROR_INVALID_NAME: u32 = 123;

/// Privileges needed to read any descriptor and to assign an owner other
/// than the caller.
pub const REMEDIATION_PRIVILEGES: [&str; 3] = [
    "SeRestorePrivilege",
    "SeTakeOwnershipPrivilege",
    "SeBackupPrivilege",
];

pub struct WindowsSecurityService {
    enabled_privileges: Vec<&'static str>,
}

impl WindowsSecurityService {
    /// Creates the service, enabling the remediation privileges on the process
    /// token where the caller holds them.
    pub fn new() -> Self {
        let mut enabled_privileges = Vec::new();
        for name in REMEDIATION_PRIVILEGES {
            match enable_privilege(name) {
                Ok(()) => {
                    debug!("Enabled {name}");
                    enabled_privileges.push(name);
                }
                Err(e) => warn!("Could not enable {name}: {e}"),
            }
        }
        Self { enabled_privileges }
    }

    pub fn enabled_privileges(&self) -> &[&'static str] {
        &self.enabled_privileges
    }
}

impl Default for WindowsSecurityService {
    fn default() -> Self {
        Self::new()
    }
}

/// Frees an API-allocated block on drop.
struct LocalAlloc(*mut c_void);

impl Drop for LocalAlloc {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer came from an API that documents LocalFree as its release.
            unsafe {
                LocalFree(self.0);
            }
        }
    }
}

struct Token(HANDLE);

impl Drop for Token {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by OpenProcessToken and is closed once.
        unsafe {
            CloseHandle(self.0);
        }
    }
}

fn wide(text: &str) -> Result<U16CString> {
    U16CString::from_str(text)
        .map_err(|_| SecurityError::api(ERROR_INVALID_NAME, format!("'{text}' contains a NUL")))
}

fn wide_path(path: &Path) -> Result<U16CString> {
    U16CString::from_os_str(path.as_os_str()).map_err(|_| {
        SecurityError::api(
            ERROR_INVALID_NAME,
            format!("{} contains a NUL", path.display()),
        )
    })
}

/// Copies `bytes` into a DWORD-aligned buffer, as SID and ACL structures require.
fn aligned(bytes: &[u8]) -> Vec<u32> {
    let mut words = vec![0u32; bytes.len().div_ceil(4)];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks(4)) {
        let mut le = [0u8; 4];
        le[..chunk.len()].copy_from_slice(chunk);
        *word = u32::from_le_bytes(le);
    }
    words
}

fn last_error() -> u32 {
    // SAFETY: GetLastError has no preconditions.
    unsafe { GetLastError() }
}

fn enable_privilege(name: &str) -> Result<()> {
    let wide_name = wide(name)?;
    let mut luid = LUID {
        LowPart: 0,
        HighPart: 0,
    };
    // SAFETY: valid NUL-terminated name and out pointer.
    if unsafe { LookupPrivilegeValueW(null(), wide_name.as_ptr(), &mut luid) } == 0 {
        return Err(SecurityError::api(last_error(), format!("LookupPrivilegeValueW({name})")));
    }

    let mut handle: HANDLE = null_mut();
    // SAFETY: the pseudo handle from GetCurrentProcess is always valid.
    let opened = unsafe {
        OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
            &mut handle,
        )
    };
    if opened == 0 {
        return Err(SecurityError::api(last_error(), "OpenProcessToken"));
    }
    let token = Token(handle);

    let state = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };
    // SAFETY: `state` outlives the call; no previous state is requested.
    let adjusted =
        unsafe { AdjustTokenPrivileges(token.0, 0, &state, 0, null_mut(), null_mut()) };
    // AdjustTokenPrivileges succeeds with ERROR_NOT_ALL_ASSIGNED when the token lacks it.
    let code = last_error();
    if adjusted == 0 || code == ERROR_NOT_ALL_ASSIGNED {
        return Err(SecurityError::api(code, format!("AdjustTokenPrivileges({name})")));
    }
    Ok(())
}

impl SecurityService for WindowsSecurityService {
    fn read_descriptor(&self, path: &Path) -> Result<SecurityDescriptor> {
        let wide = wide_path(path)?;
        let mut descriptor: *mut c_void = null_mut();
        // SAFETY: out pointers are valid; only the descriptor block is requested.
        let code = unsafe {
            GetNamedSecurityInfoW(
                wide.as_ptr(),
                SE_FILE_OBJECT,
                OWNER_SECURITY_INFORMATION | DACL_SECURITY_INFORMATION,
                null_mut(),
                null_mut(),
                null_mut(),
                null_mut(),
                &mut descriptor,
            )
        };
        if code != ERROR_SUCCESS {
            return Err(SecurityError::from_code(code, path, "GetNamedSecurityInfoW"));
        }
        let block = LocalAlloc(descriptor);
        if block.0.is_null() {
            return Err(SecurityError::InvalidDescriptor(format!(
                "no descriptor returned for {}",
                path.display()
            )));
        }

        // SAFETY: `block` is a valid self-relative descriptor returned above.
        let len = unsafe { GetSecurityDescriptorLength(block.0) } as usize;
        // SAFETY: the API reports `len` readable bytes at `block`; copied before it is freed.
        let bytes = unsafe { std::slice::from_raw_parts(block.0 as *const u8, len) }.to_vec();
        drop(block);

        SecurityDescriptor::from_self_relative(&bytes)
    }

    fn write_descriptor(&self, path: &Path, update: &DescriptorUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let wide = wide_path(path)?;

        let mut info = 0;
        let owner = update.owner.as_ref().map(|sid| aligned(&sid.to_bytes()));
        if owner.is_some() {
            info |= OWNER_SECURITY_INFORMATION;
        }
        let dacl = match &update.dacl {
            Some(acl) => {
                info |= DACL_SECURITY_INFORMATION;
                if update.dacl_protected {
                    info |= PROTECTED_DACL_SECURITY_INFORMATION;
                }
                Some(aligned(&acl.validate()?))
            }
            None => None,
        };

        // SAFETY: both buffers hold validated encodings and live across the call.
        let code = unsafe {
            SetNamedSecurityInfoW(
                wide.as_ptr(),
                SE_FILE_OBJECT,
                info,
                owner
                    .as_ref()
                    .map_or(null_mut(), |words| words.as_ptr() as *mut c_void),
                null_mut(),
                dacl.as_ref()
                    .map_or(null(), |words| words.as_ptr() as *const ACL),
                null(),
            )
        };
        if code != ERROR_SUCCESS {
            return Err(SecurityError::from_code(code, path, "SetNamedSecurityInfoW"));
        }
        Ok(())
    }

    fn resolve_principal(&self, sid: &Sid) -> Result<Resolution> {
        let raw = aligned(&sid.to_bytes());
        let psid = raw.as_ptr() as *mut c_void;
        let mut name_len = 0u32;
        let mut domain_len = 0u32;
        let mut sid_use = 0i32;

        // SAFETY: size query with null buffers.
        let ok = unsafe {
            LookupAccountSidW(
                null(),
                psid,
                null_mut(),
                &mut name_len,
                null_mut(),
                &mut domain_len,
                &mut sid_use,
            )
        };
        if ok == 0 {
            match last_error() {
                ERROR_INSUFFICIENT_BUFFER => {}
                codes::ERROR_NONE_MAPPED => return Ok(Resolution::Unresolved),
                code => return Err(SecurityError::api(code, format!("LookupAccountSidW({sid})"))),
            }
        }

        let mut name = vec![0u16; name_len.max(1) as usize];
        let mut domain = vec![0u16; domain_len.max(1) as usize];
        // SAFETY: buffers are sized from the query above.
        let ok = unsafe {
            LookupAccountSidW(
                null(),
                psid,
                name.as_mut_ptr(),
                &mut name_len,
                domain.as_mut_ptr(),
                &mut domain_len,
                &mut sid_use,
            )
        };
        if ok == 0 {
            return match last_error() {
                codes::ERROR_NONE_MAPPED => Ok(Resolution::Unresolved),
                code => Err(SecurityError::api(code, format!("LookupAccountSidW({sid})"))),
            };
        }

        let name = String::from_utf16_lossy(&name[..name_len as usize]);
        let domain = String::from_utf16_lossy(&domain[..domain_len as usize]);
        let account_name = if domain.is_empty() {
            name
        } else {
            format!("{domain}\\{name}")
        };
        Ok(Resolution::Resolved { account_name })
    }

    fn lookup_account(&self, name: &str) -> Result<Sid> {
        let wide_name = wide(name)?;
        let mut sid_len = 0u32;
        let mut domain_len = 0u32;
        let mut sid_use = 0i32;

        // SAFETY: size query with null buffers.
        let ok = unsafe {
            LookupAccountNameW(
                null(),
                wide_name.as_ptr(),
                null_mut(),
                &mut sid_len,
                null_mut(),
                &mut domain_len,
                &mut sid_use,
            )
        };
        if ok == 0 {
            let code = last_error();
            if code != ERROR_INSUFFICIENT_BUFFER {
                return Err(SecurityError::api(code, format!("LookupAccountNameW({name})")));
            }
        }

        let mut raw = vec![0u32; (sid_len as usize).div_ceil(4)];
        let mut domain = vec![0u16; domain_len.max(1) as usize];
        // SAFETY: buffers are sized from the query above.
        let ok = unsafe {
            LookupAccountNameW(
                null(),
                wide_name.as_ptr(),
                raw.as_mut_ptr() as *mut c_void,
                &mut sid_len,
                domain.as_mut_ptr(),
                &mut domain_len,
                &mut sid_use,
            )
        };
        if ok == 0 {
            return Err(SecurityError::api(last_error(), format!("LookupAccountNameW({name})")));
        }

        let bytes: Vec<u8> = raw.iter().flat_map(|word| word.to_le_bytes()).collect();
        let (sid, _) = Sid::decode_prefix(&bytes[..sid_len as usize])?;
        Ok(sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_pads_to_whole_words() {
        let words = aligned(&[1, 2, 3, 4, 5]);
        assert_eq!(words, vec![0x0403_0201, 0x0000_0005]);
    }

    #[test]
    fn local_system_resolves() {
        let service = WindowsSecurityService::new();
        let sid: Sid = "S-1-5-18".parse().unwrap();
        assert!(service.resolve_principal(&sid).unwrap().is_resolved());
    }
}
