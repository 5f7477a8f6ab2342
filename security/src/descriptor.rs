//! Owner and DACL of one object, decoded from a self-relative security
//! descriptor. Group and SACL offsets are validated but not decoded; they are
//! never written back, so the platform keeps them untouched.

use crate::acl::Acl;
use crate::error::{Result, SecurityError};
use crate::sid::Sid;

/// `revision:u8, sbz1:u8, control:u16, owner:u32, group:u32, sacl:u32, dacl:u32`.
pub const DESCRIPTOR_HEADER_LEN: usize = 20;
pub const SECURITY_DESCRIPTOR_REVISION: u8 = 1;

pub const SE_OWNER_DEFAULTED: u16 = 0x0001;
pub const SE_DACL_PRESENT: u16 = 0x0004;
pub const SE_DACL_PROTECTED: u16 = 0x1000;
pub const SE_SELF_RELATIVE: u16 = 0x8000;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityDescriptor {
    pub owner: Option<Sid>,
    /// `None` is a NULL DACL (or no DACL at all), which is never rewritten.
    pub dacl: Option<Acl>,
    /// Inheritance from the parent is blocked; kept on write.
    pub dacl_protected: bool,
}

impl SecurityDescriptor {
    pub fn new(owner: Option<Sid>, dacl: Option<Acl>) -> Self {
        Self {
            owner,
            dacl,
            dacl_protected: false,
        }
    }

    pub fn from_self_relative(buf: &[u8]) -> Result<Self> {
        if buf.len() < DESCRIPTOR_HEADER_LEN {
            return Err(SecurityError::InvalidDescriptor(format!(
                "{} bytes is shorter than a descriptor header",
                buf.len()
            )));
        }
        if buf[0] != SECURITY_DESCRIPTOR_REVISION {
            return Err(SecurityError::InvalidDescriptor(format!(
                "unsupported descriptor revision {}",
                buf[0]
            )));
        }
        let control = u16::from_le_bytes([buf[2], buf[3]]);
        if control & SE_SELF_RELATIVE == 0 {
            return Err(SecurityError::InvalidDescriptor(
                "descriptor is not self-relative".to_string(),
            ));
        }
        let offset = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]) as usize;
        let (owner_at, group_at, sacl_at, dacl_at) = (offset(4), offset(8), offset(12), offset(16));

        for (name, at) in [("owner", owner_at), ("group", group_at), ("SACL", sacl_at), ("DACL", dacl_at)] {
            if at != 0 && (at < DESCRIPTOR_HEADER_LEN || at >= buf.len()) {
                return Err(SecurityError::InvalidDescriptor(format!(
                    "{name} offset {at} outside descriptor of {} bytes",
                    buf.len()
                )));
            }
        }

        let owner = match owner_at {
            0 => None,
            at => Some(Sid::decode_prefix(&buf[at..]).map(|(sid, _)| sid).map_err(|e| {
                SecurityError::InvalidDescriptor(format!("owner: {e}"))
            })?),
        };

        let dacl = if control & SE_DACL_PRESENT != 0 && dacl_at != 0 {
            Some(Acl::decode(&buf[dacl_at..])?)
        } else {
            None
        };

        Ok(Self {
            owner,
            dacl,
            dacl_protected: control & SE_DACL_PROTECTED != 0,
        })
    }

    /// Encodes owner then DACL after the header; group and SACL stay absent.
    pub fn to_self_relative(&self) -> Result<Vec<u8>> {
        let mut control = SE_SELF_RELATIVE;
        if self.dacl_protected {
            control |= SE_DACL_PROTECTED;
        }
        let mut out = vec![0u8; DESCRIPTOR_HEADER_LEN];
        out[0] = SECURITY_DESCRIPTOR_REVISION;

        if let Some(owner) = &self.owner {
            let at = out.len() as u32;
            out[4..8].copy_from_slice(&at.to_le_bytes());
            owner.write_to(&mut out);
        }
        if let Some(dacl) = &self.dacl {
            control |= SE_DACL_PRESENT;
            let at = out.len() as u32;
            out[16..20].copy_from_slice(&at.to_le_bytes());
            out.extend_from_slice(&dacl.encode()?);
        }
        out[2..4].copy_from_slice(&control.to_le_bytes());
        Ok(out)
    }
}

/// The parts of a descriptor to apply in one logical update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DescriptorUpdate {
    pub owner: Option<Sid>,
    pub dacl: Option<Acl>,
    pub dacl_protected: bool,
}

impl DescriptorUpdate {
    pub fn is_empty(&self) -> bool {
        self.owner.is_none() && self.dacl.is_none()
    }
}
