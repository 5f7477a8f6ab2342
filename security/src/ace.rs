//! Access control entries, decoded into owned values.
//!
//! Every entry keeps the bytes it does not interpret (object GUIDs, callback
//! application data, padding) so that encoding it again is byte-exact.

use std::fmt;

use crate::error::{Result, SecurityError};
use crate::sid::Sid;

/// `type:u8, flags:u8, size:u16`.
pub const ACE_HEADER_LEN: usize = 4;
/// Header plus the access mask; the smallest body that can hold a trustee.
pub const ACE_FIXED_LEN: usize = ACE_HEADER_LEN + 4;

pub const ACE_OBJECT_TYPE_PRESENT: u32 = 0x1;
pub const ACE_INHERITED_OBJECT_TYPE_PRESENT: u32 = 0x2;
const GUID_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AceType {
    AccessAllowed,
    AccessDenied,
    SystemAudit,
    SystemAlarm,
    AccessAllowedCompound,
    AccessAllowedObject,
    AccessDeniedObject,
    SystemAuditObject,
    SystemAlarmObject,
    AccessAllowedCallback,
    AccessDeniedCallback,
    AccessAllowedCallbackObject,
    AccessDeniedCallbackObject,
    SystemAuditCallback,
    SystemAlarmCallback,
    SystemAuditCallbackObject,
    SystemAlarmCallbackObject,
    SystemMandatoryLabel,
    SystemResourceAttribute,
    SystemScopedPolicyId,
    Unknown(u8),
}

impl AceType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x00 => AceType::AccessAllowed,
            0x01 => AceType::AccessDenied,
            0x02 => AceType::SystemAudit,
            0x03 => AceType::SystemAlarm,
            0x04 => AceType::AccessAllowedCompound,
            0x05 => AceType::AccessAllowedObject,
            0x06 => AceType::AccessDeniedObject,
            0x07 => AceType::SystemAuditObject,
            0x08 => AceType::SystemAlarmObject,
            0x09 => AceType::AccessAllowedCallback,
            0x0A => AceType::AccessDeniedCallback,
            0x0B => AceType::AccessAllowedCallbackObject,
            0x0C => AceType::AccessDeniedCallbackObject,
            0x0D => AceType::SystemAuditCallback,
            0x0E => AceType::SystemAlarmCallback,
            0x0F => AceType::SystemAuditCallbackObject,
            0x10 => AceType::SystemAlarmCallbackObject,
            0x11 => AceType::SystemMandatoryLabel,
            0x12 => AceType::SystemResourceAttribute,
            0x13 => AceType::SystemScopedPolicyId,
            other => AceType::Unknown(other),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            AceType::AccessAllowed => 0x00,
            AceType::AccessDenied => 0x01,
            AceType::SystemAudit => 0x02,
            AceType::SystemAlarm => 0x03,
            AceType::AccessAllowedCompound => 0x04,
            AceType::AccessAllowedObject => 0x05,
            AceType::AccessDeniedObject => 0x06,
            AceType::SystemAuditObject => 0x07,
            AceType::SystemAlarmObject => 0x08,
            AceType::AccessAllowedCallback => 0x09,
            AceType::AccessDeniedCallback => 0x0A,
            AceType::AccessAllowedCallbackObject => 0x0B,
            AceType::AccessDeniedCallbackObject => 0x0C,
            AceType::SystemAuditCallback => 0x0D,
            AceType::SystemAlarmCallback => 0x0E,
            AceType::SystemAuditCallbackObject => 0x0F,
            AceType::SystemAlarmCallbackObject => 0x10,
            AceType::SystemMandatoryLabel => 0x11,
            AceType::SystemResourceAttribute => 0x12,
            AceType::SystemScopedPolicyId => 0x13,
            AceType::Unknown(raw) => raw,
        }
    }

    /// Object ACEs carry an object-flags word and optional GUIDs before the trustee.
    pub fn is_object(self) -> bool {
        matches!(
            self,
            AceType::AccessAllowedObject
                | AceType::AccessDeniedObject
                | AceType::SystemAuditObject
                | AceType::SystemAlarmObject
                | AceType::AccessAllowedCallbackObject
                | AceType::AccessDeniedCallbackObject
                | AceType::SystemAuditCallbackObject
                | AceType::SystemAlarmCallbackObject
        )
    }

    /// Object ACEs require the DS revision of the enclosing ACL.
    pub fn requires_ds_revision(self) -> bool {
        self.is_object()
    }
}

impl fmt::Display for AceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AceType::AccessAllowed => f.write_str("allow"),
            AceType::AccessDenied => f.write_str("deny"),
            AceType::AccessAllowedObject => f.write_str("allow-object"),
            AceType::AccessDeniedObject => f.write_str("deny-object"),
            AceType::AccessAllowedCallback => f.write_str("allow-callback"),
            AceType::AccessDeniedCallback => f.write_str("deny-callback"),
            AceType::SystemAudit => f.write_str("audit"),
            AceType::SystemMandatoryLabel => f.write_str("mandatory-label"),
            AceType::Unknown(raw) => write!(f, "type-{raw:#04x}"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AceHeader {
    pub ace_type: AceType,
    pub flags: u8,
    pub size: u16,
}

impl AceHeader {
    pub const OBJECT_INHERIT: u8 = 0x01;
    pub const CONTAINER_INHERIT: u8 = 0x02;
    pub const NO_PROPAGATE_INHERIT: u8 = 0x04;
    pub const INHERIT_ONLY: u8 = 0x08;
    pub const INHERITED: u8 = 0x10;

    pub fn is_inherited(&self) -> bool {
        self.flags & Self::INHERITED != 0
    }
}

/// One decoded entry. `prefix` holds the object-ACE fields between the mask
/// and the trustee, `trailer` whatever follows the trustee up to `header.size`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ace {
    pub header: AceHeader,
    pub mask: u32,
    pub prefix: Vec<u8>,
    pub trustee: Sid,
    pub trailer: Vec<u8>,
}

impl Ace {
    /// Builds a plain (non-object) entry with an exact, padding-free size.
    pub fn new(ace_type: AceType, flags: u8, mask: u32, trustee: Sid) -> Result<Self> {
        if ace_type.is_object() {
            return Err(SecurityError::InvalidAcl(format!(
                "{ace_type} entries need object fields, use Ace::decode"
            )));
        }
        if ace_type == AceType::AccessAllowedCompound {
            return Err(SecurityError::InvalidAcl(
                "compound entries have no single trustee".to_string(),
            ));
        }
        let size = ACE_FIXED_LEN + trustee.encoded_len();
        Ok(Self {
            header: AceHeader {
                ace_type,
                flags,
                size: size as u16,
            },
            mask,
            prefix: Vec::new(),
            trustee,
            trailer: Vec::new(),
        })
    }

    pub fn allow(mask: u32, trustee: Sid) -> Self {
        let size = ACE_FIXED_LEN + trustee.encoded_len();
        Self {
            header: AceHeader {
                ace_type: AceType::AccessAllowed,
                flags: 0,
                size: size as u16,
            },
            mask,
            prefix: Vec::new(),
            trustee,
            trailer: Vec::new(),
        }
    }

    pub fn deny(mask: u32, trustee: Sid) -> Self {
        let mut ace = Self::allow(mask, trustee);
        ace.header.ace_type = AceType::AccessDenied;
        ace
    }

    pub fn with_flags(mut self, flags: u8) -> Self {
        self.header.flags = flags;
        self
    }

    /// Size implied by the decoded parts; must equal `header.size`.
    pub fn encoded_len(&self) -> usize {
        ACE_FIXED_LEN + self.prefix.len() + self.trustee.encoded_len() + self.trailer.len()
    }

    /// Decodes one entry from `buf`, which must start at the entry header and
    /// may extend past it. Returns the entry and its declared size.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < ACE_HEADER_LEN {
            return Err(SecurityError::InvalidDescriptor(format!(
                "{} bytes left, entry header needs {ACE_HEADER_LEN}",
                buf.len()
            )));
        }
        let ace_type = AceType::from_raw(buf[0]);
        if ace_type == AceType::AccessAllowedCompound {
            return Err(SecurityError::InvalidDescriptor(
                "compound entries carry a server and a client SID, not a single trustee"
                    .to_string(),
            ));
        }
        let flags = buf[1];
        let size = u16::from_le_bytes([buf[2], buf[3]]) as usize;

        if size < ACE_FIXED_LEN || size % 4 != 0 {
            return Err(SecurityError::InvalidDescriptor(format!(
                "entry size {size} is not a DWORD multiple of at least {ACE_FIXED_LEN}"
            )));
        }
        if size > buf.len() {
            return Err(SecurityError::InvalidDescriptor(format!(
                "entry size {size} overruns the {} bytes left in the ACL",
                buf.len()
            )));
        }
        let body = &buf[..size];
        let mask = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);

        let sid_offset = if ace_type.is_object() {
            object_sid_offset(body)?
        } else {
            ACE_FIXED_LEN
        };

        let (trustee, sid_len) = Sid::decode_prefix(&body[sid_offset..]).map_err(|e| {
            SecurityError::InvalidDescriptor(format!("{ace_type} entry trustee: {e}"))
        })?;

        Ok((
            Self {
                header: AceHeader {
                    ace_type,
                    flags,
                    size: size as u16,
                },
                mask,
                prefix: body[ACE_FIXED_LEN..sid_offset].to_vec(),
                trustee,
                trailer: body[sid_offset + sid_len..].to_vec(),
            },
            size,
        ))
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.encoded_len() != self.header.size as usize {
            return Err(SecurityError::InvalidAcl(format!(
                "entry for {} declares {} bytes but encodes {}",
                self.trustee,
                self.header.size,
                self.encoded_len()
            )));
        }
        out.push(self.header.ace_type.raw());
        out.push(self.header.flags);
        out.extend_from_slice(&self.header.size.to_le_bytes());
        out.extend_from_slice(&self.mask.to_le_bytes());
        out.extend_from_slice(&self.prefix);
        self.trustee.write_to(out);
        out.extend_from_slice(&self.trailer);
        Ok(())
    }
}

fn object_sid_offset(body: &[u8]) -> Result<usize> {
    let flags_end = ACE_FIXED_LEN + 4;
    if body.len() < flags_end {
        return Err(SecurityError::InvalidDescriptor(
            "object entry too short for its flags word".to_string(),
        ));
    }
    let object_flags = u32::from_le_bytes([
        body[ACE_FIXED_LEN],
        body[ACE_FIXED_LEN + 1],
        body[ACE_FIXED_LEN + 2],
        body[ACE_FIXED_LEN + 3],
    ]);
    let mut offset = flags_end;
    if object_flags & ACE_OBJECT_TYPE_PRESENT != 0 {
        offset += GUID_LEN;
    }
    if object_flags & ACE_INHERITED_OBJECT_TYPE_PRESENT != 0 {
        offset += GUID_LEN;
    }
    if offset > body.len() {
        return Err(SecurityError::InvalidDescriptor(format!(
            "object entry GUIDs end at {offset}, past its size {}",
            body.len()
        )));
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> Sid {
        s.parse().unwrap()
    }

    #[test]
    fn plain_entry_size_matches_parts() {
        let ace = Ace::allow(0x001F_01FF, sid("S-1-5-21-1-2-3-1001"));
        assert_eq!(ace.header.size as usize, 8 + 28);
        let mut out = Vec::new();
        ace.write_to(&mut out).unwrap();
        let (decoded, size) = Ace::decode(&out).unwrap();
        assert_eq!(size, out.len());
        assert_eq!(decoded, ace);
    }

    #[test]
    fn object_entry_keeps_guids_and_finds_trustee() {
        let trustee = sid("S-1-5-21-9-9-9-500");
        let mut raw = vec![0x05, 0x00, 0, 0];
        raw.extend_from_slice(&0x0000_0100u32.to_le_bytes());
        raw.extend_from_slice(&ACE_OBJECT_TYPE_PRESENT.to_le_bytes());
        raw.extend_from_slice(&[0xAB; 16]);
        trustee.write_to(&mut raw);
        let size = raw.len() as u16;
        raw[2..4].copy_from_slice(&size.to_le_bytes());

        let (ace, _) = Ace::decode(&raw).unwrap();
        assert_eq!(ace.header.ace_type, AceType::AccessAllowedObject);
        assert_eq!(ace.trustee, trustee);
        assert_eq!(ace.prefix.len(), 4 + 16);

        let mut out = Vec::new();
        ace.write_to(&mut out).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn callback_data_survives_in_trailer() {
        let mut ace = Ace::allow(1, sid("S-1-1-0"));
        ace.header.ace_type = AceType::AccessAllowedCallback;
        ace.trailer = b"artx".to_vec();
        ace.header.size += 4;

        let mut out = Vec::new();
        ace.write_to(&mut out).unwrap();
        let (decoded, _) = Ace::decode(&out).unwrap();
        assert_eq!(decoded.trailer, b"artx");
    }

    #[test]
    fn rejects_size_that_overruns_or_misaligns() {
        let ace = Ace::allow(1, sid("S-1-1-0"));
        let mut out = Vec::new();
        ace.write_to(&mut out).unwrap();

        assert!(Ace::decode(&out[..out.len() - 4]).is_err());

        let mut odd = out.clone();
        odd[2] = 13;
        assert!(Ace::decode(&odd).is_err());
    }

    #[test]
    fn compound_entry_is_rejected() {
        let mut raw = vec![0x04, 0x00, 0, 0];
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&[1, 0, 0, 0]);
        sid("S-1-5-18").write_to(&mut raw);
        sid("S-1-5-21-1-2-3-1001").write_to(&mut raw);
        let size = raw.len() as u16;
        raw[2..4].copy_from_slice(&size.to_le_bytes());

        assert!(matches!(
            Ace::decode(&raw),
            Err(SecurityError::InvalidDescriptor(msg)) if msg.contains("compound")
        ));
        assert!(Ace::new(AceType::AccessAllowedCompound, 0, 1, sid("S-1-5-18")).is_err());
    }

    #[test]
    fn write_refuses_inconsistent_header() {
        let mut ace = Ace::deny(1, sid("S-1-5-18"));
        ace.header.size += 4;
        assert!(matches!(
            ace.write_to(&mut Vec::new()),
            Err(SecurityError::InvalidAcl(_))
        ));
    }

    #[test]
    fn new_rejects_object_types() {
        assert!(Ace::new(AceType::AccessAllowedObject, 0, 1, sid("S-1-5-18")).is_err());
        let ace = Ace::new(AceType::AccessDenied, AceHeader::INHERITED, 1, sid("S-1-5-18")).unwrap();
        assert!(ace.header.is_inherited());
    }
}
