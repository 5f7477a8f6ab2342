//! Owned, validated Windows security identifier.
//!
//! The binary layout is `revision:u8, sub_authority_count:u8,
//! identifier_authority:[u8; 6] (big-endian), sub_authority:[u32 LE; count]`.
//! Two SIDs are equal exactly when their encodings are equal.

use std::fmt::{self, Display};
use std::str::FromStr;

use arrayvec::ArrayVec;
use serde::{Serialize, Serializer};

use crate::error::{Result, SecurityError};

pub const SID_REVISION: u8 = 1;
pub const MIN_SUBAUTHORITY_COUNT: usize = 1;
pub const MAX_SUBAUTHORITY_COUNT: usize = 15;
/// Revision, count and the six authority bytes.
pub const SID_HEADER_LEN: usize = 8;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Sid {
    revision: u8,
    identifier_authority: [u8; 6],
    sub_authority: ArrayVec<u32, MAX_SUBAUTHORITY_COUNT>,
}

impl Sid {
    pub fn new(identifier_authority: u64, sub_authority: &[u32]) -> Result<Self> {
        if identifier_authority > 0xFFFF_FFFF_FFFF {
            return Err(SecurityError::InvalidSid(format!(
                "identifier authority {identifier_authority:#x} exceeds 48 bits"
            )));
        }
        if !(MIN_SUBAUTHORITY_COUNT..=MAX_SUBAUTHORITY_COUNT).contains(&sub_authority.len()) {
            return Err(SecurityError::InvalidSid(format!(
                "{} sub-authorities, expected {MIN_SUBAUTHORITY_COUNT}..={MAX_SUBAUTHORITY_COUNT}",
                sub_authority.len()
            )));
        }
        let be = identifier_authority.to_be_bytes();
        let mut authority = [0u8; 6];
        authority.copy_from_slice(&be[2..]);

        Ok(Self {
            revision: SID_REVISION,
            identifier_authority: authority,
            sub_authority: sub_authority.iter().copied().collect(),
        })
    }

    /// Byte length of the SID that starts `buf`, read from its count field.
    pub fn peek_len(buf: &[u8]) -> Result<usize> {
        if buf.len() < SID_HEADER_LEN {
            return Err(SecurityError::InvalidSid(format!(
                "{} bytes is shorter than a SID header",
                buf.len()
            )));
        }
        let count = buf[1] as usize;
        if !(MIN_SUBAUTHORITY_COUNT..=MAX_SUBAUTHORITY_COUNT).contains(&count) {
            return Err(SecurityError::InvalidSid(format!(
                "sub-authority count {count} out of range"
            )));
        }
        Ok(SID_HEADER_LEN + 4 * count)
    }

    /// Decodes the SID at the start of `buf`; trailing bytes are left to the caller.
    pub fn decode_prefix(buf: &[u8]) -> Result<(Self, usize)> {
        let len = Self::peek_len(buf)?;
        if buf.len() < len {
            return Err(SecurityError::InvalidSid(format!(
                "SID needs {len} bytes, only {} available",
                buf.len()
            )));
        }
        if buf[0] != SID_REVISION {
            return Err(SecurityError::InvalidSid(format!("unsupported revision {}", buf[0])));
        }

        let mut identifier_authority = [0u8; 6];
        identifier_authority.copy_from_slice(&buf[2..SID_HEADER_LEN]);

        let sub_authority = buf[SID_HEADER_LEN..len]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok((
            Self {
                revision: buf[0],
                identifier_authority,
                sub_authority,
            },
            len,
        ))
    }

    /// Decodes a buffer that must hold exactly one SID.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let (sid, len) = Self::decode_prefix(buf)?;
        if len != buf.len() {
            return Err(SecurityError::InvalidSid(format!(
                "{} trailing bytes after SID",
                buf.len() - len
            )));
        }
        Ok(sid)
    }

    pub fn encoded_len(&self) -> usize {
        SID_HEADER_LEN + 4 * self.sub_authority.len()
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.revision);
        out.push(self.sub_authority.len() as u8);
        out.extend_from_slice(&self.identifier_authority);
        for sub in &self.sub_authority {
            out.extend_from_slice(&sub.to_le_bytes());
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut out);
        out
    }

    pub fn identifier_authority(&self) -> u64 {
        let mut be = [0u8; 8];
        be[2..].copy_from_slice(&self.identifier_authority);
        u64::from_be_bytes(be)
    }

    pub fn sub_authorities(&self) -> &[u32] {
        &self.sub_authority
    }

    /// Last sub-authority; the relative identifier for account SIDs.
    pub fn rid(&self) -> u32 {
        self.sub_authority.last().copied().unwrap_or_default()
    }
}

impl Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.revision)?;

        let authority = self.identifier_authority();
        if authority <= 0xFFFF_FFFF {
            write!(f, "-{authority}")?;
        } else {
            write!(f, "-0x{authority:X}")?;
        }

        for sub in &self.sub_authority {
            write!(f, "-{sub}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sid({self})")
    }
}

impl FromStr for Sid {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SecurityError::InvalidSid(format!("'{s}' is not a SID string"));

        let mut parts = s.trim().split('-');
        if !parts
            .next()
            .is_some_and(|head| head.eq_ignore_ascii_case("s"))
        {
            return Err(invalid());
        }
        let revision = parts
            .next()
            .and_then(|r| r.parse::<u8>().ok())
            .ok_or_else(invalid)?;
        if revision != SID_REVISION {
            return Err(invalid());
        }

        let authority = parts.next().ok_or_else(invalid)?;
        let authority = match authority
            .strip_prefix("0x")
            .or_else(|| authority.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16).map_err(|_| invalid())?,
            None => authority.parse::<u64>().map_err(|_| invalid())?,
        };

        let mut subs = Vec::new();
        for part in parts {
            subs.push(part.parse::<u32>().map_err(|_| invalid())?);
        }

        Sid::new(authority, &subs)
    }
}

impl Serialize for Sid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
