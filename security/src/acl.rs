//! Bounds-checked codec for the ACL binary layout.
//!
//! `AclReader` walks a borrowed byte span and hands out owned [`Ace`] values;
//! `AclWriter` assembles a new buffer and recomputes the header on `finish`.
//! Every offset is validated against the span before it is read.

use crate::ace::{Ace, ACE_HEADER_LEN};
use crate::error::{Result, SecurityError};

/// `revision:u8, sbz1:u8, size:u16, count:u16, sbz2:u16`.
pub const ACL_HEADER_LEN: usize = 8;
pub const ACL_REVISION: u8 = 2;
pub const ACL_REVISION_DS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclHeader {
    pub revision: u8,
    pub size: u16,
    pub count: u16,
}

pub struct AclReader<'a> {
    buf: &'a [u8],
}

impl<'a> AclReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn read_header(&self) -> Result<AclHeader> {
        if self.buf.len() < ACL_HEADER_LEN {
            return Err(SecurityError::InvalidDescriptor(format!(
                "ACL buffer of {} bytes is shorter than its header",
                self.buf.len()
            )));
        }
        let revision = self.buf[0];
        if revision != ACL_REVISION && revision != ACL_REVISION_DS {
            return Err(SecurityError::InvalidDescriptor(format!(
                "unsupported ACL revision {revision}"
            )));
        }
        let size = u16::from_le_bytes([self.buf[2], self.buf[3]]);
        let count = u16::from_le_bytes([self.buf[4], self.buf[5]]);
        if (size as usize) < ACL_HEADER_LEN || size as usize > self.buf.len() {
            return Err(SecurityError::InvalidDescriptor(format!(
                "ACL declares {size} bytes, buffer holds {}",
                self.buf.len()
            )));
        }
        Ok(AclHeader {
            revision,
            size,
            count,
        })
    }

    /// Reads the entry at `offset`, bounded by the declared ACL size.
    /// Returns the entry and the offset of the next one.
    pub fn read_entry(&self, offset: usize) -> Result<(Ace, usize)> {
        let header = self.read_header()?;
        let end = header.size as usize;
        if offset < ACL_HEADER_LEN || offset + ACE_HEADER_LEN > end {
            return Err(SecurityError::InvalidDescriptor(format!(
                "entry offset {offset} outside ACL body {ACL_HEADER_LEN}..{end}"
            )));
        }
        let (ace, size) = Ace::decode(&self.buf[offset..end])?;
        if ace.header.ace_type.requires_ds_revision() && header.revision < ACL_REVISION_DS {
            return Err(SecurityError::InvalidDescriptor(format!(
                "{} entry inside a revision {} ACL",
                ace.header.ace_type, header.revision
            )));
        }
        Ok((ace, offset + size))
    }

    /// Decodes every entry the header announces.
    pub fn read_all(&self) -> Result<Acl> {
        let header = self.read_header()?;
        let mut entries = Vec::with_capacity(header.count as usize);
        let mut offset = ACL_HEADER_LEN;
        for index in 0..header.count {
            let (ace, next) = self.read_entry(offset).map_err(|e| {
                SecurityError::InvalidDescriptor(format!("entry {index}: {e}"))
            })?;
            entries.push(ace);
            offset = next;
        }
        Ok(Acl {
            revision: header.revision,
            entries,
        })
    }
}

pub struct AclWriter {
    revision: u8,
    buf: Vec<u8>,
    count: usize,
}

impl AclWriter {
    pub fn new(revision: u8) -> Self {
        let mut writer = Self {
            revision,
            buf: Vec::with_capacity(ACL_HEADER_LEN),
            count: 0,
        };
        writer.buf.resize(ACL_HEADER_LEN, 0);
        writer
    }

    pub fn append_entry(&mut self, ace: &Ace) -> Result<()> {
        if ace.header.ace_type.requires_ds_revision() && self.revision < ACL_REVISION_DS {
            return Err(SecurityError::InvalidAcl(format!(
                "{} entry needs ACL revision {ACL_REVISION_DS}, writer uses {}",
                ace.header.ace_type, self.revision
            )));
        }
        ace.write_to(&mut self.buf)?;
        self.count += 1;
        Ok(())
    }

    /// Stamps the header with the exact size and count of what was appended.
    pub fn write_header(&mut self) -> Result<AclHeader> {
        let size = u16::try_from(self.buf.len()).map_err(|_| {
            SecurityError::InvalidAcl(format!("ACL of {} bytes exceeds 65535", self.buf.len()))
        })?;
        let count = u16::try_from(self.count).map_err(|_| {
            SecurityError::InvalidAcl(format!("{} entries exceed 65535", self.count))
        })?;
        self.buf[0] = self.revision;
        self.buf[1] = 0;
        self.buf[2..4].copy_from_slice(&size.to_le_bytes());
        self.buf[4..6].copy_from_slice(&count.to_le_bytes());
        self.buf[6..8].copy_from_slice(&0u16.to_le_bytes());
        Ok(AclHeader {
            revision: self.revision,
            size,
            count,
        })
    }

    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.write_header()?;
        Ok(self.buf)
    }
}

/// A decoded ACL: header revision plus entries in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    pub revision: u8,
    pub entries: Vec<Ace>,
}

impl Acl {
    pub fn new(revision: u8, entries: Vec<Ace>) -> Self {
        Self { revision, entries }
    }

    pub fn empty() -> Self {
        Self::new(ACL_REVISION, Vec::new())
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        AclReader::new(buf).read_all()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = AclWriter::new(self.revision);
        for ace in &self.entries {
            writer.append_entry(ace)?;
        }
        writer.finish()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Header size plus the declared size of every entry.
    pub fn encoded_len(&self) -> usize {
        ACL_HEADER_LEN
            + self
                .entries
                .iter()
                .map(|ace| ace.header.size as usize)
                .sum::<usize>()
    }

    /// Encodes and decodes again, checking header counts and entry order survive.
    pub fn validate(&self) -> Result<Vec<u8>> {
        let bytes = self.encode()?;
        let header = AclReader::new(&bytes).read_header().map_err(|e| {
            SecurityError::InvalidAcl(format!("re-read header: {e}"))
        })?;
        if header.count as usize != self.entries.len() || header.size as usize != self.encoded_len()
        {
            return Err(SecurityError::InvalidAcl(format!(
                "header says {} entries / {} bytes, ACL has {} / {}",
                header.count,
                header.size,
                self.entries.len(),
                self.encoded_len()
            )));
        }
        let reparsed = Acl::decode(&bytes)
            .map_err(|e| SecurityError::InvalidAcl(format!("re-decode: {e}")))?;
        if reparsed != *self {
            return Err(SecurityError::InvalidAcl(
                "re-decoded entries differ from the rebuilt list".to_string(),
            ));
        }
        Ok(bytes)
    }
}

/// Lower-case hex dump used in diagnostics for rejected buffers.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}
