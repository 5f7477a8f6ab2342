use std::path::Path;

use security::{
    Ace, AceType, Acl, AclReader, DescriptorUpdate, MemorySecurityService, SecurityDescriptor,
    SecurityService, Sid, ACL_REVISION,
};

fn sid(s: &str) -> Sid {
    s.parse().unwrap()
}

/// A DACL as a file server would hand it out: inherited entries, a callback
/// entry with application data and four bytes of free space at the end.
fn captured_dacl() -> Vec<u8> {
    let mut callback = Ace::allow(0x0012_0089, sid("S-1-5-21-5-6-7-1150"));
    callback.header.ace_type = AceType::AccessAllowedCallback;
    callback.trailer = b"artx\x00\x00\x00\x00".to_vec();
    callback.header.size += 8;

    let acl = Acl::new(
        ACL_REVISION,
        vec![
            Ace::allow(0x001F_01FF, sid("S-1-5-18")).with_flags(0x13),
            Ace::deny(0x0000_0040, sid("S-1-5-21-5-6-7-1101")),
            callback,
            Ace::allow(0x0012_00A9, sid("S-1-5-32-545")).with_flags(0x10),
        ],
    );
    let mut bytes = acl.encode().unwrap();
    bytes.extend_from_slice(&[0; 4]);
    let size = bytes.len() as u16;
    bytes[2..4].copy_from_slice(&size.to_le_bytes());
    bytes
}

#[test]
fn captured_dacl_reencodes_without_free_space() {
    let raw = captured_dacl();
    let acl = Acl::decode(&raw).unwrap();
    assert_eq!(acl.len(), 4);
    assert!(acl.entries[0].header.is_inherited());
    assert_eq!(acl.entries[2].trailer.len(), 8);

    let encoded = acl.encode().unwrap();
    assert_eq!(encoded[..2], raw[..2]);
    assert_eq!(encoded[4..], raw[4..raw.len() - 4]);
    let header = AclReader::new(&encoded).read_header().unwrap();
    assert_eq!(header.size as usize, raw.len() - 4);
}

#[test]
fn dropping_entries_shrinks_and_keeps_order() {
    let acl = Acl::decode(&captured_dacl()).unwrap();
    let kept: Vec<Ace> = acl
        .entries
        .iter()
        .filter(|ace| !ace.trustee.to_string().starts_with("S-1-5-21-"))
        .cloned()
        .collect();
    let rebuilt = Acl::new(acl.revision, kept);
    let bytes = rebuilt.validate().unwrap();

    let decoded = Acl::decode(&bytes).unwrap();
    let trustees: Vec<String> = decoded.entries.iter().map(|a| a.trustee.to_string()).collect();
    assert_eq!(trustees, vec!["S-1-5-18", "S-1-5-32-545"]);
    assert!(bytes.len() < captured_dacl().len());
}

#[test]
fn memory_service_stores_what_the_codec_accepts() {
    let service = MemorySecurityService::new();
    let path = Path::new("C:\\projects\\plan.docx");
    let sd = SecurityDescriptor::from_self_relative(
        &SecurityDescriptor::new(
            Some(sid("S-1-5-21-5-6-7-1101")),
            Some(Acl::decode(&captured_dacl()).unwrap()),
        )
        .to_self_relative()
        .unwrap(),
    )
    .unwrap();
    service.set_descriptor(path, sd);

    service
        .write_descriptor(
            path,
            &DescriptorUpdate {
                owner: Some(sid("S-1-5-32-544")),
                dacl: Some(Acl::empty()),
                dacl_protected: false,
            },
        )
        .unwrap();

    let stored = service.read_descriptor(path).unwrap();
    assert_eq!(stored.owner, Some(sid("S-1-5-32-544")));
    assert_eq!(stored.dacl.map(|d| d.len()), Some(0));
    assert_eq!(service.write_count(), 1);
}
