use security::{SecurityError, SecurityService, Sid};

/// 所有者替换器，持有启动时已验证可解析的替换主体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerReplacer {
    replacement: Sid,
    account_name: String,
}

impl OwnerReplacer {
    /// 解析并验证配置的替换主体（SID 字符串或账户名）
    ///
    /// 主体无法解析时返回 `InvalidReplacementPrincipal`，在处理任何对象之前终止运行。
    pub fn from_principal(
        service: &dyn SecurityService, principal: &str,
    ) -> Result<Self, SecurityError> {
        let invalid = |reason: String| SecurityError::InvalidReplacementPrincipal {
            principal: principal.to_string(),
            reason,
        };

        let principal = principal.trim();
        if principal.is_empty() {
            return Err(invalid("no principal configured".to_string()));
        }

        let sid = if looks_like_sid(principal) {
            principal
                .parse::<Sid>()
                .map_err(|e| invalid(e.to_string()))?
        } else {
            service
                .lookup_account(principal)
                .map_err(|e| invalid(format!("account lookup failed: {e}")))?
        };

        match service
            .resolve_principal(&sid)
            .map_err(|e| invalid(format!("resolving {sid} failed: {e}")))?
        {
            security::Resolution::Resolved { account_name } => {
                log::info!("Replacement owner {} resolves to {}", sid, account_name);
                Ok(Self {
                    replacement: sid,
                    account_name,
                })
            }
            security::Resolution::Unresolved => {
                Err(invalid(format!("{sid} does not resolve to an account")))
            }
        }
    }

    pub fn replacement(&self) -> &Sid {
        &self.replacement
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// 原所有者未孤立时原样返回，否则返回替换主体；不会有第三种结果
    pub fn replace<F>(&self, owner: &Sid, is_orphan: F) -> Result<Sid, SecurityError>
    where
        F: FnOnce(&Sid) -> Result<bool, SecurityError>,
    {
        if is_orphan(owner)? {
            Ok(self.replacement.clone())
        } else {
            Ok(owner.clone())
        }
    }
}

fn looks_like_sid(text: &str) -> bool {
    match (text.get(..2), text.get(2..)) {
        (Some(head), Some(rest)) => {
            head.eq_ignore_ascii_case("s-") && rest.starts_with(|c: char| c.is_ascii_digit())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use security::MemorySecurityService;

    fn sid(s: &str) -> Sid {
        s.parse().unwrap()
    }

    fn service() -> MemorySecurityService {
        let service = MemorySecurityService::new();
        service.add_account(sid("S-1-5-21-4-4-4-500"), "Administrator");
        service
    }

    #[test]
    fn accepts_account_name_or_sid() {
        let service = service();
        let by_name = OwnerReplacer::from_principal(&service, "Administrator").unwrap();
        let by_sid = OwnerReplacer::from_principal(&service, "S-1-5-21-4-4-4-500").unwrap();
        assert_eq!(by_name.replacement(), by_sid.replacement());
        assert_eq!(by_name.account_name(), "Administrator");
    }

    #[test]
    fn rejects_unresolvable_principals() {
        let service = service();
        for principal in ["nobody", "S-1-5-21-4-4-4-9999", "S-1-x", ""] {
            assert!(
                matches!(
                    OwnerReplacer::from_principal(&service, principal),
                    Err(SecurityError::InvalidReplacementPrincipal { .. })
                ),
                "{principal} should be rejected"
            );
        }
    }

    #[test]
    fn sid_detection() {
        assert!(looks_like_sid("S-1-5-32-544"));
        assert!(looks_like_sid("s-1-5-18"));
        assert!(!looks_like_sid("Sales"));
        assert!(!looks_like_sid("S-"));
    }

    proptest! {
        #[test]
        fn replace_never_yields_a_third_value(rid in 1000u32..2000, orphan in any::<bool>()) {
            let service = service();
            let replacer = OwnerReplacer::from_principal(&service, "Administrator").unwrap();
            let owner = Sid::new(5, &[21, 9, 9, 9, rid]).unwrap();

            let result = replacer.replace(&owner, |_| Ok(orphan)).unwrap();
            if orphan {
                prop_assert_eq!(&result, replacer.replacement());
            } else {
                prop_assert_eq!(result, owner);
            }
        }
    }
}
