//! Static role → permission policy for societies.

use crate::{Permission, Role};

const CLIENT_PERMISSIONS: &[&str] = &[
    "members.read",
    "members.write",
    "passbook.read",
    "passbook.write",
    "loans.read",
    "loans.write",
    "expenses.read",
    "expenses.write",
    "admin_fund.read",
    "subscription.read",
    "reports.read",
];

const MEMBER_PERMISSIONS: &[&str] = &["members.read", "passbook.read", "loans.read", "reports.read"];

/// Effective permissions for a set of roles.
///
/// `admin` short-circuits to the wildcard. Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r.as_str() == Role::ADMIN) {
        return vec![Permission::wildcard()];
    }

    let mut out: Vec<Permission> = Vec::new();
    for role in roles {
        let granted = match role.as_str() {
            Role::CLIENT => CLIENT_PERMISSIONS,
            Role::MEMBER => MEMBER_PERMISSIONS,
            _ => &[],
        };
        for p in granted {
            let p = Permission::new(*p);
            if !out.contains(&p) {
                out.push(p);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_roles_grant_nothing() {
        assert!(permissions_for_roles(&[Role::new("auditor")]).is_empty());
    }

    #[test]
    fn overlapping_roles_are_deduplicated() {
        let perms = permissions_for_roles(&[Role::client(), Role::member()]);
        let reads = perms.iter().filter(|p| p.as_str() == "members.read").count();
        assert_eq!(reads, 1);
        assert!(!perms.iter().any(|p| p.as_str() == "admin_fund.write"));
    }
}
