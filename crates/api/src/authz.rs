//! Command-boundary authorization.
//!
//! Handlers call [`authorize_command`] before dispatching; aggregates and the
//! dispatcher stay unaware of roles.

use sahakari_auth::{
    authorize, permissions_for_roles, AuthzError, CommandAuthorization, Permission, Principal,
    TenantMembership,
};

use crate::context::{PrincipalContext, TenantContext};

fn principal_for(tenant: &TenantContext, principal: &PrincipalContext) -> Principal {
    Principal {
        principal_id: principal.principal_id(),
        active_tenant_id: tenant.tenant_id(),
        membership: TenantMembership {
            tenant_id: tenant.tenant_id(),
            roles: principal.roles().to_vec(),
            permissions: permissions_for_roles(principal.roles()),
        },
    }
}

/// Check every permission `command` requires in the current request context.
pub fn authorize_command<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = principal_for(tenant, principal);
    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }
    Ok(())
}

/// Same check for queries, which carry no command.
pub fn authorize_read(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: &'static str,
) -> Result<(), AuthzError> {
    authorize(&principal_for(tenant, principal), &Permission::new(permission))
}

#[cfg(test)]
mod tests {
    use sahakari_auth::{PrincipalId, Role};
    use sahakari_core::TenantId;

    use super::*;
    use crate::app::routes::common::CmdAuth;

    fn ctx(roles: Vec<Role>) -> (TenantContext, PrincipalContext) {
        (
            TenantContext::new(TenantId::new()),
            PrincipalContext::new(PrincipalId::new(), roles),
        )
    }

    #[test]
    fn admin_may_do_anything() {
        let (t, p) = ctx(vec![Role::admin()]);
        let cmd = CmdAuth::new((), "admin_fund.write");
        assert!(authorize_command(&t, &p, &cmd).is_ok());
        assert!(authorize_read(&t, &p, "reports.read").is_ok());
    }

    #[test]
    fn client_records_entries_but_not_admin_funds() {
        let (t, p) = ctx(vec![Role::client()]);
        assert!(authorize_command(&t, &p, &CmdAuth::new((), "passbook.write")).is_ok());
        assert!(authorize_command(&t, &p, &CmdAuth::new((), "admin_fund.write")).is_err());
    }

    #[test]
    fn member_is_read_only() {
        let (t, p) = ctx(vec![Role::member()]);
        assert!(authorize_read(&t, &p, "passbook.read").is_ok());
        assert!(authorize_command(&t, &p, &CmdAuth::new((), "members.write")).is_err());
        assert!(authorize_read(&t, &p, "expenses.read").is_err());
    }
}
