//! Authentication and authorization for society operators and members.
//!
//! Decoupled from HTTP and storage: the API derives a `Principal` from a
//! verified token and asks `authorize` before dispatching any command.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, AuthzError, CommandAuthorization, Principal};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use policy::permissions_for_roles;
pub use principal::{PrincipalId, TenantMembership};
pub use roles::Role;
