//! `holdfast-auth` — capability checks for reservation overrides.
//!
//! Authentication is handled upstream; this crate only answers whether an
//! already-identified actor may bypass an ordinary precondition.

pub mod authorize;
pub mod permissions;
pub mod principal;

pub use authorize::{authorize, AuthzError};
pub use permissions::Permission;
pub use principal::Actor;
