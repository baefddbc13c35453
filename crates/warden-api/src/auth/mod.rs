//! Bearer authentication and role-based authorization
//!
//! Token issuance and verification live in `warden_core`; this module only
//! adapts them to HTTP requests.

pub mod middleware;

pub use middleware::{
    authenticate, bearer_token, reject, require_access_token, require_bearer, require_role,
    AuthenticatedUser,
};
