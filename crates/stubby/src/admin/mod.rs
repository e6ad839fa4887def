//! Admin (control plane) REST API over the endpoint store.
//!
//! Routes, relative to the configured prefix:
//! - `GET /ping`
//! - `GET|POST|DELETE /endpoints`
//! - `GET|PUT|DELETE /endpoints/{id}`

mod handlers;
mod router;

pub use router::{dispatch, handle_admin_request, AdminContext};
