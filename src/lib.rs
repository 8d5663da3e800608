//! Dynamic client for REST APIs.
//!
//! Public API layers:
//! - [`Api`]: root factory, validates configuration and owns the shared
//!   session and serializer.
//! - [`Resource`]: one URL; derives children (`child`, `path`, `call`) and
//!   issues verbs (`get`, `post`, `put`, `patch`, `delete`, `head`, `options`).
//! - [`Serializer`]: codec registry keyed by format and media type.
//! - [`Session`]: transport seam, [`HttpSession`] by default.
//! - [`ClientError`]: unified error type used by all of the above.

mod api;
mod error;
mod outcome;
mod resource;
pub mod serialize;
mod session;

pub use api::{Api, ApiBuilder};
/// Error type returned by all client operations.
pub use error::ClientError;
pub use outcome::{Body, Outcome};
pub use resource::{CallArgs, Resource};
pub use serialize::{Codec, Serializer};
pub use session::{Auth, HttpSession, Request, Response, Session, Upload};
