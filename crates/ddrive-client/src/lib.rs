//! ddrive-client: every call to the remote store goes through here
//!
//! - `transport`: request/response model and the `Transport` seam
//! - `http`: `reqwest` implementation of `Transport`
//! - `limiter`: global minimum spacing between dispatched calls
//! - `session`: access/refresh token storage (`SessionStore`)
//! - `pipeline`: bearer injection, throttling, single-retry renewal on 401
//! - `api`: typed remote-store operations on top of the pipeline

pub mod api;
pub mod http;
pub mod limiter;
pub mod pipeline;
pub mod session;
pub mod transport;

pub use api::{DriveApi, UserProfile};
pub use http::HttpTransport;
pub use limiter::RateLimiter;
pub use pipeline::{CallContext, Pipeline, ReauthHook};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore};
pub use transport::{ApiRequest, ApiResponse, Method, RequestBody, Transport, UploadForm};
