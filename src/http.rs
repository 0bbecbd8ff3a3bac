//! HTTP/1.1 engine: parse a request off a connection, route it to a handler,
//! run the best-fitting route and write the response back.

pub mod error;
pub mod form;
pub mod handler;
pub mod method;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;
pub mod status;

pub use error::{ProtocolError, RespondError, RouteError};
pub use handler::{ErrorHandler, Handle, Handler, MessageHandler};
pub use method::Method;
pub use request::Request;
pub use response::Response;
pub use route::{Behavior, Route, Segment};
pub use router::Router;
pub use server::Server;

const BUFFER_SIZE: usize = 1024;
