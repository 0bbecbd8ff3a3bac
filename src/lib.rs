pub mod concurrency;
pub mod config;
pub mod http;
pub mod logging;

pub use config::ServerConfig;
pub use http::{Handle, Handler, Method, Request, Response, Router, Server};
