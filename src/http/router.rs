use crate::http::handler::{ErrorHandler, Handle};
use crate::http::request::Request;
use std::collections::HashMap;
use std::sync::Arc;

/// Picks a handler by the first path segment.
///
/// Built once at startup and then only read, so a single `Arc<Router>` is
/// shared by every connection.
pub struct Router {
    handlers: HashMap<String, Arc<dyn Handle>>,
    default_handler: Option<Arc<dyn Handle>>,
    error_handler: Arc<dyn Handle>,
}

impl Default for Router {
    fn default() -> Self {
        Router {
            handlers: HashMap::new(),
            default_handler: None,
            error_handler: Arc::new(ErrorHandler::new(501)),
        }
    }
}

impl Router {
    pub fn new() -> Router {
        Router::default()
    }

    /// Serve requests whose first segment is `segment`. Surrounding slashes
    /// are ignored, so `"hello"` and `"/hello/"` register the same thing.
    pub fn add_handler(&mut self, segment: &str, handler: impl Handle + 'static) -> &mut Self {
        self.add_shared_handler(segment, Arc::new(handler))
    }

    pub fn add_shared_handler(&mut self, segment: &str, handler: Arc<dyn Handle>) -> &mut Self {
        self.handlers.insert(segment.trim_matches('/').to_string(), handler);
        self
    }

    /// Catch-all for first segments nobody registered. It sees the whole path.
    pub fn set_default_handler(&mut self, handler: impl Handle + 'static) -> &mut Self {
        self.default_handler = Some(Arc::new(handler));
        self
    }

    pub fn set_error_handler(&mut self, handler: impl Handle + 'static) -> &mut Self {
        self.error_handler = Arc::new(handler);
        self
    }

    pub fn has_handler(&self, segment: &str) -> bool {
        self.handlers.contains_key(segment.trim_matches('/'))
    }

    /// Resolve the handler for `request`, consuming its first segment when a
    /// registered handler claims it. Never fails: unclaimed requests go to the
    /// default handler, or failing that the error handler.
    pub fn route(&self, request: &mut Request) -> &dyn Handle {
        let first = request.segments().first().map(String::as_str).unwrap_or("");

        if let Some(handler) = self.handlers.get(first) {
            tracing::debug!(segment = first, "handler matched");
            request.consume_segment();
            return handler.as_ref();
        }
        if let Some(handler) = &self.default_handler {
            return handler.as_ref();
        }
        tracing::debug!(segment = first, "no handler, using error handler");
        self.error_handler.as_ref()
    }
}
