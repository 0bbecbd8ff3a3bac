use crate::http::error::RouteError;
use crate::http::method::Method;
use crate::http::request::Request;
use crate::http::response::{NOT_A_METHOD_ERROR, Response};
use crate::http::route::Route;
use std::collections::HashMap;

/// Anything the router can hand a request to.
pub trait Handle: Send + Sync {
    fn handle(&self, request: &mut Request, response: &mut Response);
}

/// Routes grouped by method.
///
/// A route whose literal pattern equals the remaining path wins outright;
/// otherwise the best-scoring route for the method is picked, earliest
/// registration first on ties.
#[derive(Debug, Default)]
pub struct Handler {
    routes: HashMap<Method, Vec<Route>>,
}

impl Handler {
    pub fn new() -> Handler {
        Handler::default()
    }

    pub fn add_route(&mut self, method: Method, route: Route) -> &mut Self {
        self.routes.entry(method).or_default().push(route);
        self
    }

    pub fn route<F>(&mut self, method: Method, pattern: &str, f: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let route = Route::new(pattern, f)?;
        Ok(self.add_route(method, route))
    }

    pub fn get<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::GET, pattern, f)
    }

    pub fn post<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::POST, pattern, f)
    }

    pub fn put<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::PUT, pattern, f)
    }

    pub fn delete<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::DELETE, pattern, f)
    }

    pub fn head<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::HEAD, pattern, f)
    }

    pub fn has_routes(&self, method: Method) -> bool {
        self.routes.get(&method).is_some_and(|routes| !routes.is_empty())
    }

    /// The route that answers `method` on `path`, if any.
    pub fn resolve(&self, method: Method, path: &[String]) -> Option<&Route> {
        let routes = self.routes.get(&method)?;

        let mut best = None;
        let mut best_fit = 0;
        for route in routes {
            if route.matches_exactly(path) {
                return Some(route);
            }

            let score = route.score(path);
            if score > best_fit {
                best = Some(route);
                best_fit = score;
            }
        }
        best
    }
}

impl Handle for Handler {
    fn handle(&self, request: &mut Request, response: &mut Response) {
        let method = request.method();
        if !self.has_routes(method) {
            response.message(501, format!("No {} routes exist.", method));
            return;
        }

        match self.resolve(method, request.segments()) {
            Some(route) => {
                tracing::debug!(%method, pattern = route.pattern(), "route matched");
                route.invoke(request, response);
            }
            None => {
                tracing::debug!(%method, path = request.path(), "no route matched");
                response.message(501, NOT_A_METHOD_ERROR);
            }
        }
    }
}

/// Answers every request with the same status and text.
#[derive(Debug, Clone)]
pub struct MessageHandler {
    code: u16,
    message: String,
}

impl MessageHandler {
    pub fn new(code: u16, message: impl Into<String>) -> MessageHandler {
        MessageHandler {
            code,
            message: message.into(),
        }
    }

    pub fn ok(message: impl Into<String>) -> MessageHandler {
        MessageHandler::new(200, message)
    }
}

impl Handle for MessageHandler {
    fn handle(&self, _request: &mut Request, response: &mut Response) {
        response.message(self.code, self.message.clone());
    }
}

const ERROR_MESSAGES: &[&str] = &[
    "Well, that went well...",
    "That's not a good sound.",
    "Oh God, oh God, we're all gonna die.",
    "What a crazy random happenstance!",
    "Uh, everything's under control. Situation normal.",
    "Uh, we had a slight weapons malfunction, but, uh... everything's perfectly all right now. \
     We're fine. We're all fine here now, thank you. How are you?",
    "Definitely feeling aggressive tendency, sir!",
    "If they move, shoot 'em.",
];

/// Last resort: a fixed error status with a message picked at random from a
/// set.
#[derive(Debug, Clone)]
pub struct ErrorHandler {
    code: u16,
    messages: Vec<String>,
}

impl ErrorHandler {
    pub fn new(code: u16) -> ErrorHandler {
        ErrorHandler::with_messages(code, ERROR_MESSAGES.iter().copied())
    }

    /// Falls back to the stock messages when `messages` is empty.
    pub fn with_messages<I, S>(code: u16, messages: I) -> ErrorHandler
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let messages: Vec<String> = messages.into_iter().map(Into::into).collect();
        if messages.is_empty() {
            return ErrorHandler::new(code);
        }
        ErrorHandler { code, messages }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        ErrorHandler::new(500)
    }
}

impl Handle for ErrorHandler {
    fn handle(&self, _request: &mut Request, response: &mut Response) {
        let message = &self.messages[fastrand::usize(..self.messages.len())];
        response.message(self.code, message.clone());
    }
}
