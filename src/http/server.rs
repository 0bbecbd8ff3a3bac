use crate::concurrency::Workers;
use crate::config::ServerConfig;
use crate::http::error::ProtocolError;
use crate::http::method::Method;
use crate::http::request::Request;
use crate::http::response::{self, EXCEPTION_ERROR, MALFORMED_INPUT_ERROR, Response};
use crate::http::router::Router;
use anyhow::Context;
use std::io::{self, BufReader, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
    workers: Workers,
    read_timeout: Option<Duration>,
}

impl Server {
    /// Bind the listening socket and install the server identity. The router
    /// is frozen from here on.
    pub fn bind(config: &ServerConfig, router: Router) -> anyhow::Result<Server> {
        config.validate()?;

        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr).with_context(|| format!("Can't bind address {}", addr))?;
        response::install_server_info(config.server_info());

        Ok(Server {
            listener,
            router: Arc::new(router),
            workers: Workers::new(config.workers)?,
            read_timeout: config.read_timeout(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the listener fails for good. Each connection
    /// is handled on its own thread; nothing that goes wrong there reaches
    /// this loop.
    pub fn run(self) -> anyhow::Result<()> {
        tracing::info!(address = %self.local_addr()?, "listening");

        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) if is_transient(&e) => {
                    tracing::warn!(error = %e, "client broke connection early");
                    continue;
                }
                Err(e) => return Err(e).context("Error listening"),
            };

            let router = Arc::clone(&self.router);
            let read_timeout = self.read_timeout;
            if let Err(e) = self
                .workers
                .execute(move || process_incoming(stream, &router, read_timeout))
            {
                tracing::error!(error = %e, "can't hand off connection");
            }
        }
        Ok(())
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
    )
}

/// Serve exactly one request on `stream`, then close it.
pub fn process_incoming(mut stream: TcpStream, router: &Router, read_timeout: Option<Duration>) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let span = tracing::info_span!("connection", %peer);
    let _enter = span.enter();

    if let Err(e) = stream.set_read_timeout(read_timeout) {
        tracing::warn!(error = %e, "can't set read timeout");
    }

    let parsed = {
        let mut rdr = BufReader::new(&stream);
        Request::parse(&mut rdr)
    };

    let (method, response) = match parsed {
        Ok(mut request) => {
            tracing::info!(request = %request, "accepted request");
            let response = dispatch(router, &mut request);
            (request.method(), response)
        }
        Err(e) if e.is_transport() || e.is_empty_request() => {
            tracing::warn!(error = %e, "abandoning connection");
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "rejecting request");
            (Method::GET, protocol_error_response(&e))
        }
    };

    let code = response.code();
    match response.respond(method, &mut stream) {
        Ok(()) => tracing::info!(code, "responded"),
        Err(e) => tracing::warn!(error = %e, code, "can't send response"),
    }
}

/// Route `request` and let the chosen handler fill in a response.
pub fn dispatch(router: &Router, request: &mut Request) -> Response {
    let mut response = Response::new();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        router.route(request).handle(request, &mut response);
    }));

    if outcome.is_err() {
        let mut failed = Response::new();
        failed.message(500, EXCEPTION_ERROR);
        return failed;
    }
    response
}

fn protocol_error_response(e: &ProtocolError) -> Response {
    let mut response = Response::new();
    match e {
        ProtocolError::UnknownMethod(_) => response.message(501, e.to_string()),
        _ => response.message(500, format!("{}: {}", MALFORMED_INPUT_ERROR, e)),
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::{Handle, Handler};

    fn request(target: &str) -> Request {
        let raw = format!("GET {} HTTP/1.1\r\n\r\n", target);
        Request::parse(&mut raw.as_bytes()).unwrap()
    }

    struct Exploding;

    impl Handle for Exploding {
        fn handle(&self, _: &mut Request, _: &mut Response) {
            panic!("handler bug");
        }
    }

    #[test]
    fn dispatch_runs_matched_route() {
        let mut api = Handler::new();
        api.get("/status", |_, resp| {
            resp.message(200, response::STATUS_GOOD);
            Ok(())
        })
        .unwrap();
        let mut router = Router::new();
        router.add_handler("api", api);

        let resp = dispatch(&router, &mut request("/api/status"));
        assert_eq!(resp.code(), 200);
        assert_eq!(resp.body(), Some(response::STATUS_GOOD.as_bytes()));
    }

    #[test]
    fn dispatch_contains_handler_panics() {
        let mut router = Router::new();
        router.set_default_handler(Exploding);

        let resp = dispatch(&router, &mut request("/anything"));
        assert_eq!(resp.code(), 500);
        assert_eq!(resp.body(), Some(EXCEPTION_ERROR.as_bytes()));
    }

    #[test]
    fn protocol_errors_map_to_status() {
        let resp = protocol_error_response(&ProtocolError::UnknownMethod("BREW".into()));
        assert_eq!(resp.code(), 501);

        let resp = protocol_error_response(&ProtocolError::MalformedHeader("oops".into()));
        assert_eq!(resp.code(), 500);
        let body = String::from_utf8(resp.body().unwrap().to_vec()).unwrap();
        assert!(body.starts_with(MALFORMED_INPUT_ERROR));
    }
}
