//! End-to-end tests against a live server on an ephemeral port.

use anyhow::bail;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;
use switchyard::http::response::NOT_A_METHOD_ERROR;
use switchyard::http::{Handler, MessageHandler};
use switchyard::{Router, Server, ServerConfig};

fn start(router: Router, workers: Option<usize>) -> SocketAddr {
    start_with(
        router,
        ServerConfig {
            workers,
            ..ServerConfig::default()
        },
    )
}

fn start_with(router: Router, config: ServerConfig) -> SocketAddr {
    let config = ServerConfig { port: 0, ..config };
    let server = Server::bind(&config, router).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.run());
    addr
}

fn send(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    stream.write_all(raw.as_bytes()).unwrap();

    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

fn get(addr: SocketAddr, target: &str) -> String {
    send(addr, &format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target))
}

fn body(response: &str) -> &str {
    response.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("")
}

fn demo_router() -> Router {
    let mut hello = Handler::new();
    hello
        .get("/", |_, resp| {
            resp.set_body("Hello World!");
            Ok(())
        })
        .unwrap()
        .get("/{name}", |req, resp| {
            resp.set_body(format!("Hello {}!", req.param("name").unwrap_or_default()));
            Ok(())
        })
        .unwrap()
        .get("/{first}/{last}", |req, resp| {
            resp.set_body(format!(
                "Hello {} {}!",
                req.param("first").unwrap_or_default(),
                req.param("last").unwrap_or_default()
            ));
            Ok(())
        })
        .unwrap()
        .get("/{*}", |req, resp| {
            resp.set_body(format!("varargs={}", req.varargs().join(",")));
            Ok(())
        })
        .unwrap();

    let mut search = Handler::new();
    search
        .get("/", |req, resp| {
            resp.set_body(format!(
                "q={} page={} segments={}",
                req.param("q").unwrap_or_default(),
                req.param("page").unwrap_or_default(),
                req.segments().len()
            ));
            Ok(())
        })
        .unwrap();

    let mut forms = Handler::new();
    forms
        .post("/", |req, resp| {
            resp.set_body(format!("name={}", req.param("name").unwrap_or_default()));
            resp.set_mime_type("text/html");
            Ok(())
        })
        .unwrap()
        .get("/fail", |_, _| bail!("database unavailable"))
        .unwrap()
        .get("/quiet", |_, _| Ok(()))
        .unwrap();

    let mut router = Router::new();
    router.add_handler("hello", hello);
    router.add_handler("search", search);
    router.add_handler("form", forms);
    router.add_handler("status", MessageHandler::ok("up"));
    router
}

#[test]
fn dynamic_segment_round_trip() {
    let addr = start(demo_router(), None);
    let resp = get(addr, "/hello/Ada");

    assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(resp.contains("Connection: close\r\n"));
    assert!(resp.contains("Content-Type: text/plain\r\n"));
    assert!(resp.contains("Content-Size: 10\r\n"));
    assert_eq!(body(&resp), "Hello Ada!");
}

#[test]
fn routes_pick_best_fit() {
    let addr = start(demo_router(), None);

    assert_eq!(body(&get(addr, "/hello")), "Hello World!");
    assert_eq!(body(&get(addr, "/hello/Ada/Lovelace")), "Hello Ada Lovelace!");
    assert_eq!(body(&get(addr, "/hello/a/b/c")), "varargs=a,b,c");
}

#[test]
fn query_string_becomes_params() {
    let addr = start(demo_router(), None);
    let resp = get(addr, "/search?q=cats&page=2");
    assert_eq!(body(&resp), "q=cats page=2 segments=0");
}

#[test]
fn post_form_body_becomes_params() {
    let addr = start(demo_router(), None);
    let form = "name=Grace+Hopper&lang=cobol";
    let resp = send(
        addr,
        &format!(
            "POST /form HTTP/1.1\r\nContent-Length: {}\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\n{}",
            form.len(),
            form
        ),
    );

    assert!(resp.contains("Content-Type: text/html\r\n"));
    assert_eq!(body(&resp), "name=Grace Hopper");
}

#[test]
fn head_request_gets_no_body() {
    let addr = start(demo_router(), None);
    let mut hello = Handler::new();
    hello
        .head("/{name}", |req, resp| {
            resp.set_body(format!("Hello {}!", req.param("name").unwrap_or_default()));
            Ok(())
        })
        .unwrap();
    let mut router = Router::new();
    router.add_handler("hello", hello);
    let head_addr = start(router, None);

    let resp = send(head_addr, "HEAD /hello/Ada HTTP/1.1\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(resp.contains("Content-Size: 10\r\n"));
    assert!(resp.ends_with("\r\n\r\n"));

    // no HEAD routes on the demo handler
    let resp = send(addr, "HEAD /hello/Ada HTTP/1.1\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
    assert!(resp.ends_with("\r\n\r\n"));
}

#[test]
fn routing_misses_are_501() {
    let addr = start(demo_router(), None);

    let resp = get(addr, "/nowhere");
    assert!(resp.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
    assert!(!body(&resp).is_empty());

    let resp = get(addr, "/form/missing/route");
    assert!(resp.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
    assert_eq!(body(&resp), NOT_A_METHOD_ERROR);

    let resp = send(addr, "PUT /hello HTTP/1.1\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
    assert_eq!(body(&resp), "No PUT routes exist.");
}

#[test]
fn failing_route_is_500() {
    let addr = start(demo_router(), None);
    let resp = get(addr, "/form/fail");
    assert!(resp.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert_eq!(body(&resp), "database unavailable");
}

#[test]
fn unset_body_is_204() {
    let addr = start(demo_router(), None);
    let resp = get(addr, "/form/quiet");
    assert!(resp.starts_with("HTTP/1.1 204 No Content\r\n"));
    assert!(resp.ends_with("\r\n\r\n"));
}

#[test]
fn protocol_errors_still_get_a_response() {
    let addr = start(demo_router(), None);

    let resp = send(addr, "GET /hello\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));

    let resp = send(addr, "GET /hello HTTP/1.1\r\nNoSeparator\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));

    let resp = send(addr, "BREW /pot HTTP/1.1\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
}

#[test]
fn empty_connection_is_dropped_quietly() {
    let addr = start(demo_router(), None);
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();

    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    assert!(out.is_empty());

    // and the server keeps serving
    assert_eq!(body(&get(addr, "/status")), "up");
}

#[test]
fn stalled_request_times_out_without_response() {
    let addr = start_with(
        demo_router(),
        ServerConfig {
            read_timeout_secs: Some(1),
            ..ServerConfig::default()
        },
    );

    // headers never terminated by a blank line
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    stream.write_all(b"GET /status HTTP/1.1\r\nHost: x\r\n").unwrap();

    let mut out = Vec::new();
    let read = stream.read_to_end(&mut out).unwrap();
    assert_eq!(read, 0);
    assert!(out.is_empty());

    assert_eq!(body(&get(addr, "/status")), "up");
}

#[test]
fn silent_client_does_not_block_others() {
    let addr = start(demo_router(), None);
    let _silent = TcpStream::connect(addr).unwrap();

    for _ in 0..5 {
        assert_eq!(body(&get(addr, "/status")), "up");
    }
}

#[test]
fn pooled_workers_serve_concurrent_clients() {
    let addr = start(demo_router(), Some(4));

    let clients: Vec<_> = (0..16)
        .map(|i| thread::spawn(move || body(&get(addr, &format!("/hello/n{}", i))).to_string()))
        .collect();
    for (i, client) in clients.into_iter().enumerate() {
        assert_eq!(client.join().unwrap(), format!("Hello n{}!", i));
    }
}
