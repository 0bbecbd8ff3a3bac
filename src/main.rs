use anyhow::{Context, bail};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use switchyard::http::response::STATUS_GOOD;
use switchyard::http::{Handler, MessageHandler};
use switchyard::{Request, Response, Router, Server, ServerConfig, logging};

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Small HTTP/1.1 server with segment routing", long_about = None)]
struct Cli {
    /// TOML config file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Worker pool size instead of a thread per connection
    #[arg(short, long)]
    workers: Option<usize>,

    /// Serve (and accept uploads of) files from this directory
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Can't load config from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.workers.is_some() {
        config.workers = cli.workers;
    }

    logging::init(&config.log_level);

    let router = build_router(cli.directory)?;
    let server = Server::bind(&config, router)?;
    server.run()
}

fn build_router(directory: Option<PathBuf>) -> anyhow::Result<Router> {
    let mut router = Router::new();
    router.add_handler("", MessageHandler::ok(STATUS_GOOD));
    router.add_handler("hello", hello_handler()?);

    let mut echo = Handler::new();
    echo.get("/{*}", |r, resp| {
        resp.set_body(r.varargs().join("/"));
        Ok(())
    })?;
    router.add_handler("echo", echo);

    let mut user_agent = Handler::new();
    user_agent.get("/", |r, resp| {
        resp.set_body(r.header("user-agent").unwrap_or_default());
        Ok(())
    })?;
    router.add_handler("user-agent", user_agent);

    if let Some(dir) = directory {
        router.set_default_handler(files_handler(dir)?);
    }
    Ok(router)
}

fn hello_handler() -> anyhow::Result<Handler> {
    let mut hello = Handler::new();
    hello
        .get("/", |_, resp| {
            resp.set_body("Hello World");
            Ok(())
        })?
        .get("/{name}", |r, resp| {
            resp.set_body(format!("Hello {}", r.param("name").unwrap_or_default()));
            Ok(())
        })?
        .get("/{first}/{last}", |r, resp| {
            resp.set_body(format!(
                "Hello {} {}",
                r.param("first").unwrap_or_default(),
                r.param("last").unwrap_or_default()
            ));
            Ok(())
        })?
        .get("/{*}", |r, resp| {
            let greeting: String = r.varargs().iter().map(|name| format!("Hello {}!\n", name)).collect();
            resp.set_body(greeting);
            Ok(())
        })?
        .delete("/goodbye", |_, resp| {
            resp.set_body("Goodbye World");
            Ok(())
        })?;
    Ok(hello)
}

fn files_handler(dir: PathBuf) -> anyhow::Result<Handler> {
    let dir = Arc::new(dir);
    let mut files = Handler::new();

    let dir_clone = Arc::clone(&dir);
    files.get("/{*}", move |r, resp| get_file(r, resp, &dir_clone))?;

    let dir_clone = Arc::clone(&dir);
    files.post("/{*}", move |r, resp| post_file(r, resp, &dir_clone))?;
    Ok(files)
}

fn file_path(dir: &Path, segments: &[String]) -> anyhow::Result<PathBuf> {
    if segments.is_empty() {
        bail!("No file name given");
    }
    if segments.iter().any(|s| s == ".." || s.contains('\\')) {
        bail!("Path escapes the served directory");
    }
    let mut path = dir.to_path_buf();
    path.extend(segments);
    Ok(path)
}

fn get_file(r: &Request, resp: &mut Response, dir: &Path) -> anyhow::Result<()> {
    let path = file_path(dir, r.varargs())?;
    match fs::read(&path) {
        Ok(content) => {
            resp.set_body(content);
            resp.set_mime_type("application/octet-stream");
        }
        Err(_) => resp.message(404, format!("No such file: {}", r.varargs().join("/"))),
    }
    Ok(())
}

fn post_file(r: &Request, resp: &mut Response, dir: &Path) -> anyhow::Result<()> {
    let path = file_path(dir, r.varargs())?;
    fs::write(&path, r.body()).with_context(|| format!("Can't write {}", path.display()))?;
    resp.message(201, "Created");
    Ok(())
}
