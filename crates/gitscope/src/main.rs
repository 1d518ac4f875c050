use anyhow::{bail, Context as _, Result};
use clap::Parser;
use gitscope::{api, AppState};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

const DEFAULT_PORT: u16 = 13324;

/// A fast, browser-based git history viewer.
///
/// Without `--server`, reuses (or starts) a background server on the
/// configured port and opens the history of the given repository in a
/// browser.
#[derive(Debug, Parser)]
#[command(name = "gitscope", version)]
struct Options {
    /// Run the HTTP server in the foreground instead of opening a browser.
    #[arg(long)]
    server: bool,

    /// Repository (or any path inside one); defaults to the current
    /// directory.
    #[arg(long)]
    repo: Option<PathBuf>,

    /// Serve frontend files from this directory instead of the embedded
    /// ones.
    #[arg(long)]
    wwwroot: Option<PathBuf>,

    /// Only list commits whose author matches (repeatable).
    #[arg(long = "author")]
    authors: Vec<String>,

    /// Port the server listens on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// A commit id (40 hex characters) to pin, or a path to follow.
    #[arg(value_name = "COMMIT_OR_PATH")]
    targets: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let options = Options::parse();
    let (commit, follow) = classify_targets(&options.targets)?;
    if options.server {
        serve(&options).await
    } else {
        launch(&options, commit, follow)
    }
}

async fn serve(options: &Options) -> Result<()> {
    let state = AppState::new(options.wwwroot.clone());
    let app = api::routes(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], options.port));
    let listener = TcpListener::bind(addr).with_context(|| format!("failed to bind {addr}"))?;
    println!("gitscope server is running on http://localhost:{}", options.port);

    axum::Server::from_tcp(listener)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to listen for terminate signal");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("failed to listen for interrupt signal");
        let sigterm = sigterm.recv();
        let sigint = sigint.recv();
        futures::pin_mut!(sigterm, sigint);
        futures::future::select(sigterm, sigint).await;
        log::info!("received interrupt signal");
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn launch(options: &Options, commit: Option<String>, follow: Option<PathBuf>) -> Result<()> {
    if !server_running(options.port) {
        spawn_server(options)?;
        // Give the background server a moment to bind before pointing a
        // browser at it.
        for _ in 0..50 {
            if server_running(options.port) {
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    let repo = match &options.repo {
        Some(repo) => repo.clone(),
        None => std::env::current_dir().context("failed to resolve the current directory")?,
    };
    let mut url = format!("http://localhost:{}?repo={}", options.port, repo.display());
    if let Some(follow) = &follow {
        url.push_str(&format!("&path={}", follow.display()));
    }
    if let Some(commit) = &commit {
        url.push_str(&format!("&commit={commit}"));
    }
    for author in &options.authors {
        url.push_str(&format!("&author={author}"));
    }
    open_in_browser(&url)
}

/// A connect-only probe: is a server already listening on this port?
fn server_running(port: u16) -> bool {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpStream::connect_timeout(&addr, Duration::from_secs(1)).is_ok()
}

fn spawn_server(options: &Options) -> Result<()> {
    let exe = std::env::current_exe().context("failed to resolve the current executable")?;
    let mut command = Command::new(exe);
    command
        .arg("--server")
        .arg("--port")
        .arg(options.port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(wwwroot) = &options.wwwroot {
        command.arg("--wwwroot").arg(wwwroot);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt as _;
        command.process_group(0);
    }
    command.spawn().context("failed to start the server process")?;
    Ok(())
}

fn open_in_browser(url: &str) -> Result<()> {
    let (program, args): (&str, Vec<&str>) = if cfg!(target_os = "macos") {
        ("open", vec![url])
    } else if cfg!(windows) {
        ("cmd", vec!["/C", "start", url])
    } else {
        ("xdg-open", vec![url])
    };
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("failed to launch a browser via `{program}`"))?;
    if !status.success() {
        bail!("`{program}` exited with {status}");
    }
    Ok(())
}

/// Positional arguments: a string of exactly 40 hex characters is a commit
/// id, anything else is a path to follow.
fn classify_targets(targets: &[String]) -> Result<(Option<String>, Option<PathBuf>)> {
    let mut commit = None;
    let mut follow = None;
    for target in targets {
        if git::is_commit_id(target) {
            if commit.is_some() {
                bail!("only one commit id is supported");
            }
            commit = Some(target.clone());
        } else {
            if follow.is_some() {
                bail!("only one path is supported");
            }
            let path = PathBuf::from(target);
            follow = Some(path.canonicalize().unwrap_or(path));
        }
    }
    Ok((commit, follow))
}
