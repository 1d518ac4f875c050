use futures::Stream;
use git::commit::{self, CommitInfo};
use git::process::LineStream;
use git::repository::RepositoryHandle;
use git_graph::{Commit as GraphCommit, GraphLayout, ParentRef, TRACKED_PARENTS};
use serde::Serialize;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Commits listed per history request. A pinned commit narrows the window
/// to just that commit.
const WINDOW_SIZE: usize = 500;
const EVENT_CHANNEL_DEPTH: usize = 16;

/// Filters for one history listing request.
#[derive(Clone, Debug, Default)]
pub struct Filters {
    pub subpath: Option<PathBuf>,
    pub no_merges: bool,
    pub commit: Option<String>,
    pub authors: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecord<'a> {
    id: &'a str,
    column: usize,
    parent_indexes: [ParentRef; TRACKED_PARENTS],
    min_reserved_column: usize,
    max_reserved_column: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitRecord<'a> {
    summary: &'a str,
    author: AuthorRecord<'a>,
    date: &'a str,
    #[serde(flatten)]
    graph: GraphRecord<'a>,
}

#[derive(Serialize)]
struct AuthorRecord<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Default, Serialize)]
struct EventFrame<'a> {
    commits: Vec<CommitRecord<'a>>,
    graphs: Vec<GraphRecord<'a>>,
}

/// Streams history events for one request; each item is a complete
/// `text/event-stream` frame.
///
/// Because the layout engine re-runs over the whole accumulated window per
/// batch, every frame carries full records for the newly resolved commits
/// plus graph-shape records for *all* commits seen so far; earlier commits'
/// lanes may change between frames. The stream ends with an empty-batch
/// terminator frame. Dropping the stream (the client hung up) terminates the
/// underlying `git log` process.
pub fn stream(
    handle: Arc<RepositoryHandle>,
    filters: Filters,
) -> impl Stream<Item = Result<String, Infallible>> {
    let (events, receiver) = mpsc::channel(EVENT_CHANNEL_DEPTH);
    tokio::spawn(async move {
        if let Err(error) = pump(handle, filters, &events).await {
            log::error!("git log stream failed: {error:#}");
        }
    });
    futures::stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|frame| (Ok(frame), receiver))
    })
}

async fn pump(
    handle: Arc<RepositoryHandle>,
    filters: Filters,
    events: &mpsc::Sender<String>,
) -> anyhow::Result<()> {
    let args = log_args(&filters, &handle);
    let mut lines = LineStream::spawn("git", &args, handle.work_dir())?;

    let mut layout = GraphLayout::new();
    let mut window: Vec<CommitInfo> = Vec::new();

    while let Some(batch) = lines.next_batch().await? {
        let first_new = window.len();
        for line in batch {
            if line.is_empty() {
                continue;
            }
            let Some(info) = commit::load_commit(&handle, &line) else {
                log::debug!("commit {line} is no longer resolvable, skipping");
                continue;
            };
            layout.push(info.id.clone(), info.parent_ids.iter().cloned());
            window.push(info);
        }
        if window.len() > first_new {
            layout.layout();
            let frame = event_frame(&window, layout.commits(), first_new)?;
            if events.send(frame).await.is_err() {
                // The consumer hung up; dropping `lines` kills the process.
                return Ok(());
            }
        }
    }

    // End-of-history marker: an empty batch.
    let _ = events.send(event_frame(&[], &[], 0)?).await;
    Ok(())
}

fn event_frame(
    window: &[CommitInfo],
    rows: &[GraphCommit],
    first_new: usize,
) -> anyhow::Result<String> {
    let frame = EventFrame {
        commits: window[first_new..]
            .iter()
            .zip(&rows[first_new..])
            .map(|(info, row)| CommitRecord {
                summary: &info.summary,
                author: AuthorRecord {
                    name: &info.author_name,
                    email: &info.author_email,
                },
                date: &info.date,
                graph: graph_record(info, row),
            })
            .collect(),
        graphs: window
            .iter()
            .zip(rows)
            .map(|(info, row)| graph_record(info, row))
            .collect(),
    };
    Ok(format!("data: {}\n\n", serde_json::to_string(&frame)?))
}

fn graph_record<'a>(info: &'a CommitInfo, row: &'a GraphCommit) -> GraphRecord<'a> {
    GraphRecord {
        id: &info.id,
        column: row.lane(),
        parent_indexes: row.parents,
        min_reserved_column: row.min_reserved_lane,
        max_reserved_column: row.max_reserved_lane,
    }
}

fn log_args(filters: &Filters, handle: &RepositoryHandle) -> Vec<String> {
    let count = if filters.commit.is_some() {
        1
    } else {
        WINDOW_SIZE
    };
    let mut args = vec![
        "log".to_string(),
        "-n".to_string(),
        count.to_string(),
        "--pretty=format:%H".to_string(),
    ];
    if filters.no_merges {
        args.push("--no-merges".to_string());
    }
    if let Some(commit) = &filters.commit {
        args.push(commit.clone());
    }
    for author in &filters.authors {
        args.push(format!("--author={author}"));
    }
    if let Some(subpath) = &filters.subpath {
        args.push("--".to_string());
        args.push(relative_subpath(subpath, handle.work_dir()));
    }
    args
}

/// The UI sends absolute follow paths; `git` wants them relative to the
/// work tree it runs in.
pub(crate) fn relative_subpath(subpath: &Path, work_dir: &Path) -> String {
    let canonical = subpath
        .canonicalize()
        .unwrap_or_else(|_| subpath.to_owned());
    let canonical_work_dir = work_dir
        .canonicalize()
        .unwrap_or_else(|_| work_dir.to_owned());
    let relative = canonical
        .strip_prefix(&canonical_work_dir)
        .unwrap_or(&canonical);
    if relative.as_os_str().is_empty() {
        ".".to_string()
    } else {
        relative.display().to_string()
    }
}
