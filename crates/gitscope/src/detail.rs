use crate::history;
use crate::patch::{self, FilePatch};
use git::commit;
use git::process;
use git::repository::RepositoryHandle;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Serialize)]
struct DetailResponse {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    committer: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parents: Vec<ParentRecord>,
    message: String,
    patch: Vec<FilePatch>,
}

#[derive(Serialize)]
struct ParentRecord {
    id: String,
    summary: String,
}

/// Loads one commit's detail record: signatures, parent summaries, message,
/// and the chunked diff.
///
/// A commit that no longer resolves yields an empty object — the UI treats a
/// vanished or garbage-collected commit as "no longer available", not as a
/// failure.
pub async fn get(
    handle: Arc<RepositoryHandle>,
    subpath: Option<PathBuf>,
    commit_id: &str,
    ignore_whitespace: bool,
) -> anyhow::Result<serde_json::Value> {
    let Some(info) = commit::load_detail(&handle, commit_id) else {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    };

    let mut args = vec![
        "show".to_string(),
        "--pretty=format:".to_string(),
        commit_id.to_string(),
    ];
    if ignore_whitespace {
        args.push("-w".to_string());
    }
    if let Some(subpath) = &subpath {
        args.push("--".to_string());
        args.push(history::relative_subpath(subpath, handle.work_dir()));
    }
    let diff = process::collect_output("git", &args, handle.work_dir()).await?;

    let response = DetailResponse {
        id: info.id,
        author: info.author,
        committer: info.committer,
        parents: info
            .parents
            .into_iter()
            .map(|parent| ParentRecord {
                id: parent.id,
                summary: parent.summary,
            })
            .collect(),
        message: info.message,
        patch: patch::parse(&diff),
    };
    Ok(serde_json::to_value(response)?)
}

#[cfg(test)]
mod tests {
    use super::get;
    use git::repository::RepositoryCache;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn nonexistent_commit_yields_an_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        let handle = RepositoryCache::new().get_or_open(dir.path()).unwrap();

        let value = get(handle, None, &"0".repeat(40), false).await.unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[test]
    fn parents_key_is_omitted_when_empty() {
        let response = super::DetailResponse {
            id: "c".repeat(40),
            author: Some("A <a@example.com> 2024-05-01 12:00:00".to_string()),
            committer: None,
            parents: Vec::new(),
            message: "root\n\troot\n".to_string(),
            patch: Vec::new(),
        };
        let value = serde_json::to_value(&response).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("parents"));
        assert!(!object.contains_key("committer"));
        assert!(object.contains_key("author"));
        assert_eq!(object["patch"], serde_json::json!([]));
    }
}
