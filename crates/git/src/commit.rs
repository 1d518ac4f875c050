use crate::repository::RepositoryHandle;
use chrono::{Local, TimeZone as _};

/// Metadata for one commit row in a history window.
#[derive(Clone, Debug)]
pub struct CommitInfo {
    pub id: String,
    pub summary: String,
    pub author_name: String,
    pub author_email: String,
    /// `YYYY-MM-DD HH:MM:SS`, server-local time.
    pub date: String,
    pub parent_ids: Vec<String>,
}

/// Metadata for the commit detail view.
#[derive(Clone, Debug)]
pub struct DetailInfo {
    pub id: String,
    /// `Name <email> YYYY-MM-DD HH:MM:SS`
    pub author: Option<String>,
    pub committer: Option<String>,
    pub parents: Vec<ParentSummary>,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct ParentSummary {
    pub id: String,
    pub summary: String,
}

/// Resolves a commit id to its window metadata. An unresolvable id is an
/// absence, not an error: the commit may have been garbage-collected since
/// the hash list was produced.
pub fn load_commit(handle: &RepositoryHandle, id: &str) -> Option<CommitInfo> {
    let repository = handle.lock();
    let oid = git2::Oid::from_str(id).ok()?;
    let commit = repository.find_commit(oid).ok()?;
    let author = commit.author();
    let message = String::from_utf8_lossy(commit.message_raw_bytes());
    Some(CommitInfo {
        id: oid.to_string(),
        summary: first_line(&message).to_string(),
        author_name: String::from_utf8_lossy(author.name_bytes()).into_owned(),
        author_email: String::from_utf8_lossy(author.email_bytes()).into_owned(),
        date: format_time(commit.time()),
        parent_ids: commit.parent_ids().map(|parent| parent.to_string()).collect(),
    })
}

/// Resolves a commit id to its detail-view metadata: signature lines, up to
/// two parent summaries, and the full message followed by its tab-indented
/// echoed lines.
pub fn load_detail(handle: &RepositoryHandle, id: &str) -> Option<DetailInfo> {
    let repository = handle.lock();
    let oid = git2::Oid::from_str(id).ok()?;
    let commit = repository.find_commit(oid).ok()?;

    let parents = commit
        .parents()
        .take(2)
        .map(|parent| {
            let message = String::from_utf8_lossy(parent.message_raw_bytes()).into_owned();
            ParentSummary {
                id: parent.id().to_string(),
                summary: first_line(&message).to_string(),
            }
        })
        .collect();

    let message = String::from_utf8_lossy(commit.message_raw_bytes()).into_owned();
    let author = signature_line(&commit.author());
    let committer = signature_line(&commit.committer());
    Some(DetailInfo {
        id: oid.to_string(),
        author: Some(author),
        committer: Some(committer),
        parents,
        message: echo_message(&message),
    })
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default()
}

fn signature_line(signature: &git2::Signature<'_>) -> String {
    format!(
        "{} <{}> {}",
        String::from_utf8_lossy(signature.name_bytes()),
        String::from_utf8_lossy(signature.email_bytes()),
        format_time(signature.when())
    )
}

/// The original message text followed by every line echoed with a leading
/// tab; the detail view renders the echoed block as the indented body.
fn echo_message(message: &str) -> String {
    let mut out = String::with_capacity(message.len() * 2);
    out.push_str(message);
    for line in message.lines() {
        out.push('\t');
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn format_time(time: git2::Time) -> String {
    Local
        .timestamp_opt(time.seconds(), 0)
        .earliest()
        .map(|datetime| datetime.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{load_commit, load_detail};
    use crate::repository::RepositoryCache;
    use pretty_assertions::assert_eq;

    fn commit_in(
        repository: &git2::Repository,
        message: &str,
        parents: &[&git2::Commit<'_>],
    ) -> git2::Oid {
        let signature = git2::Signature::now("Test Author", "author@example.com").unwrap();
        let tree_id = repository.index().unwrap().write_tree().unwrap();
        let tree = repository.find_tree(tree_id).unwrap();
        repository
            .commit(None, &signature, &signature, message, &tree, parents)
            .unwrap()
    }

    #[test]
    fn window_metadata_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repository = git2::Repository::init(dir.path()).unwrap();
        let root = commit_in(&repository, "initial commit\n\nbody text\n", &[]);
        let root_commit = repository.find_commit(root).unwrap();
        let child = commit_in(&repository, "second commit\n", &[&root_commit]);
        drop(root_commit);
        drop(repository);

        let cache = RepositoryCache::new();
        let handle = cache.get_or_open(dir.path()).unwrap();

        let info = load_commit(&handle, &child.to_string()).unwrap();
        assert_eq!(info.id, child.to_string());
        assert_eq!(info.summary, "second commit");
        assert_eq!(info.author_name, "Test Author");
        assert_eq!(info.author_email, "author@example.com");
        assert_eq!(info.parent_ids, vec![root.to_string()]);
        // YYYY-MM-DD HH:MM:SS
        assert_eq!(info.date.len(), 19);
        assert_eq!(info.date.as_bytes()[10], b' ');
    }

    #[test]
    fn unresolvable_ids_are_an_absence() {
        let dir = tempfile::tempdir().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        let cache = RepositoryCache::new();
        let handle = cache.get_or_open(dir.path()).unwrap();

        assert!(load_commit(&handle, &"0".repeat(40)).is_none());
        assert!(load_commit(&handle, "not-a-hash").is_none());
        assert!(load_detail(&handle, &"f".repeat(40)).is_none());
    }

    #[test]
    fn detail_metadata_includes_signatures_parents_and_echoed_message() {
        let dir = tempfile::tempdir().unwrap();
        let repository = git2::Repository::init(dir.path()).unwrap();
        let root = commit_in(&repository, "root\n", &[]);
        let root_commit = repository.find_commit(root).unwrap();
        let child = commit_in(&repository, "fix: a thing\n\ndetails here\n", &[&root_commit]);
        drop(root_commit);
        drop(repository);

        let cache = RepositoryCache::new();
        let handle = cache.get_or_open(dir.path()).unwrap();

        let detail = load_detail(&handle, &child.to_string()).unwrap();
        assert_eq!(detail.id, child.to_string());
        let author = detail.author.unwrap();
        assert!(author.starts_with("Test Author <author@example.com> "));
        assert_eq!(detail.parents.len(), 1);
        assert_eq!(detail.parents[0].id, root.to_string());
        assert_eq!(detail.parents[0].summary, "root");
        assert_eq!(
            detail.message,
            "fix: a thing\n\ndetails here\n\tfix: a thing\n\t\n\tdetails here\n"
        );
    }

    #[test]
    fn octopus_detail_keeps_only_two_parent_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let repository = git2::Repository::init(dir.path()).unwrap();
        let a = commit_in(&repository, "a\n", &[]);
        let a_commit = repository.find_commit(a).unwrap();
        let b = commit_in(&repository, "b\n", &[&a_commit]);
        let b_commit = repository.find_commit(b).unwrap();
        let c = commit_in(&repository, "c\n", &[&a_commit]);
        let c_commit = repository.find_commit(c).unwrap();
        let merge = commit_in(
            &repository,
            "octopus\n",
            &[&b_commit, &c_commit, &a_commit],
        );
        drop((a_commit, b_commit, c_commit));
        drop(repository);

        let cache = RepositoryCache::new();
        let handle = cache.get_or_open(dir.path()).unwrap();

        let info = load_commit(&handle, &merge.to_string()).unwrap();
        assert_eq!(info.parent_ids.len(), 3);

        let detail = load_detail(&handle, &merge.to_string()).unwrap();
        assert_eq!(detail.parents.len(), 2);
        assert_eq!(detail.parents[0].id, b.to_string());
        assert_eq!(detail.parents[1].id, c.to_string());
    }
}
