use serde::Serialize;

const FILE_HEADER: &str = "diff --git a/";

/// The chunked unified diff for one file.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct FilePatch {
    pub filename: String,
    pub chunks: Vec<Chunk>,
}

/// A run of consecutive diff lines of one kind.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct Chunk {
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    pub content: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Header,
    Default,
    Statistics,
    Add,
    Delete,
}

/// Splits unified diff text into per-file patches with grouped, typed
/// chunks.
///
/// Tolerant by construction: unrecognized lines classify as
/// [`ChunkKind::Default`] and malformed file headers skip the file — diff
/// text is never rejected.
pub fn parse(diff: &str) -> Vec<FilePatch> {
    let lines: Vec<&str> = diff.lines().collect();
    let mut patches = Vec::new();
    let mut index = 0;
    while index < lines.len() {
        let line = lines[index];
        index += 1;
        let Some(rest) = line.strip_prefix(FILE_HEADER) else {
            continue;
        };
        // The filename runs up to the " b/..." half of the header line.
        let Some(space) = rest.find(' ') else {
            continue;
        };
        let filename = &rest[..space];
        let body_start = index;
        while index < lines.len() && !lines[index].starts_with(FILE_HEADER) {
            index += 1;
        }
        patches.push(parse_file(filename, &lines[body_start..index]));
    }
    patches
}

fn parse_file(filename: &str, lines: &[&str]) -> FilePatch {
    let mut header = format!(
        "-------------------------------- {filename} --------------------------------\n"
    );
    let mut index = 0;
    while index < lines.len() && !lines[index].starts_with("@@ ") {
        header.push_str(lines[index]);
        header.push('\n');
        index += 1;
    }

    let mut chunks = vec![Chunk {
        kind: ChunkKind::Header,
        content: header,
    }];
    let mut kind = ChunkKind::Default;
    let mut content = String::new();
    for line in &lines[index..] {
        let line_kind = classify(line);
        if line_kind != kind {
            if !content.is_empty() {
                chunks.push(Chunk {
                    kind,
                    content: std::mem::take(&mut content),
                });
            }
            kind = line_kind;
        }
        content.push_str(line);
        content.push('\n');
    }
    if !content.is_empty() {
        chunks.push(Chunk { kind, content });
    }

    FilePatch {
        filename: filename.to_string(),
        chunks,
    }
}

fn classify(line: &str) -> ChunkKind {
    if line.starts_with("@@ ") {
        ChunkKind::Statistics
    } else {
        match line.bytes().next() {
            Some(b'+') => ChunkKind::Add,
            Some(b'-') => ChunkKind::Delete,
            _ => ChunkKind::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse, ChunkKind};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn one_file_with_mixed_chunks() {
        let diff = indoc! {"
            diff --git a/src/lib.rs b/src/lib.rs
            index 1111111..2222222 100644
            --- a/src/lib.rs
            +++ b/src/lib.rs
            @@ -1,3 +1,4 @@
             fn main() {
            -    old();
            +    new();
            +    extra();
             }
        "};

        let patches = parse(diff);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].filename, "src/lib.rs");

        let kinds: Vec<_> = patches[0].chunks.iter().map(|chunk| chunk.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChunkKind::Header,
                ChunkKind::Statistics,
                ChunkKind::Default,
                ChunkKind::Delete,
                ChunkKind::Add,
                ChunkKind::Default,
            ]
        );

        let header = &patches[0].chunks[0].content;
        assert!(header.starts_with("-------------------------------- src/lib.rs "));
        assert!(header.contains("--- a/src/lib.rs\n"));
        assert_eq!(patches[0].chunks[3].content, "-    old();\n");
        assert_eq!(patches[0].chunks[4].content, "+    new();\n+    extra();\n");
    }

    #[test]
    fn multiple_files_split_on_their_headers() {
        let diff = indoc! {"
            diff --git a/one.txt b/one.txt
            --- a/one.txt
            +++ b/one.txt
            @@ -1 +1 @@
            -a
            +b
            diff --git a/two.txt b/two.txt
            --- a/two.txt
            +++ b/two.txt
            @@ -1 +1 @@
            -c
            +d
        "};

        let patches = parse(diff);
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].filename, "one.txt");
        assert_eq!(patches[1].filename, "two.txt");
    }

    #[test]
    fn file_without_hunks_is_all_header() {
        // Binary files and mode changes produce no "@@" lines.
        let diff = indoc! {"
            diff --git a/blob.bin b/blob.bin
            Binary files a/blob.bin and b/blob.bin differ
        "};

        let patches = parse(diff);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].chunks.len(), 1);
        assert_eq!(patches[0].chunks[0].kind, ChunkKind::Header);
    }

    #[test]
    fn malformed_file_header_is_skipped() {
        let diff = "diff --git a/missing-second-half\ncontext\n";
        assert_eq!(parse(diff), vec![]);
    }

    #[test]
    fn unrecognized_lines_fall_into_the_default_chunk() {
        let diff = indoc! {"
            diff --git a/f b/f
            @@ -1 +1 @@
            \\ No newline at end of file
        "};

        let patches = parse(diff);
        let last = patches[0].chunks.last().unwrap();
        assert_eq!(last.kind, ChunkKind::Default);
        assert_eq!(last.content, "\\ No newline at end of file\n");
    }

    #[test]
    fn empty_input_yields_no_patches() {
        assert_eq!(parse(""), vec![]);
        assert_eq!(parse("not a diff at all\n"), vec![]);
    }

    #[test]
    fn chunk_kind_wire_names() {
        for (kind, name) in [
            (ChunkKind::Header, "\"header\""),
            (ChunkKind::Default, "\"default\""),
            (ChunkKind::Statistics, "\"statistics\""),
            (ChunkKind::Add, "\"add\""),
            (ChunkKind::Delete, "\"delete\""),
        ] {
            assert_eq!(serde_json::to_string(&kind).unwrap(), name);
        }
    }
}
