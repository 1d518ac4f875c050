use crate::line_assembler::LineAssembler;
use anyhow::{ensure, Context as _, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncReadExt as _;
use tokio::process::{Child, ChildStdout, Command};

const READ_CHUNK_SIZE: usize = 8192;

/// A line-oriented external process: a lazy, finite, non-restartable
/// sequence of output lines.
///
/// Output arrives in batches — whatever complete lines one pipe read
/// produced. Dropping the stream terminates the process, so a consumer that
/// goes away never leaves the child running to completion.
pub struct LineStream {
    child: Child,
    stdout: ChildStdout,
    assembler: LineAssembler,
    buffer: Box<[u8]>,
    eof: bool,
    drained: bool,
    finished: bool,
}

impl LineStream {
    pub fn spawn(
        program: impl AsRef<OsStr>,
        args: impl IntoIterator<Item = impl AsRef<OsStr>>,
        work_dir: &Path,
    ) -> Result<Self> {
        let program = program.as_ref();
        let mut child = Command::new(program)
            .args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program:?}"))?;
        let stdout = child
            .stdout
            .take()
            .context("child process stdout was not piped")?;
        Ok(Self {
            child,
            stdout,
            assembler: LineAssembler::new(),
            buffer: vec![0; READ_CHUNK_SIZE].into_boxed_slice(),
            eof: false,
            drained: false,
            finished: false,
        })
    }

    /// The next batch of complete output lines, or `None` once the process
    /// has exited and all output is consumed. A final unterminated line is
    /// yielded as its own batch. Fails when the process exits non-zero.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<String>>> {
        if self.finished {
            return Ok(None);
        }

        while !self.eof {
            let read = self
                .stdout
                .read(&mut self.buffer)
                .await
                .context("failed to read child process output")?;
            if read == 0 {
                self.eof = true;
                break;
            }
            self.assembler.append(&self.buffer[..read]);
            let mut lines = Vec::new();
            while let Some(line) = self.assembler.next_line() {
                lines.push(line);
            }
            if !lines.is_empty() {
                return Ok(Some(lines));
            }
        }

        if !self.drained {
            self.drained = true;
            let rest = self.assembler.drain();
            if !rest.is_empty() {
                return Ok(Some(vec![rest]));
            }
        }

        self.finished = true;
        let status = self
            .child
            .wait()
            .await
            .context("failed to wait for child process")?;
        ensure!(status.success(), "process exited with {status}");
        Ok(None)
    }
}

/// Runs a process to completion and returns its stdout.
pub async fn collect_output(
    program: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    work_dir: &Path,
) -> Result<String> {
    let program = program.as_ref();
    let output = Command::new(program)
        .args(args)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to spawn {program:?}"))?;
    ensure!(
        output.status.success(),
        "process exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    );
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::{collect_output, LineStream};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[tokio::test]
    async fn batches_cover_all_lines_and_the_unterminated_tail() {
        let mut stream =
            LineStream::spawn("printf", ["first\nsecond\ntail"], Path::new(".")).unwrap();
        let mut lines = Vec::new();
        while let Some(batch) = stream.next_batch().await.unwrap() {
            lines.extend(batch);
        }
        assert_eq!(lines, vec!["first", "second", "tail"]);
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let mut stream = LineStream::spawn("false", Vec::<&str>::new(), Path::new(".")).unwrap();
        let mut result = stream.next_batch().await;
        while let Ok(Some(_)) = result {
            result = stream.next_batch().await;
        }
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn collect_output_returns_stdout() {
        let output = collect_output("echo", ["hello"], Path::new(".")).await.unwrap();
        assert_eq!(output, "hello\n");
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        assert!(LineStream::spawn(
            "definitely-not-a-real-program",
            Vec::<&str>::new(),
            Path::new(".")
        )
        .is_err());
    }
}
