/// Append-only chat history.
///
/// One formatted display line per file line, UTF-8, no rotation. Joining
/// clients are replayed the first N lines in file order.
use std::io;
use std::path::PathBuf;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug)]
pub struct History {
    path: PathBuf,
}

impl History {
    /// Open the history at `path`, creating the file when absent. Existing
    /// content is preserved.
    pub async fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self { path })
    }

    /// Append `line` with a trailing newline, flushed before returning.
    /// The line and terminator go out in a single write so concurrent
    /// appends cannot interleave within a line.
    pub async fn append(&self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        file.write_all(buf.as_bytes()).await?;
        file.flush().await
    }

    /// The first `limit` lines in file order. A missing file reads as empty.
    pub async fn head(&self, limit: usize) -> io::Result<Vec<String>> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut lines = BufReader::new(file).lines();
        let mut out = Vec::new();
        while out.len() < limit {
            match lines.next_line().await? {
                Some(line) => out.push(line),
                None => break,
            }
        }
        Ok(out)
    }
}
