//! Line-oriented operator input

use std::io::Write;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::{AsyncRead, Stdin};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tracing::warn;

use crate::error::{CliError, CliResult};

/// Longest line accepted from the operator
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Source of operator input, one line per prompt
#[async_trait]
pub trait LineReader: Send {
    /// Show `prompt` and wait for one line, without its terminator.
    /// `None` means input has ended.
    async fn read_line(&mut self, prompt: &str) -> CliResult<Option<String>>;
}

/// Reads standard input and writes prompts to standard output
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD instead of
/// failing the read. An overlong line is discarded and reported as an error;
/// reading resumes at the next line.
#[derive(Debug)]
pub struct StdinReader<R = Stdin> {
    lines: FramedRead<R, AnyDelimiterCodec>,
    max_length: usize,
    // FramedRead yields one `None` after a decode error before resuming
    recovering: bool,
}

impl StdinReader {
    pub fn new() -> Self {
        Self::from_reader(tokio::io::stdin(), MAX_LINE_LENGTH)
    }
}

impl Default for StdinReader {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: AsyncRead + Unpin> StdinReader<R> {
    /// Read lines of at most `max_length` bytes from `reader`
    pub fn from_reader(reader: R, max_length: usize) -> Self {
        Self {
            lines: FramedRead::new(
                reader,
                AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), max_length),
            ),
            max_length,
            recovering: false,
        }
    }

    async fn next_line(&mut self) -> CliResult<Option<String>> {
        loop {
            match self.lines.next().await {
                Some(Ok(chunk)) => {
                    self.recovering = false;
                    let mut line = String::from_utf8_lossy(&chunk).into_owned();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                    return Ok(Some(line));
                }
                Some(Err(AnyDelimiterCodecError::Io(e))) => return Err(e.into()),
                Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => {
                    warn!("Discarded an input line over {} bytes", self.max_length);
                    self.recovering = true;
                    return Err(CliError::Other(format!(
                        "Input line longer than {} bytes",
                        self.max_length
                    )));
                }
                None if self.recovering => self.recovering = false,
                None => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LineReader for StdinReader<R> {
    async fn read_line(&mut self, prompt: &str) -> CliResult<Option<String>> {
        {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;
        }

        self.next_line().await
    }
}
