//! Request stream - JSONL requests in, one JSON response line out per request
//!
//! Any line that is not valid UTF-8 or does not decode as a `LedgerRequest`
//! is answered with a `{"malformed": {...}}` line, so output stays aligned with
//! non-blank input lines. Read or write failures stop the stream without
//! touching the ledger; the caller then closes the handle so ingestion can run
//! its final flush.

use super::ingestion::LedgerHandle;
use super::request::LedgerRequest;
use serde_json::json;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Why `serve_requests` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfInput,
    Shutdown,
    InputError,
    OutputError,
    LedgerStopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeSummary {
    pub submitted: u64,
    pub malformed: u64,
    pub stopped_by: StopReason,
}

/// Feed `input` through `handle`, writing responses to `output`, until the
/// input ends, `shutdown` resolves, or an I/O error occurs.
pub async fn serve_requests<R, W, S>(
    mut input: R,
    output: &mut W,
    handle: &LedgerHandle,
    shutdown: S,
) -> ServeSummary
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut buf = Vec::new();
    let mut line_no = 0u64;
    let mut submitted = 0u64;
    let mut malformed = 0u64;

    let stopped_by = loop {
        buf.clear();
        let read = tokio::select! {
            read = input.read_until(b'\n', &mut buf) => read,
            _ = &mut shutdown => break StopReason::Shutdown,
        };

        match read {
            Ok(0) => break StopReason::EndOfInput,
            Ok(_) => {}
            Err(e) => {
                log::error!("❌ Failed to read request stream: {}", e);
                break StopReason::InputError;
            }
        }
        line_no += 1;

        let raw = trim_line_end(&buf);
        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let decoded = std::str::from_utf8(raw)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<LedgerRequest>(text).map_err(|e| e.to_string()));

        let output_line = match decoded {
            Ok(request) => match handle.submit(request).await {
                Ok(response) => {
                    submitted += 1;
                    json!(response).to_string()
                }
                Err(e) => {
                    log::error!("❌ {}", e);
                    break StopReason::LedgerStopped;
                }
            },
            Err(error) => {
                malformed += 1;
                log::warn!("⚠️  Malformed request on line {}: {}", line_no, error);
                json!({ "malformed": { "line": line_no, "error": error } }).to_string()
            }
        };

        if let Err(e) = write_line(output, &output_line).await {
            log::error!("❌ Failed to write response: {}", e);
            break StopReason::OutputError;
        }
    };

    log::info!(
        "📭 Request stream stopped ({:?}): {} submitted, {} malformed",
        stopped_by,
        submitted,
        malformed
    );
    ServeSummary {
        submitted,
        malformed,
        stopped_by,
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> std::io::Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
