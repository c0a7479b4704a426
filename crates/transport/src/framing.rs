//! Content-Length message framing for the LSP base protocol (spec §4.1).
//!
//! A frame is a header block of `Key: Value\r\n` pairs terminated by a blank
//! line, followed by exactly `Content-Length` bytes of UTF-8 JSON. Headers
//! other than `Content-Length` are ignored. A non-parseable `Content-Length`
//! does not kill the stream: the reader logs, drops the partial frame, and
//! resynchronizes on the next `\r\n\r\n`.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read one frame's raw JSON body from `reader`.
///
/// Returns `Ok(None)` on clean EOF (no partial header line pending).
/// Returns `Ok(Some(bytes))` for a well-formed frame, after silently
/// resynchronizing past any malformed ones encountered along the way.
/// Returns `Err` only for an I/O failure on the underlying reader.
pub async fn read_frame<R>(reader: &mut R) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut content_length: Option<usize> = None;

        loop {
            let mut line = Vec::new();
            let n = reader.read_until(b'\n', &mut line).await?;
            if n == 0 {
                // Clean EOF or a header block truncated mid-stream: either
                // way there is no frame to recover here.
                return Ok(None);
            }

            let trimmed = trim_crlf(&line);
            if trimmed.is_empty() {
                break; // end of header block
            }

            if let Some(colon) = trimmed.iter().position(|&b| b == b':') {
                let key = &trimmed[..colon];
                let value = trim_ascii_ws(&trimmed[colon + 1..]);
                if key.eq_ignore_ascii_case(b"Content-Length") {
                    match std::str::from_utf8(value).ok().and_then(|s| s.parse::<usize>().ok()) {
                        Some(len) => content_length = Some(len),
                        None => {
                            eprintln!(
                                "[lrpc:framer] unparseable Content-Length header: {:?}; resynchronizing",
                                String::from_utf8_lossy(value)
                            );
                            skip_to_next_blank_line(reader).await?;
                            content_length = None;
                            continue;
                        }
                    }
                }
                // unknown headers are ignored per spec §4.1
            }
        }

        let Some(len) = content_length else {
            eprintln!("[lrpc:framer] frame missing Content-Length header; resynchronizing");
            continue;
        };

        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        return Ok(Some(body));
    }
}

/// Write one frame: `Content-Length: N\r\n\r\n` followed by `body`.
///
/// A single write call per frame preserves boundary atomicity on byte-stream
/// transports (spec §4.1 output contract).
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut framed = Vec::with_capacity(body.len() + 32);
    framed.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
    framed.extend_from_slice(body);
    writer.write_all(&framed).await?;
    writer.flush().await
}

/// Discard bytes up to and including the next `\r\n\r\n`, for resynchronizing
/// after a malformed `Content-Length` header (spec §4.1).
async fn skip_to_next_blank_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = Vec::new();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 || trim_crlf(&line).is_empty() {
            return Ok(());
        }
    }
}

fn trim_crlf(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\n' || line[end - 1] == b'\r') {
        end -= 1;
    }
    &line[..end]
}

fn trim_ascii_ws(bytes: &[u8]) -> &[u8] {
    let mut start = 0;
    let mut end = bytes.len();
    while start < end && bytes[start] == b' ' {
        start += 1;
    }
    while end > start && bytes[end - 1] == b' ' {
        end -= 1;
    }
    &bytes[start..end]
}
