use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const FIXED_BUF_LEN: usize = 8 * 1024;

/// Outcome of relaying one HTTP/1.1 message (request or response). Errors
/// here are never fatal to the proxy process — the caller logs and closes
/// the connection pair, per the error table.
#[derive(Debug)]
pub enum ForwardError {
    Io(std::io::Error),
    MalformedChunkSize,
}

impl From<std::io::Error> for ForwardError {
    fn from(e: std::io::Error) -> Self {
        ForwardError::Io(e)
    }
}

impl std::fmt::Display for ForwardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardError::Io(e) => write!(f, "io error: {e}"),
            ForwardError::MalformedChunkSize => write!(f, "malformed chunk size"),
        }
    }
}

/// Whether the message being relayed is a request or a response — affects
/// the close-delimited body fallback, which only applies to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
}

/// Relay one HTTP/1.1 message byte-for-byte from `src` to `sink`, preserving
/// framing exactly: headers raw, body per Content-Length/chunked/close rules.
pub async fn forward_message<R, W>(
    src: &mut R,
    sink: &mut W,
    kind: MessageKind,
) -> Result<(), ForwardError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (content_length, chunked) = forward_headers(src, sink).await?;

    if chunked {
        forward_chunked(src, sink).await?;
    } else if content_length > 0 {
        forward_fixed_length(src, sink, content_length as u64).await?;
    } else if kind == MessageKind::Response && content_length == -1 {
        forward_until_eof(src, sink).await?;
    }
    // request with no length, or length == 0: no body.

    sink.flush().await?;
    Ok(())
}

/// Reads and relays header lines one byte at a time until the blank line
/// that terminates the header block. Returns `(content_length, chunked)`
/// where `content_length == -1` means no valid Content-Length was seen.
async fn forward_headers<R, W>(src: &mut R, sink: &mut W) -> std::io::Result<(i64, bool)>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut content_length: i64 = -1;
    let mut chunked = false;
    let mut line: Vec<u8> = Vec::with_capacity(128);

    loop {
        let byte = read_one_byte(src).await?;
        sink.write_all(&[byte]).await?;

        if byte == b'\n' {
            let trimmed = strip_trailing_cr(&line);
            if trimmed.is_empty() {
                break;
            }
            if let Some(value) = header_value(trimmed, b"content-length") {
                if let Ok(text) = std::str::from_utf8(value) {
                    if let Ok(n) = text.trim().parse::<i64>() {
                        if n >= 0 {
                            content_length = n;
                        }
                    }
                }
            } else if let Some(value) = header_value(trimmed, b"transfer-encoding") {
                if contains_ascii_ci(value, b"chunked") {
                    chunked = true;
                }
            }
            line.clear();
        } else {
            line.push(byte);
        }
    }

    Ok((content_length, chunked))
}

fn strip_trailing_cr(line: &[u8]) -> &[u8] {
    match line.split_last() {
        Some((&b'\r', rest)) => rest,
        _ => line,
    }
}

/// If `line` is `"<name>: value"` (case-insensitive name match), returns the
/// value bytes with surrounding whitespace untouched (caller trims).
fn header_value<'a>(line: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    let colon = line.iter().position(|&b| b == b':')?;
    let candidate = &line[..colon];
    if candidate.len() != name.len() {
        return None;
    }
    if !candidate
        .iter()
        .zip(name.iter())
        .all(|(a, b)| a.to_ascii_lowercase() == *b)
    {
        return None;
    }
    Some(&line[colon + 1..])
}

fn contains_ascii_ci(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return needle.is_empty();
    }
    haystack.windows(needle.len()).any(|w| {
        w.iter()
            .zip(needle.iter())
            .all(|(a, b)| a.to_ascii_lowercase() == b.to_ascii_lowercase())
    })
}

async fn read_one_byte<R: AsyncRead + Unpin>(src: &mut R) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    src.read_exact(&mut buf).await?;
    Ok(buf[0])
}

/// Reads one line (up to and including `\n`), relaying every byte to `sink`.
/// Returns the line with any trailing `\r\n`/`\n` stripped.
async fn read_and_relay_line<R, W>(src: &mut R, sink: &mut W) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::with_capacity(32);
    loop {
        let byte = read_one_byte(src).await?;
        sink.write_all(&[byte]).await?;
        if byte == b'\n' {
            break;
        }
        line.push(byte);
    }
    Ok(strip_trailing_cr(&line).to_vec())
}

async fn forward_chunked<R, W>(src: &mut R, sink: &mut W) -> Result<(), ForwardError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let size_line = read_and_relay_line(src, sink).await?;
        let size_text = match size_line.iter().position(|&b| b == b';') {
            Some(idx) => &size_line[..idx],
            None => &size_line[..],
        };
        let size_text =
            std::str::from_utf8(size_text).map_err(|_| ForwardError::MalformedChunkSize)?;
        let size = u64::from_str_radix(size_text.trim(), 16)
            .map_err(|_| ForwardError::MalformedChunkSize)?;

        if size == 0 {
            // trailing CRLF (or trailers, which this proxy does not parse)
            read_and_relay_line(src, sink).await?;
            break;
        }

        forward_fixed_length(src, sink, size).await?;
        // trailing CRLF after chunk data
        read_and_relay_line(src, sink).await?;
    }
    Ok(())
}

async fn forward_fixed_length<R, W>(src: &mut R, sink: &mut W, mut remaining: u64) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; FIXED_BUF_LEN];
    while remaining > 0 {
        let want = remaining.min(FIXED_BUF_LEN as u64) as usize;
        let n = src.read(&mut buf[..want]).await?;
        if n == 0 {
            tracing::debug!("short read from source, {} bytes short", remaining);
            break;
        }
        sink.write_all(&buf[..n]).await?;
        remaining -= n as u64;
    }
    Ok(())
}

async fn forward_until_eof<R, W>(src: &mut R, sink: &mut W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; FIXED_BUF_LEN];
    loop {
        let n = src.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        sink.write_all(&buf[..n]).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    async fn relay_bytes(input: &[u8], kind: MessageKind) -> Vec<u8> {
        let mut src = input;
        let mut out = Vec::new();
        forward_message(&mut src, &mut out, kind).await.unwrap();
        out
    }

    #[tokio::test]
    async fn fixed_length_body_round_trips() {
        let msg = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
        let out = relay_bytes(msg, MessageKind::Response).await;
        assert_eq!(out, msg);
    }

    #[tokio::test]
    async fn chunked_body_round_trips() {
        let msg = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
        let out = relay_bytes(msg, MessageKind::Response).await;
        assert_eq!(out, msg);
    }

    #[tokio::test]
    async fn request_with_no_body_has_no_trailing_bytes() {
        let msg = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        let out = relay_bytes(msg, MessageKind::Request).await;
        assert_eq!(out, msg);
    }

    #[tokio::test]
    async fn response_with_no_length_relays_until_eof() {
        let msg = b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nbody-without-length";
        let out = relay_bytes(msg, MessageKind::Response).await;
        assert_eq!(out, msg);
    }

    #[tokio::test]
    async fn malformed_chunk_size_aborts() {
        let msg = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nZZZ\r\nhello\r\n0\r\n\r\n";
        let mut src: &[u8] = msg;
        let mut out = Vec::new();
        let result = forward_message(&mut src, &mut out, MessageKind::Response).await;
        assert!(matches!(result, Err(ForwardError::MalformedChunkSize)));
    }

    #[tokio::test]
    async fn headers_preserved_verbatim_including_casing() {
        let msg = b"HTTP/1.1 200 OK\r\nX-Custom-Header: Some Value\r\nContent-Length: 2\r\n\r\nhi";
        let out = relay_bytes(msg, MessageKind::Response).await;
        assert_eq!(out, msg);
    }

    #[tokio::test]
    async fn duplex_pipe_round_trip() {
        let (mut client, mut server) = duplex(256);
        let msg = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok".to_vec();
        let writer = tokio::spawn(async move {
            client.write_all(&msg).await.unwrap();
            client
        });
        let mut out = Vec::new();
        let mut limited = tokio::io::AsyncReadExt::take(&mut server, 40);
        forward_message(&mut limited, &mut out, MessageKind::Response)
            .await
            .unwrap();
        writer.await.unwrap();
        assert_eq!(out, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
    }
}
