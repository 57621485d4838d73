//! Base-protocol framing: `Content-Length` headers followed by a JSON body.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::LspError;

/// Refuse bodies larger than this; a server sending more is broken.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Read one framed message. `Ok(None)` means the stream ended cleanly
/// between messages.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Vec<u8>>, LspError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    let mut saw_header = false;

    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| LspError::Transport(format!("failed to read header: {}", e)))?;
        if read == 0 {
            if saw_header {
                return Err(LspError::Transport(
                    "stream ended inside a message header".to_string(),
                ));
            }
            return Ok(None);
        }

        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            if saw_header {
                break;
            }
            // Tolerate stray blank lines between messages.
            continue;
        }
        saw_header = true;

        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| LspError::Transport(format!("malformed header line: {:?}", header)))?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            let length = value.trim().parse::<usize>().map_err(|_| {
                LspError::Transport(format!("invalid Content-Length: {:?}", value.trim()))
            })?;
            content_length = Some(length);
        }
    }

    let length = content_length
        .ok_or_else(|| LspError::Transport("message without Content-Length".to_string()))?;
    if length > MAX_BODY_BYTES {
        return Err(LspError::Transport(format!(
            "message body of {} bytes exceeds limit",
            length
        )));
    }

    let mut body = vec![0u8; length];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| LspError::Transport(format!("failed to read body: {}", e)))?;
    Ok(Some(body))
}

/// Serialize and write one framed message, flushing afterwards.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), LspError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message)
        .map_err(|e| LspError::Transport(format!("failed to encode message: {}", e)))?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());

    let io = async {
        writer.write_all(header.as_bytes()).await?;
        writer.write_all(&body).await?;
        writer.flush().await
    };
    io.await
        .map_err(|e| LspError::Transport(format!("failed to write message: {}", e)))
}
