//! Reads exactly one RESP2 reply's raw bytes from a Storage Node
//! connection, so the forward path can pass it straight to the client
//! without re-encoding it.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use hkv_common::HkvError;

type BoxedResult<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, HkvError>> + Send + 'a>>;

/// Reads one complete RESP2 value and returns its exact wire bytes
/// (including framing), so callers can write it straight through.
///
/// Boxed explicitly (rather than a plain recursive `async fn`) because
/// arrays nest by recursing into this same reader — an unboxed recursive
/// async fn would have an infinitely-sized future type.
pub fn read_one_reply<'a, R>(reader: &'a mut R) -> BoxedResult<'a>
where
    R: AsyncBufRead + Unpin + Send,
{
    Box::pin(async move {
        let mut out = Vec::new();
        let mut line = Vec::new();
        read_line(reader, &mut line).await?;
        out.extend_from_slice(&line);

        let Some(&prefix) = line.first() else {
            return Err(HkvError::Protocol("empty reply".to_string()));
        };

        match prefix {
            b'+' | b'-' | b':' => {}
            b'$' => {
                let len = parse_len(&line[1..])?;
                if len >= 0 {
                    let mut data = vec![0u8; len as usize + 2];
                    reader
                        .read_exact(&mut data)
                        .await
                        .map_err(|err| HkvError::Transport(err.to_string()))?;
                    out.extend_from_slice(&data);
                }
            }
            b'*' => {
                let len = parse_len(&line[1..])?;
                for _ in 0..len.max(0) {
                    let element = read_one_reply(reader).await?;
                    out.extend_from_slice(&element);
                }
            }
            _ => return Err(HkvError::Protocol("unrecognized reply type".to_string())),
        }

        Ok(out)
    })
}

async fn read_line<R>(reader: &mut R, out: &mut Vec<u8>) -> Result<(), HkvError>
where
    R: AsyncBufRead + Unpin,
{
    out.clear();
    let bytes = reader
        .read_until(b'\n', out)
        .await
        .map_err(|err| HkvError::Transport(err.to_string()))?;
    if bytes == 0 {
        return Err(HkvError::Transport("connection closed".to_string()));
    }
    if out.len() < 2 || out[out.len() - 2] != b'\r' {
        return Err(HkvError::Protocol("malformed reply line".to_string()));
    }
    Ok(())
}

fn parse_len(data: &[u8]) -> Result<i64, HkvError> {
    let text = std::str::from_utf8(&data[..data.len() - 2])
        .map_err(|_| HkvError::Protocol("non-utf8 length".to_string()))?;
    text.parse()
        .map_err(|_| HkvError::Protocol("invalid length".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn reads_simple_string() {
        let mut reader = BufReader::new(&b"+OK\r\n"[..]);
        let reply = read_one_reply(&mut reader).await.unwrap();
        assert_eq!(reply, b"+OK\r\n");
    }

    #[tokio::test]
    async fn reads_bulk_string() {
        let mut reader = BufReader::new(&b"$3\r\nbar\r\n"[..]);
        let reply = read_one_reply(&mut reader).await.unwrap();
        assert_eq!(reply, b"$3\r\nbar\r\n");
    }

    #[tokio::test]
    async fn reads_null_bulk_string() {
        let mut reader = BufReader::new(&b"$-1\r\n"[..]);
        let reply = read_one_reply(&mut reader).await.unwrap();
        assert_eq!(reply, b"$-1\r\n");
    }

    #[tokio::test]
    async fn reads_array() {
        let mut reader = BufReader::new(&b"*2\r\n$1\r\na\r\n$1\r\nb\r\n"[..]);
        let reply = read_one_reply(&mut reader).await.unwrap();
        assert_eq!(reply, b"*2\r\n$1\r\na\r\n$1\r\nb\r\n");
    }
}
