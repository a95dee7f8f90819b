//! Timed reads and writes shared by the socket-like transports

use std::io;
use std::time::Duration;

use domain::WriteError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

pub(crate) enum ReadOutcome {
    Data(Vec<u8>),
    /// Nothing arrived within the window
    Idle,
    /// Peer closed the stream
    Closed,
    Failed(io::Error),
}

pub(crate) async fn read_chunk<S>(stream: &mut S, timeout: Duration, capacity: usize) -> ReadOutcome
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; capacity];
    match tokio::time::timeout(timeout, stream.read(&mut buf)).await {
        Err(_) => ReadOutcome::Idle,
        Ok(Ok(0)) => ReadOutcome::Closed,
        Ok(Ok(n)) => {
            buf.truncate(n);
            ReadOutcome::Data(buf)
        }
        Ok(Err(e)) => ReadOutcome::Failed(e),
    }
}

/// Write all of `data` before `timeout` runs out, tracking the offset reached
pub(crate) async fn write_all_within<S>(stream: &mut S, data: &[u8], timeout: Duration) -> Result<(), WriteError>
where
    S: AsyncWrite + Unpin,
{
    let deadline = Instant::now() + timeout;
    let mut offset = 0;

    while offset < data.len() {
        match tokio::time::timeout_at(deadline, stream.write(&data[offset..])).await {
            Err(_) => return Err(WriteError::TimedOut { offset }),
            Ok(Ok(0)) => {
                return Err(WriteError::Failed {
                    offset,
                    reason: "connection closed".into(),
                });
            }
            Ok(Ok(n)) => offset += n,
            Ok(Err(e)) => {
                return Err(WriteError::Failed {
                    offset,
                    reason: e.to_string(),
                });
            }
        }
    }

    match tokio::time::timeout_at(deadline, stream.flush()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(WriteError::Failed {
            offset,
            reason: e.to_string(),
        }),
        Err(_) => Err(WriteError::TimedOut { offset }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_write_all_within() {
        let mut mock = Builder::new().write(b"^XA").write(b"^XZ").build();
        assert!(write_all_within(&mut mock, b"^XA^XZ", Duration::from_secs(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_write_error_reports_offset() {
        let mut mock = Builder::new()
            .write(b"abc")
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let err = write_all_within(&mut mock, b"abcdef", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.offset(), 3);
    }

    #[tokio::test]
    async fn test_read_chunk_outcomes() {
        let mut mock = Builder::new().read(&[0x12]).build();
        assert!(matches!(
            read_chunk(&mut mock, Duration::from_millis(50), 64).await,
            ReadOutcome::Data(ref bytes) if bytes == &[0x12]
        ));
        assert!(matches!(
            read_chunk(&mut mock, Duration::from_millis(50), 64).await,
            ReadOutcome::Closed
        ));
    }
}
