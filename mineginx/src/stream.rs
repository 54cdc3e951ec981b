use std::time::Duration;

use tokio::{
    task::JoinHandle,
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
    io::{AsyncReadExt, AsyncWriteExt},
    time::timeout,
};

/// Forwards data from `reader` to `writer` until EOF, error, or `idle_timeout`
/// elapses with no bytes read, then shuts down the writer (sends TCP FIN to
/// the remote end).
///
/// Each direction of a spliced connection gets its own spawned task so the
/// tokio scheduler can interleave them with the accept loop and other
/// connections freely. Reads are forwarded in the order they complete, so no
/// reordering is introduced.
pub fn forward_half(
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    buffer_size: usize,
    idle_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0; buffer_size];
        loop {
            let read = match timeout(idle_timeout, reader.read(&mut buf)).await {
                Ok(result) => result,
                Err(_) => break,
            };
            match read {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if writer.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
        // Shut down the write half so the remote end receives FIN.
        // The other forwarding task (opposite direction) will then
        // naturally read EOF and terminate on its own — no signaling needed.
        _ = writer.shutdown().await;
    })
}

/// Reads and discards everything from `reader` until EOF or error.
///
/// Used once a hidden-mode sidecar has served its purpose (relayed the
/// encryption response): its further output must not reach the client, but
/// the socket still needs draining so the sidecar's writes don't back up.
pub fn drain(mut reader: OwnedReadHalf) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
}
