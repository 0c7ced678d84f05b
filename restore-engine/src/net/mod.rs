//! Serving a restore session over a byte stream.
//!
//! The session itself is synchronous and runs on the blocking pool. Two
//! tasks bridge it to the connection:
//! - inbound frames are decoded and queued for the session's non-blocking poll
//! - outbound frames are encoded and flushed in batches

use crate::protocol::{ChannelPeer, Frame, FrameCodec};
use crate::restore::{RestoreSession, SessionReport};
use crate::utils::{RestoreError, Result};
use futures_util::{SinkExt, StreamExt};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Frames buffered in each direction before the producer waits
const CHANNEL_CAPACITY: usize = 256;

/// Run `session` against the peer on the other end of `stream`.
pub async fn serve_session<T>(stream: T, session: RestoreSession) -> Result<SessionReport>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let session_id = session.id();
    info!("Serving restore session {}", session_id);

    let (mut sink, mut source) = Framed::new(stream, FrameCodec).split();
    let (inbound_tx, inbound_rx) = mpsc::channel::<Frame>(CHANNEL_CAPACITY);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(CHANNEL_CAPACITY);

    // Decode peer frames until the connection closes or sends garbage
    let recv_task = tokio::spawn(async move {
        while let Some(item) = source.next().await {
            let frame = item?;
            if inbound_tx.send(frame).await.is_err() {
                break;
            }
        }
        debug!("Peer stopped sending");
        Ok::<(), RestoreError>(())
    });

    // Forward session frames, flushing whenever the queue runs dry
    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            sink.feed(frame).await?;
            while let Ok(frame) = outbound_rx.try_recv() {
                sink.feed(frame).await?;
            }
            sink.flush().await?;
        }
        sink.close().await?;
        Ok::<(), RestoreError>(())
    });

    let peer = ChannelPeer::new(inbound_rx, outbound_tx);
    let outcome = tokio::task::spawn_blocking(move || {
        let mut peer = peer;
        session.run(&mut peer)
    })
    .await;

    let flushed = send_task.await;
    recv_task.abort();
    let received = recv_task.await;

    let report = match outcome {
        Ok(Ok(report)) => report,
        // a closed channel hides why the connection went away
        Ok(Err(RestoreError::PeerClosed)) => {
            return Err(match received {
                Ok(Err(e)) => e,
                _ => RestoreError::PeerClosed,
            })
        }
        Ok(Err(e)) => return Err(e),
        Err(e) => {
            return Err(RestoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("restore task failed: {}", e),
            )))
        }
    };

    match flushed {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Connection error after restore end: {}", e),
        Err(e) => warn!("Send task failed: {}", e),
    }
    info!("Restore session {} finished", session_id);
    Ok(report)
}
