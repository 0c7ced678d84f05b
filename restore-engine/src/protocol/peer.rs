//! The restore loop's view of the remote peer.

use crate::protocol::frame::Frame;
use crate::utils::{RestoreError, Result};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

pub trait Peer {
    /// Return a queued control frame if one has arrived. Never blocks.
    fn try_recv(&mut self) -> Result<Option<Frame>>;

    /// Wait for the next frame.
    fn recv(&mut self) -> Result<Frame>;

    fn send(&mut self, frame: Frame) -> Result<()>;
}

/// Peer backed by channels that the network task drains and fills.
///
/// Must be driven from a blocking thread (`spawn_blocking`), never from
/// inside an async task.
pub struct ChannelPeer {
    inbound: mpsc::Receiver<Frame>,
    outbound: mpsc::Sender<Frame>,
}

impl ChannelPeer {
    pub fn new(inbound: mpsc::Receiver<Frame>, outbound: mpsc::Sender<Frame>) -> Self {
        Self { inbound, outbound }
    }
}

impl Peer for ChannelPeer {
    fn try_recv(&mut self) -> Result<Option<Frame>> {
        match self.inbound.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RestoreError::PeerClosed),
        }
    }

    fn recv(&mut self) -> Result<Frame> {
        self.inbound.blocking_recv().ok_or(RestoreError::PeerClosed)
    }

    fn send(&mut self, frame: Frame) -> Result<()> {
        self.outbound
            .blocking_send(frame)
            .map_err(|_| RestoreError::PeerClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_recv_does_not_block_when_empty() {
        let (_in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, _out_rx) = mpsc::channel(4);
        let mut peer = ChannelPeer::new(in_rx, out_tx);

        assert_eq!(peer.try_recv().unwrap(), None);
    }

    #[test]
    fn test_frames_flow_both_ways() {
        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let mut peer = ChannelPeer::new(in_rx, out_tx);

        in_tx.blocking_send(Frame::Warning("slow disk".to_string())).unwrap();
        assert_eq!(
            peer.try_recv().unwrap(),
            Some(Frame::Warning("slow disk".to_string()))
        );

        peer.send(Frame::Gen("restoreend".to_string())).unwrap();
        assert_eq!(
            out_rx.blocking_recv(),
            Some(Frame::Gen("restoreend".to_string()))
        );
    }

    #[test]
    fn test_closed_peer() {
        let (in_tx, in_rx) = mpsc::channel::<Frame>(4);
        let (out_tx, out_rx) = mpsc::channel(4);
        let mut peer = ChannelPeer::new(in_rx, out_tx);
        drop(in_tx);
        drop(out_rx);

        assert!(matches!(peer.try_recv(), Err(RestoreError::PeerClosed)));
        assert!(matches!(peer.recv(), Err(RestoreError::PeerClosed)));
        assert!(matches!(
            peer.send(Frame::Gen("x".to_string())),
            Err(RestoreError::PeerClosed)
        ));
    }
}
