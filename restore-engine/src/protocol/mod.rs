//! Peer protocol: frames, wire codec and the peer abstraction.

pub mod frame;
pub mod peer;

pub use frame::{Frame, FrameCodec};
pub use peer::{ChannelPeer, Peer};
