pub mod channel;

pub use channel::{ChannelFrame, RealtimeChannel};
