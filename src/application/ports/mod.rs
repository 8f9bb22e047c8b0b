pub mod cue_sink;
pub mod mutation_sender;
pub mod offline_store;

pub use cue_sink::{CueSink, SilentCue};
pub use mutation_sender::MutationSender;
pub use offline_store::OfflineStorePort;
