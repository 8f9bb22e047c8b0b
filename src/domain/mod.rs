pub mod entities;
pub mod events;

pub use entities::{
    ActivoModelo, ActivoUnidad, MutationKind, MutationStatus, Notification, NotificationKind,
    NotificationRing, QueuedMutation, UserRole,
};
pub use events::{ChannelEvent, DeletedRef, LiveChangeEvent};
