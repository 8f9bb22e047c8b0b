pub mod activo;
pub mod mutation;
pub mod notification;
pub mod role;

pub use activo::{ActivoModelo, ActivoUnidad};
pub use mutation::{MutationKind, MutationStatus, QueuedMutation};
pub use notification::{Notification, NotificationKind, NotificationRing, NOTIFICATION_CAP};
pub use role::UserRole;
