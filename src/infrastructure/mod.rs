pub mod api;
pub mod offline;
pub mod realtime;
