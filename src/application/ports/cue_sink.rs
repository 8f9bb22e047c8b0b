use crate::domain::entities::NotificationKind;

/// Short audio cue played when a notification lands. The host application
/// supplies the actual playback; the core only decides when it fires.
pub trait CueSink: Send + Sync {
    fn play(&self, kind: NotificationKind);
}

/// Default sink for headless hosts and tests.
pub struct SilentCue;

impl CueSink for SilentCue {
    fn play(&self, _kind: NotificationKind) {}
}
