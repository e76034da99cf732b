/// Radio/permission collaborator checked before any transport operation.
///
/// On the device this is the platform's adapter-enabled and
/// connect-permission checks; both are surfaced as distinct failures so the
/// UI can tell the user which one to fix.
pub trait RadioAdapter: Send + Sync {
    fn is_enabled(&self) -> bool;
    fn is_connect_permitted(&self) -> bool;
}

/// Adapter that reports the radio as always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnRadio;

impl RadioAdapter for AlwaysOnRadio {
    fn is_enabled(&self) -> bool {
        true
    }

    fn is_connect_permitted(&self) -> bool {
        true
    }
}
