//! Entry names shared with the foreground process. Both sides depend on the
//! exact spelling.

pub const RUNNING: &str = "running";
pub const STARTED: &str = "started";
pub const IS_ACTIVE: &str = "is_active";
pub const WAITING_FOR_START: &str = "waiting_for_start";
pub const ACTIVE_WINDOW: &str = "active_window";

pub const UPDATE_SOURCE_CHANGED: &str = "update_source_changed";
pub const UPDATE_AVAILABLE: &str = "update_available";
pub const UPDATE_IS_DOWNGRADE: &str = "update_is_downgrade";
pub const UPDATE_RESPONSE: &str = "update_response";
pub const UPDATE_MAJOR_CHANGE: &str = "update_major_change";
pub const UPDATE_MAJOR_CHANGE_RESPONSE: &str = "update_major_change_response";

pub const SERVICE_STARTED: &str = "service.started";
/// Set by the host integration while the system is suspended.
pub const SLEEPING: &str = "sleeping";

/// The only `update_response` value that proceeds with an install.
pub const COMMENCE: &str = "commence";

/// Entries owned by one negotiation session; all are reset when it ends.
pub const SESSION_KEYS: [&str; 6] = [
    UPDATE_AVAILABLE,
    UPDATE_RESPONSE,
    UPDATE_SOURCE_CHANGED,
    UPDATE_IS_DOWNGRADE,
    UPDATE_MAJOR_CHANGE,
    UPDATE_MAJOR_CHANGE_RESPONSE,
];

pub const ALL: [&str; 13] = [
    RUNNING,
    STARTED,
    IS_ACTIVE,
    WAITING_FOR_START,
    ACTIVE_WINDOW,
    UPDATE_SOURCE_CHANGED,
    UPDATE_AVAILABLE,
    UPDATE_IS_DOWNGRADE,
    UPDATE_RESPONSE,
    UPDATE_MAJOR_CHANGE,
    UPDATE_MAJOR_CHANGE_RESPONSE,
    SERVICE_STARTED,
    SLEEPING,
];
