//! Standard machine-readable error codes carried on `error` frames and
//! terminal lifecycle events.

pub mod error_codes {
    pub const UNAUTHORIZED: &str = "Unauthorized";
    pub const CAPACITY_EXCEEDED: &str = "CapacityExceeded";
    pub const RATE_LIMITED: &str = "RateLimited";
    pub const BUSY: &str = "Busy";
    pub const CANCELLED: &str = "Cancelled";
    pub const CANCELLATION_TIMEOUT: &str = "CancellationTimeout";
    pub const FRAME_TOO_LARGE: &str = "FrameTooLarge";
    pub const BACKPRESSURE: &str = "Backpressure";
    pub const NOT_FOUND: &str = "NotFound";
    pub const INVALID: &str = "Invalid";
    pub const NOT_CONNECTED: &str = "NotConnected";
    pub const CONFLICT: &str = "Conflict";
    pub const TRANSIENT: &str = "Transient";
    pub const INTERNAL: &str = "Internal";
}
