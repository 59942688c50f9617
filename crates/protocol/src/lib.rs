//! Wire protocol for the Wingman gateway.
//!
//! All communication uses JSON frames over WebSocket (or the equivalent HTTP
//! long-poll bridge). Frames are tagged-variant enums rather than a single
//! envelope struct with a grab-bag of optional fields: each frame type gets
//! its own payload shape and an exhaustive match at the dispatch site.

mod agent;
mod codes;
mod frame;
mod handshake;

pub use agent::{
    AgentEventPayload, Attachment, AttachmentKind, MessageRole, PeerRef, RequestAgentPayload,
    RoutingSelector,
};
pub use codes::error_codes;
pub use frame::{ClientFrame, ErrorPayload, GroupStrategy, ServerFrame};
pub use handshake::{AuthPayload, ClientDescriptor};

/// Current wire protocol version. Bumped on breaking frame-shape changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Default maximum size of a single frame, in bytes. Exceeding it closes the
/// connection with `FrameTooLarge`.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1 << 20; // 1 MiB

/// Default depth of a node's outbound mailbox channel.
pub const DEFAULT_MAILBOX_DEPTH: usize = 256;

/// Default heartbeat interval, in milliseconds.
pub const DEFAULT_PING_INTERVAL_MS: u64 = 30_000;

/// Default heartbeat timeout, in milliseconds. Nodes silent longer than this
/// are evicted by the registry sweeper.
pub const DEFAULT_PING_TIMEOUT_MS: u64 = 90_000;

/// Default per-request cooperative cancellation grace period, in milliseconds.
pub const DEFAULT_GRACEFUL_SHUTDOWN_MS: u64 = 5_000;

/// Default maximum duration of a single agent request, in milliseconds.
pub const DEFAULT_MAX_REQUEST_DURATION_MS: u64 = 10 * 60 * 1_000;
