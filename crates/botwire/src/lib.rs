//! botwire: per-event Slack bot wrapper
//!
//! Shapes replies, file uploads and typing indicators for the event that
//! triggered a bot. Works with both HTTP callbacks (slash commands,
//! interactions) and streaming socket connections.

pub mod api;
pub mod bot;
pub mod config;
pub mod error;
pub mod operator_log;
pub mod transport;
pub mod types;

pub use api::{ApiClient, SlackApiClient};
pub use bot::Bot;
pub use config::{ApiConfig, AuthConfig, BotConfig};
pub use error::{BotError, Result};
pub use operator_log::{OperatorLog, TracingLog};
pub use transport::{
    HttpTransport, ResponseSink, ResponseSlot, SocketHandle, SocketTransport, WsSocket,
};
pub use types::{
    ApiResponse, AuthRecord, BotAuth, ChannelRef, Delivery, Endpoint, FileInput, FileSource,
    FileUpload, MessageContext, MessageInput, OutgoingMessage, SkipReason,
};
