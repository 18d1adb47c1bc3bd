//! Slack payload and request types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Web API method used when no endpoint is given
pub const POST_MESSAGE: &str = "chat.postMessage";

/// Web API method for file uploads
pub const FILES_UPLOAD: &str = "files.upload";

/// OAuth record for a team, as stored after installation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthRecord {
    #[serde(default)]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<BotAuth>,
}

/// Bot-specific part of an OAuth record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotAuth {
    pub bot_access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_user_id: Option<String>,
}

impl AuthRecord {
    /// Record for a user identity
    pub fn user(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            bot: None,
        }
    }

    /// Record for a bot identity
    pub fn bot(bot_access_token: impl Into<String>) -> Self {
        Self {
            access_token: String::new(),
            bot: Some(BotAuth {
                bot_access_token: bot_access_token.into(),
                bot_user_id: None,
            }),
        }
    }

    /// The bearer token to act with: the bot token when the record carries
    /// a bot identity, the generic access token otherwise.
    pub fn token(&self) -> &str {
        match &self.bot {
            Some(bot) => &bot.bot_access_token,
            None => &self.access_token,
        }
    }
}

/// Channel as it appears in an event payload: either a bare id or a
/// channel object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelRef {
    Id(String),
    Object {
        #[serde(default)]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl ChannelRef {
    /// The channel id, if one is present
    pub fn id(&self) -> Option<&str> {
        match self {
            ChannelRef::Id(id) => non_empty(id),
            ChannelRef::Object { id, .. } => id.as_deref().and_then(non_empty),
        }
    }
}

/// Payload of the event that triggered the bot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelRef>,
    /// Remaining event fields, kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageContext {
    /// Context of a slash command or interaction posted to a channel
    pub fn for_channel(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: Some(channel_id.into()),
            ..Default::default()
        }
    }

    /// Set the response URL
    pub fn with_response_url(mut self, url: impl Into<String>) -> Self {
        self.response_url = Some(url.into());
        self
    }

    /// Response URL for ephemeral replies
    pub fn response_url(&self) -> Option<&str> {
        self.response_url.as_deref().and_then(non_empty)
    }

    /// Channel to address replies to. The `channel` field wins over
    /// `channel_id`.
    pub fn resolve_channel(&self) -> Option<&str> {
        self.channel
            .as_ref()
            .and_then(ChannelRef::id)
            .or_else(|| self.channel_id.as_deref().and_then(non_empty))
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

/// Message to post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Value>>,
    /// `ephemeral` or `in_channel`, only meaningful for response URLs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OutgoingMessage {
    /// Plain text message
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }

    pub fn with_blocks(mut self, blocks: Vec<Value>) -> Self {
        self.blocks = Some(blocks);
        self
    }
}

/// Anything that can be sent as a reply
#[derive(Debug, Clone, PartialEq)]
pub enum MessageInput {
    Text(String),
    /// Rendered error value
    Error(String),
    Structured(OutgoingMessage),
}

impl MessageInput {
    /// Reply with the display form of an error
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        MessageInput::Error(err.to_string())
    }

    /// Normalize into a structured message
    pub fn into_message(self) -> OutgoingMessage {
        match self {
            MessageInput::Text(text) | MessageInput::Error(text) => OutgoingMessage::text(text),
            MessageInput::Structured(message) => message,
        }
    }
}

impl From<&str> for MessageInput {
    fn from(text: &str) -> Self {
        MessageInput::Text(text.to_string())
    }
}

impl From<String> for MessageInput {
    fn from(text: String) -> Self {
        MessageInput::Text(text)
    }
}

impl From<OutgoingMessage> for MessageInput {
    fn from(message: OutgoingMessage) -> Self {
        MessageInput::Structured(message)
    }
}

/// Content of an upload
#[derive(Debug, Clone, PartialEq)]
pub enum FileSource {
    /// File on disk, read at dispatch time
    Path(PathBuf),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Literal text content
    Content(String),
}

/// A `files.upload` request
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub source: FileSource,
    pub filename: Option<String>,
    /// Comma-separated channel ids
    pub channels: Option<String>,
    pub title: Option<String>,
    pub initial_comment: Option<String>,
    pub filetype: Option<String>,
}

impl FileUpload {
    pub fn new(source: FileSource) -> Self {
        Self {
            source,
            filename: None,
            channels: None,
            title: None,
            initial_comment: None,
            filetype: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_initial_comment(mut self, comment: impl Into<String>) -> Self {
        self.initial_comment = Some(comment.into());
        self
    }
}

/// Anything that can be uploaded as a file reply
#[derive(Debug, Clone, PartialEq)]
pub enum FileInput {
    Bytes(Vec<u8>),
    Path(PathBuf),
    /// Literal file content
    Inline(String),
    Upload(FileUpload),
}

impl FileInput {
    /// Classify a string: an existing path is uploaded from disk,
    /// anything else is taken as the file content itself.
    pub fn detect(value: impl Into<String>) -> Self {
        let value = value.into();
        if Path::new(&value).exists() {
            FileInput::Path(PathBuf::from(value))
        } else {
            FileInput::Inline(value)
        }
    }

    /// Normalize into an upload request
    pub fn into_upload(self) -> FileUpload {
        match self {
            FileInput::Bytes(bytes) => FileUpload::new(FileSource::Bytes(bytes)),
            FileInput::Path(path) => FileUpload::new(FileSource::Path(path)),
            FileInput::Inline(content) => FileUpload::new(FileSource::Content(content)),
            FileInput::Upload(upload) => upload,
        }
    }
}

impl From<Vec<u8>> for FileInput {
    fn from(bytes: Vec<u8>) -> Self {
        FileInput::Bytes(bytes)
    }
}

impl From<PathBuf> for FileInput {
    fn from(path: PathBuf) -> Self {
        FileInput::Path(path)
    }
}

impl From<FileUpload> for FileInput {
    fn from(upload: FileUpload) -> Self {
        FileInput::Upload(upload)
    }
}

/// Where a request goes: a Web API method or an absolute URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Method(String),
    Url(String),
}

impl Endpoint {
    pub fn parse(value: &str) -> Self {
        if value.starts_with("https://") || value.starts_with("http://") {
            Endpoint::Url(value.to_string())
        } else {
            Endpoint::Method(value.to_string())
        }
    }

    /// Absolute URL, method names resolved against `base_url`
    pub fn url(&self, base_url: &str) -> String {
        match self {
            Endpoint::Method(method) => format!("{}/{}", base_url.trim_end_matches('/'), method),
            Endpoint::Url(url) => url.clone(),
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::Method(POST_MESSAGE.to_string())
    }
}

impl From<&str> for Endpoint {
    fn from(value: &str) -> Self {
        Endpoint::parse(value)
    }
}

impl From<String> for Endpoint {
    fn from(value: String) -> Self {
        Endpoint::parse(&value)
    }
}

/// Web API response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ApiResponse {
    /// Response for endpoints that answer with a plain `ok` body
    pub fn acknowledged() -> Self {
        Self {
            ok: true,
            error: None,
            data: Map::new(),
        }
    }
}

/// Why a reply was not sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Ephemeral reply requested but the context has no response URL
    NoResponseUrl,
    /// Nothing to address the reply to
    NoChannel,
}

/// Outcome of a reply
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Sent(ApiResponse),
    Skipped(SkipReason),
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent(_))
    }

    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            Delivery::Sent(response) => Some(response),
            Delivery::Skipped(_) => None,
        }
    }
}
