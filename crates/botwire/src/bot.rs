//! Per-event bot
//!
//! A `Bot` is created for one inbound event. It holds the team's credential,
//! the event payload and the transport the event arrived on, and shapes
//! outgoing messages and files for that event.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::api::{ApiClient, SlackApiClient};
use crate::config::BotConfig;
use crate::error::{BotError, Result};
use crate::operator_log::{OperatorLog, TracingLog};
use crate::transport::{HttpTransport, SocketTransport};
use crate::types::{
    ApiResponse, AuthRecord, Delivery, Endpoint, FileInput, FileSource, FileUpload, MessageContext,
    MessageInput, SkipReason,
};

/// Bot bound to one inbound event.
///
/// `T` is the output transport (`HttpTransport` or `SocketTransport`);
/// operations that only make sense for one of them live on that
/// specialization.
pub struct Bot<T, C = SlackApiClient> {
    token: String,
    client: C,
    context: Arc<MessageContext>,
    transport: T,
    log: Arc<dyn OperatorLog>,
}

impl<T> Bot<T, SlackApiClient> {
    /// Create a bot acting with the credential found in `auth`
    pub fn new(
        auth: &AuthRecord,
        context: impl Into<Arc<MessageContext>>,
        transport: T,
        config: &BotConfig,
    ) -> Result<Self> {
        let token = auth.token();
        let client = SlackApiClient::with_config(token, &config.api)?;

        Ok(Self::with_client(token, client, context, transport))
    }
}

impl<T, C: ApiClient> Bot<T, C> {
    /// Create a bot around an existing API client
    pub fn with_client(
        token: impl Into<String>,
        client: C,
        context: impl Into<Arc<MessageContext>>,
        transport: T,
    ) -> Self {
        Self {
            token: token.into(),
            client,
            context: context.into(),
            transport,
            log: Arc::new(TracingLog),
        }
    }

    /// Replace the operator log
    pub fn with_operator_log(mut self, log: Arc<dyn OperatorLog>) -> Self {
        self.log = log;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn context(&self) -> &MessageContext {
        &self.context
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Reply to the triggering message.
    ///
    /// Ephemeral replies go to the context's response URL. Without one the
    /// reply is skipped and reported to the operator log. Other replies are
    /// posted to the resolved channel.
    pub async fn reply(
        &self,
        message: impl Into<MessageInput>,
        ephemeral: bool,
    ) -> Result<Delivery> {
        let mut message = message.into().into_message();

        if ephemeral {
            return match self.context.response_url() {
                Some(response_url) => {
                    let response = self.send_to(response_url, &message).await?;
                    Ok(Delivery::Sent(response))
                }
                None => {
                    self.log
                        .error("Can't send a private message without a response_url");
                    Ok(Delivery::Skipped(SkipReason::NoResponseUrl))
                }
            };
        }

        match self.context.resolve_channel() {
            Some(channel) => {
                message.channel = Some(channel.to_string());
                let response = self.send(&message).await?;
                Ok(Delivery::Sent(response))
            }
            None => {
                debug!("No channel in context, reply skipped");
                Ok(Delivery::Skipped(SkipReason::NoChannel))
            }
        }
    }

    /// Ephemeral reply
    pub async fn reply_private(&self, message: impl Into<MessageInput>) -> Result<Delivery> {
        self.reply(message, true).await
    }

    /// Post a message as-is; it must carry its own channel
    pub async fn say(&self, message: impl Into<MessageInput>) -> Result<ApiResponse> {
        let message = message.into().into_message();
        self.send(&message).await
    }

    /// Post a payload to `chat.postMessage`
    pub async fn send<P: Serialize + ?Sized>(&self, payload: &P) -> Result<ApiResponse> {
        self.send_to(Endpoint::default(), payload).await
    }

    /// Post a payload to an API method or an absolute URL
    pub async fn send_to<P: Serialize + ?Sized>(
        &self,
        endpoint: impl Into<Endpoint>,
        payload: &P,
    ) -> Result<ApiResponse> {
        let payload = serde_json::to_value(payload)?;
        self.client.send(&endpoint.into(), &payload).await
    }
}

impl<C: ApiClient> Bot<HttpTransport, C> {
    /// Build the upload request for a file reply without sending it.
    ///
    /// Missing filenames are derived from the path, or from the current time
    /// for content and raw bytes.
    pub fn prepare_upload(&self, file: impl Into<FileInput>) -> FileUpload {
        let mut upload = file.into().into_upload();

        if upload.filename.is_none() {
            let from_path = match &upload.source {
                FileSource::Path(path) => path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned()),
                FileSource::Bytes(_) | FileSource::Content(_) => None,
            };
            upload.filename = Some(from_path.unwrap_or_else(timestamp_filename));
        }

        if let Some(channel) = self.context.resolve_channel() {
            upload.channels = Some(channel.to_string());
        }

        upload
    }

    /// Upload a file to the triggering message's channel
    pub async fn reply_file(&self, file: impl Into<FileInput>) -> Result<ApiResponse> {
        let upload = self.prepare_upload(file);
        self.client.upload(&upload).await
    }

    /// Answer the inbound HTTP request directly
    pub fn data<P: Serialize + ?Sized>(&self, payload: &P) -> Result<()> {
        let payload = serde_json::to_value(payload)?;
        self.transport.sink.send(payload)
    }

    /// Download a private file
    pub async fn get_file(&self, url: &str) -> Result<Vec<u8>> {
        self.client.get(url).await
    }
}

impl<C: ApiClient> Bot<SocketTransport, C> {
    /// Show the typing indicator in the triggering message's channel
    pub async fn typing(&self) -> Result<()> {
        let channel = self.context.resolve_channel().ok_or(BotError::NoChannel)?;

        let frame = TypingFrame {
            id: Utc::now().timestamp_millis(),
            kind: "typing",
            channel,
        };
        let frame = serde_json::to_string(&frame)?;

        info!("Sending typing indicator to {}", channel);
        self.transport.socket.send_frame(frame).await
    }
}

#[derive(Serialize)]
struct TypingFrame<'a> {
    id: i64,
    #[serde(rename = "type")]
    kind: &'static str,
    channel: &'a str,
}

fn timestamp_filename() -> String {
    Utc::now().timestamp_millis().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::StreamExt;
    use futures::channel::mpsc;
    use serde_json::{Value, json};
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    use crate::transport::{ResponseSlot, WsSocket};
    use crate::types::OutgoingMessage;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Send(Endpoint, Value),
        Upload(FileUpload),
        Get(String),
    }

    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<Call>>,
        fail_with: Option<String>,
    }

    impl RecordingClient {
        fn failing(error: &str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_with: Some(error.to_string()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) -> Result<()> {
            self.calls.lock().unwrap().push(call);
            match &self.fail_with {
                Some(error) => Err(BotError::Api(error.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ApiClient for RecordingClient {
        async fn send(&self, endpoint: &Endpoint, payload: &Value) -> Result<ApiResponse> {
            self.record(Call::Send(endpoint.clone(), payload.clone()))?;
            Ok(ApiResponse::acknowledged())
        }

        async fn upload(&self, upload: &FileUpload) -> Result<ApiResponse> {
            self.record(Call::Upload(upload.clone()))?;
            Ok(ApiResponse::acknowledged())
        }

        async fn get(&self, url: &str) -> Result<Vec<u8>> {
            self.record(Call::Get(url.to_string()))?;
            Ok(b"file-bytes".to_vec())
        }
    }

    #[derive(Default)]
    struct RecordingLog {
        errors: Mutex<Vec<String>>,
    }

    impl OperatorLog for RecordingLog {
        fn error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    fn context(value: Value) -> MessageContext {
        serde_json::from_value(value).unwrap()
    }

    fn http_bot(ctx: MessageContext) -> Bot<HttpTransport, RecordingClient> {
        let (slot, _rx) = ResponseSlot::channel();
        Bot::with_client("xoxb-test", RecordingClient::default(), ctx, HttpTransport::new(slot))
    }

    #[tokio::test]
    async fn test_reply_to_channel_id() {
        let bot = http_bot(context(json!({ "channel_id": "C456" })));

        let delivery = bot.reply("hello", false).await.unwrap();

        assert!(delivery.is_sent());
        assert_eq!(
            bot.client().calls(),
            vec![Call::Send(
                Endpoint::Method("chat.postMessage".to_string()),
                json!({ "text": "hello", "channel": "C456" })
            )]
        );
    }

    #[tokio::test]
    async fn test_reply_prefers_channel_object() {
        let bot = http_bot(context(json!({
            "channel": { "id": "C123", "name": "general" },
            "channel_id": "C456"
        })));

        bot.reply("hello", false).await.unwrap();

        assert_eq!(
            bot.client().calls(),
            vec![Call::Send(
                Endpoint::default(),
                json!({ "text": "hello", "channel": "C123" })
            )]
        );
    }

    #[tokio::test]
    async fn test_reply_structured_message_keeps_fields() {
        let bot = http_bot(context(json!({ "channel": "C123" })));
        let message = OutgoingMessage::text("status")
            .with_channel("C999")
            .in_thread("1700000000.000100")
            .with_blocks(vec![json!({ "type": "divider" })]);

        bot.reply(message, false).await.unwrap();

        assert_eq!(
            bot.client().calls(),
            vec![Call::Send(
                Endpoint::default(),
                json!({
                    "text": "status",
                    "channel": "C123",
                    "thread_ts": "1700000000.000100",
                    "blocks": [{ "type": "divider" }]
                })
            )]
        );
    }

    #[tokio::test]
    async fn test_reply_with_error_value() {
        let bot = http_bot(context(json!({ "channel_id": "C1" })));
        let err = std::io::Error::other("permission denied");

        bot.reply(MessageInput::from_error(&err), false).await.unwrap();

        assert_eq!(
            bot.client().calls(),
            vec![Call::Send(
                Endpoint::default(),
                json!({ "text": "permission denied", "channel": "C1" })
            )]
        );
    }

    #[tokio::test]
    async fn test_reply_without_channel_is_skipped() {
        let bot = http_bot(MessageContext::default());

        let delivery = bot.reply("hello", false).await.unwrap();

        assert_eq!(delivery, Delivery::Skipped(SkipReason::NoChannel));
        assert!(bot.client().calls().is_empty());
    }

    #[tokio::test]
    async fn test_ephemeral_reply_uses_response_url() {
        let bot = http_bot(context(json!({
            "channel_id": "C1",
            "response_url": "https://hooks.slack.com/commands/T1/1/abc"
        })));

        let delivery = bot.reply_private("only you").await.unwrap();

        assert!(delivery.is_sent());
        assert_eq!(
            bot.client().calls(),
            vec![Call::Send(
                Endpoint::Url("https://hooks.slack.com/commands/T1/1/abc".to_string()),
                json!({ "text": "only you" })
            )]
        );
    }

    #[tokio::test]
    async fn test_ephemeral_reply_without_response_url() {
        let log = Arc::new(RecordingLog::default());
        let bot = http_bot(context(json!({ "channel_id": "C1" })))
            .with_operator_log(log.clone());

        let delivery = bot.reply("only you", true).await.unwrap();

        assert_eq!(delivery, Delivery::Skipped(SkipReason::NoResponseUrl));
        assert!(delivery.response().is_none());
        assert!(bot.client().calls().is_empty());
        assert_eq!(log.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ephemeral_reply_with_empty_response_url() {
        let log = Arc::new(RecordingLog::default());
        let bot = http_bot(context(json!({ "channel_id": "C1", "response_url": "" })))
            .with_operator_log(log.clone());

        let delivery = bot.reply_private("only you").await.unwrap();

        assert_eq!(delivery, Delivery::Skipped(SkipReason::NoResponseUrl));
        assert!(bot.client().calls().is_empty());
        assert_eq!(log.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_say_sends_unmodified() {
        let bot = http_bot(context(json!({ "channel_id": "C1" })));

        bot.say(OutgoingMessage::text("hi").with_channel("C2")).await.unwrap();
        bot.say("no target").await.unwrap();

        assert_eq!(
            bot.client().calls(),
            vec![
                Call::Send(Endpoint::default(), json!({ "text": "hi", "channel": "C2" })),
                Call::Send(Endpoint::default(), json!({ "text": "no target" })),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_to_method() {
        let bot = http_bot(MessageContext::default());

        bot.send_to("reactions.add", &json!({ "name": "eyes" }))
            .await
            .unwrap();

        assert_eq!(
            bot.client().calls(),
            vec![Call::Send(
                Endpoint::Method("reactions.add".to_string()),
                json!({ "name": "eyes" })
            )]
        );
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let (slot, _rx) = ResponseSlot::channel();
        let bot = Bot::with_client(
            "xoxb-test",
            RecordingClient::failing("ratelimited"),
            MessageContext::for_channel("C1"),
            HttpTransport::new(slot),
        );

        let err = bot.reply("hello", false).await.unwrap_err();
        assert!(matches!(err, BotError::Api(ref e) if e == "ratelimited"));

        let err = bot.reply_file(FileInput::Inline("x".into())).await.unwrap_err();
        assert!(matches!(err, BotError::Api(_)));
    }

    #[test]
    fn test_prepare_upload_inline_content() {
        let bot = http_bot(context(json!({ "channel": { "id": "C123" } })));

        let upload = bot.prepare_upload(FileInput::detect("hello world"));

        assert_eq!(upload.source, FileSource::Content("hello world".to_string()));
        assert_eq!(upload.channels.as_deref(), Some("C123"));
        let filename = upload.filename.unwrap();
        assert!(!filename.is_empty());
        assert!(filename.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_prepare_upload_bytes_and_explicit_name() {
        let bot = http_bot(context(json!({ "channel_id": "C456" })));

        let upload = bot.prepare_upload(vec![1u8, 2, 3]);
        assert_eq!(upload.source, FileSource::Bytes(vec![1, 2, 3]));
        assert!(upload.filename.unwrap().parse::<i64>().is_ok());

        let named = FileUpload::new(FileSource::Bytes(vec![1])).with_filename("chart.png");
        let upload = bot.prepare_upload(named);
        assert_eq!(upload.filename.as_deref(), Some("chart.png"));
        assert_eq!(upload.channels.as_deref(), Some("C456"));
    }

    #[test]
    fn test_prepare_upload_keeps_channels_without_context() {
        let bot = http_bot(MessageContext::default());
        let mut upload = FileUpload::new(FileSource::Content("x".into()));
        upload.channels = Some("C7".to_string());

        assert_eq!(bot.prepare_upload(upload).channels.as_deref(), Some("C7"));
    }

    #[tokio::test]
    async fn test_reply_file_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("real.txt");
        std::fs::write(&path, "contents").unwrap();

        let bot = http_bot(context(json!({ "channel_id": "C456" })));
        bot.reply_file(FileInput::detect(path.to_string_lossy()))
            .await
            .unwrap();

        let mut expected = FileUpload::new(FileSource::Path(path)).with_filename("real.txt");
        expected.channels = Some("C456".to_string());
        assert_eq!(bot.client().calls(), vec![Call::Upload(expected)]);
    }

    #[tokio::test]
    async fn test_data_answers_inbound_request() {
        let (slot, rx) = ResponseSlot::channel();
        let bot = Bot::with_client(
            "xoxb-test",
            RecordingClient::default(),
            MessageContext::default(),
            HttpTransport::new(slot),
        );

        bot.data(&json!({ "response_type": "in_channel", "text": "ack" }))
            .unwrap();

        assert_eq!(
            rx.await.unwrap(),
            json!({ "response_type": "in_channel", "text": "ack" })
        );
        assert!(matches!(bot.data(&json!({})), Err(BotError::ResponseAlreadySent)));
        assert!(bot.client().calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_file_delegates_to_client() {
        let bot = http_bot(MessageContext::default());

        let bytes = bot.get_file("https://files.slack.com/files-pri/T1-F1/a.png").await.unwrap();

        assert_eq!(bytes, b"file-bytes".to_vec());
        assert_eq!(
            bot.client().calls(),
            vec![Call::Get("https://files.slack.com/files-pri/T1-F1/a.png".to_string())]
        );
    }

    #[tokio::test]
    async fn test_typing_sends_one_frame() {
        let (tx, rx) = mpsc::unbounded::<WsMessage>();
        let bot = Bot::with_client(
            "xoxb-test",
            RecordingClient::default(),
            context(json!({ "channel": { "id": "C123" } })),
            SocketTransport::new(WsSocket::new(tx)),
        );

        bot.typing().await.unwrap();
        drop(bot);

        let frames: Vec<WsMessage> = rx.collect().await;
        assert_eq!(frames.len(), 1);

        let WsMessage::Text(text) = &frames[0] else {
            panic!("expected a text frame, got {:?}", frames[0]);
        };
        let frame: Value = serde_json::from_str(text.as_str()).unwrap();
        assert!(frame["id"].is_i64());
        assert_eq!(frame["type"], "typing");
        assert_eq!(frame["channel"], "C123");
    }

    #[tokio::test]
    async fn test_typing_reports_socket_error() {
        let (tx, rx) = mpsc::unbounded::<WsMessage>();
        drop(rx);
        let bot = Bot::with_client(
            "xoxb-test",
            RecordingClient::default(),
            MessageContext::for_channel("C1"),
            SocketTransport::new(WsSocket::new(tx)),
        );

        assert!(matches!(bot.typing().await, Err(BotError::WebSocket(_))));
    }

    #[tokio::test]
    async fn test_typing_without_channel() {
        let (tx, mut rx) = mpsc::unbounded::<WsMessage>();
        let bot = Bot::with_client(
            "xoxb-test",
            RecordingClient::default(),
            MessageContext::default(),
            SocketTransport::new(WsSocket::new(tx)),
        );

        assert!(matches!(bot.typing().await, Err(BotError::NoChannel)));
        drop(bot);
        assert!(rx.next().await.is_none());
    }

    #[test]
    fn test_new_uses_bot_token() {
        let (slot, _rx) = ResponseSlot::channel();
        let mut auth = AuthRecord::bot("xoxb-bot");
        auth.access_token = "xoxp-user".to_string();

        let bot = Bot::new(
            &auth,
            MessageContext::default(),
            HttpTransport::new(slot),
            &BotConfig::default(),
        )
        .unwrap();
        assert_eq!(bot.token(), "xoxb-bot");

        let (slot, _rx) = ResponseSlot::channel();
        let bot = Bot::new(
            &AuthRecord::user("xoxp-user"),
            MessageContext::default(),
            HttpTransport::new(slot),
            &BotConfig::default(),
        )
        .unwrap();
        assert_eq!(bot.token(), "xoxp-user");
    }

    #[test]
    fn test_new_without_token_fails() {
        let (slot, _rx) = ResponseSlot::channel();
        let result = Bot::new(
            &AuthRecord::default(),
            MessageContext::default(),
            HttpTransport::new(slot),
            &BotConfig::default(),
        );
        assert!(matches!(result, Err(BotError::TokenNotConfigured)));
    }

    #[tokio::test]
    async fn test_reply_over_http() {
        use wiremock::matchers::{body_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-bot"))
            .and(body_json(json!({ "text": "deployed", "channel": "C42" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "ts": "1700000000.000200"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = BotConfig::default();
        config.api.base_url = format!("{}/api", server.uri());
        let (slot, _rx) = ResponseSlot::channel();
        let bot = Bot::new(
            &AuthRecord::bot("xoxb-bot"),
            MessageContext::for_channel("C42"),
            HttpTransport::new(slot),
            &config,
        )
        .unwrap();

        let delivery = bot.reply("deployed", false).await.unwrap();
        let response = delivery.response().unwrap();
        assert_eq!(response.data.get("ts"), Some(&json!("1700000000.000200")));
    }
}
