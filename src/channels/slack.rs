//! Slack channel adapter
//!
//! Inbound traffic arrives on the gateway's webhook routes (Events API and
//! interactivity) and is turned into `ChannelEvent`s here. Outbound calls go
//! to the Web API: `chat.postMessage`, `views.open`, `conversations.replies`.

use super::adapter::{AdapterBase, AdapterStatus, ChannelAdapter, ChannelEvent};
use super::message::{
    ActionEvent, ButtonStyle, FormRequest, FormSubmission, InboundMessage, MessageKind,
    OutboundMessage,
};
use crate::config::{resolve_secret, SlackConfig};
use crate::error::{Error, Result};
use crate::records::ThreadMessage;
use async_trait::async_trait;
use regex::Regex;
use ring::hmac;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Maximum age of a signed request, in seconds
const MAX_REQUEST_AGE_SECS: i64 = 300;

/// Replies fetched per thread
const THREAD_FETCH_LIMIT: u32 = 200;

/// Threads remembered as joined before the oldest is forgotten
const MAX_JOINED_THREADS: usize = 10_000;

/// Threads the bot started, replied in, or was mentioned in
#[derive(Default)]
struct JoinedThreads {
    order: VecDeque<String>,
    known: HashSet<String>,
}

impl JoinedThreads {
    fn key(chat_id: &str, thread_ref: &str) -> String {
        format!("{}:{}", chat_id, thread_ref)
    }

    fn join(&mut self, chat_id: &str, thread_ref: &str) {
        let key = Self::key(chat_id, thread_ref);
        if !self.known.insert(key.clone()) {
            return;
        }
        self.order.push_back(key);
        if self.order.len() > MAX_JOINED_THREADS {
            if let Some(oldest) = self.order.pop_front() {
                self.known.remove(&oldest);
            }
        }
    }

    fn contains(&self, chat_id: &str, thread_ref: &str) -> bool {
        self.known.contains(&Self::key(chat_id, thread_ref))
    }
}

/// Slack channel adapter
pub struct SlackAdapter {
    config: SlackConfig,
    bot_token: String,
    signing_secret: String,
    api_base: String,
    http: reqwest::Client,
    mention: Regex,
    base: AdapterBase,
    event_tx: Arc<RwLock<Option<mpsc::Sender<ChannelEvent>>>>,
    threads: Mutex<JoinedThreads>,
    labels: RwLock<HashMap<String, String>>,
}

impl SlackAdapter {
    /// Create an adapter, resolving the token and signing secret from the
    /// environment variables the config names
    pub fn from_env(config: SlackConfig) -> Result<Self> {
        let bot_token = resolve_secret(&config.bot_token_ref).ok_or_else(|| {
            Error::Config(format!("Slack bot token ${} is not set", config.bot_token_ref))
        })?;
        let signing_secret = resolve_secret(&config.signing_secret_ref).ok_or_else(|| {
            Error::Config(format!(
                "Slack signing secret ${} is not set",
                config.signing_secret_ref
            ))
        })?;
        Self::new(config, bot_token, signing_secret)
    }

    /// Create an adapter with explicit credentials
    pub fn new(config: SlackConfig, bot_token: String, signing_secret: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let mention = Regex::new(&format!(r"<@{}(\|[^>]*)?>", regex::escape(&config.bot_user_id)))
            .map_err(|e| Error::Config(format!("Invalid Slack bot user id: {}", e)))?;

        Ok(Self {
            config,
            bot_token,
            signing_secret,
            api_base: SLACK_API_BASE.to_string(),
            http,
            mention,
            base: AdapterBase::new("slack"),
            event_tx: Arc::new(RwLock::new(None)),
            threads: Mutex::new(JoinedThreads::default()),
            labels: RwLock::new(HashMap::new()),
        })
    }

    /// Point Web API calls somewhere else
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Check if a workspace is allowed
    pub fn is_workspace_allowed(&self, workspace_id: &str) -> bool {
        self.config.allowed_workspaces.is_empty()
            || self
                .config
                .allowed_workspaces
                .iter()
                .any(|w| w == workspace_id)
    }

    /// Verify request signature (HMAC-SHA256 with signing_secret)
    /// Slack signs requests with: v0=HMAC-SHA256(signing_secret, "v0:{timestamp}:{body}")
    pub fn verify_signature(
        signing_secret: &str,
        timestamp: &str,
        body: &str,
        expected: &str,
    ) -> bool {
        let sig_basestring = format!("v0:{}:{}", timestamp, body);
        let key = hmac::Key::new(hmac::HMAC_SHA256, signing_secret.as_bytes());
        let Some(digest) = expected.strip_prefix("v0=") else {
            return false;
        };
        match hex::decode(digest) {
            Some(tag) => hmac::verify(&key, sig_basestring.as_bytes(), &tag).is_ok(),
            None => false,
        }
    }

    /// Verify an inbound webhook, including replay protection
    pub fn verify_request(&self, timestamp: &str, body: &str, signature: &str, now: i64) -> bool {
        let Ok(ts) = timestamp.parse::<i64>() else {
            return false;
        };
        if (now - ts).abs() > MAX_REQUEST_AGE_SECS {
            tracing::warn!("Rejecting Slack request with stale timestamp {}", ts);
            return false;
        }
        Self::verify_signature(&self.signing_secret, timestamp, body, signature)
    }

    /// Mark a thread as one the bot takes part in
    pub fn join_thread(&self, chat_id: &str, thread_ref: &str) {
        if let Ok(mut threads) = self.threads.lock() {
            threads.join(chat_id, thread_ref);
        }
    }

    /// Whether the bot started, replied in, or was mentioned in a thread
    pub fn has_joined_thread(&self, chat_id: &str, thread_ref: &str) -> bool {
        self.threads
            .lock()
            .map(|threads| threads.contains(chat_id, thread_ref))
            .unwrap_or(false)
    }

    // =========================================================================
    // Inbound parsing
    // =========================================================================

    /// Parse an Events API `event_callback` body
    pub fn parse_event_callback(&self, body: &Value) -> Option<ChannelEvent> {
        if body["type"] != "event_callback" {
            return None;
        }
        if let Some(team) = body["team_id"].as_str() {
            if !self.is_workspace_allowed(team) {
                tracing::warn!("Ignoring event from workspace {}", team);
                return None;
            }
        }

        let event = &body["event"];
        if event.get("bot_id").is_some() || event.get("subtype").is_some() {
            return None;
        }
        let author_id = event["user"].as_str()?;
        if author_id == self.config.bot_user_id {
            return None;
        }
        let raw_text = event["text"].as_str().unwrap_or("");
        let chat_id = event["channel"].as_str()?;
        let thread_ref = event["thread_ts"].as_str().map(str::to_string);
        let message_ref = event["ts"].as_str().map(str::to_string);

        let kind = match event["type"].as_str()? {
            "app_mention" => {
                if let Some(root) = thread_ref.as_deref().or(message_ref.as_deref()) {
                    self.join_thread(chat_id, root);
                }
                MessageKind::Mention
            }
            "message" if event["channel_type"] == "im" => MessageKind::DirectMessage,
            // Mentions also arrive as app_mention; handle them once
            "message" if !self.mention.is_match(raw_text) => match thread_ref.as_deref() {
                Some(root) if self.has_joined_thread(chat_id, root) => MessageKind::ThreadReply,
                _ => return None,
            },
            _ => return None,
        };

        Some(ChannelEvent::Message(InboundMessage {
            channel: "slack".to_string(),
            kind,
            author_id: author_id.to_string(),
            text: self.mention.replace_all(raw_text, "").trim().to_string(),
            chat_id: chat_id.to_string(),
            chat_label: None,
            thread_ref,
            message_ref,
        }))
    }

    /// Parse a form-encoded interactivity body (`payload=<json>`)
    pub fn parse_interaction_body(&self, body: &str) -> Option<ChannelEvent> {
        let payload = url::form_urlencoded::parse(body.as_bytes())
            .find(|(key, _)| key == "payload")
            .map(|(_, value)| value.into_owned())?;
        match serde_json::from_str::<Value>(&payload) {
            Ok(value) => self.parse_interaction(&value),
            Err(e) => {
                tracing::warn!("Malformed Slack interaction payload: {}", e);
                None
            }
        }
    }

    /// Parse an interactivity payload (`block_actions` or `view_submission`)
    pub fn parse_interaction(&self, payload: &Value) -> Option<ChannelEvent> {
        let actor_id = payload["user"]["id"].as_str()?.to_string();
        match payload["type"].as_str()? {
            "block_actions" => {
                let action = payload["actions"].as_array()?.first()?;
                Some(ChannelEvent::Action(ActionEvent {
                    channel: "slack".to_string(),
                    action_id: action["action_id"].as_str()?.to_string(),
                    actor_id,
                    chat_id: payload["channel"]["id"].as_str().map(str::to_string),
                    trigger_ref: payload["trigger_id"].as_str().map(str::to_string),
                }))
            }
            "view_submission" => {
                let view = &payload["view"];
                let mut fields = HashMap::new();
                if let Some(blocks) = view["state"]["values"].as_object() {
                    for (block_id, actions) in blocks {
                        let value = actions
                            .as_object()
                            .and_then(|a| a.values().next())
                            .and_then(|input| input["value"].as_str())
                            .unwrap_or("");
                        fields.insert(block_id.clone(), value.to_string());
                    }
                }
                Some(ChannelEvent::FormSubmitted(FormSubmission {
                    channel: "slack".to_string(),
                    callback_id: view["callback_id"].as_str()?.to_string(),
                    actor_id,
                    fields,
                }))
            }
            _ => None,
        }
    }

    // =========================================================================
    // Web API
    // =========================================================================

    async fn call(&self, method: &str, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.bearer_auth(&self.bot_token).send().await?;
        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() || body["ok"] != true {
            return Err(Error::Channel(format!(
                "slack {} failed: {}",
                method,
                body["error"].as_str().unwrap_or(status.as_str())
            )));
        }
        Ok(body)
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }
}

/// Block Kit blocks for a message with action buttons
pub fn render_blocks(message: &OutboundMessage) -> Value {
    let mut blocks = vec![json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": message.content },
    })];
    if !message.actions.is_empty() {
        let elements: Vec<Value> = message
            .actions
            .iter()
            .map(|action| {
                let mut button = json!({
                    "type": "button",
                    "action_id": action.action_id,
                    "text": { "type": "plain_text", "text": action.label },
                });
                match action.style {
                    Some(ButtonStyle::Primary) => button["style"] = json!("primary"),
                    Some(ButtonStyle::Danger) => button["style"] = json!("danger"),
                    None => {}
                }
                button
            })
            .collect();
        blocks.push(json!({ "type": "actions", "elements": elements }));
    }
    Value::Array(blocks)
}

/// Modal view for an edit form. Each input block is keyed by field name.
pub fn render_view(form: &FormRequest) -> Value {
    let blocks: Vec<Value> = form
        .fields
        .iter()
        .map(|field| {
            json!({
                "type": "input",
                "block_id": field.name,
                "label": { "type": "plain_text", "text": field.label },
                "element": {
                    "type": "plain_text_input",
                    "action_id": "value",
                    "multiline": field.multiline,
                    "initial_value": field.value,
                },
            })
        })
        .collect();

    json!({
        "type": "modal",
        "callback_id": form.callback_id,
        "title": { "type": "plain_text", "text": form.title },
        "submit": { "type": "plain_text", "text": "Save & approve" },
        "close": { "type": "plain_text", "text": "Cancel" },
        "blocks": blocks,
    })
}

#[async_trait]
impl ChannelAdapter for SlackAdapter {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, event_tx: mpsc::Sender<ChannelEvent>) -> Result<()> {
        self.base.set_status(AdapterStatus::Starting);

        *self.event_tx.write().await = Some(event_tx.clone());

        tracing::info!("Slack adapter starting");

        let _ = event_tx
            .send(ChannelEvent::Connected {
                channel: "slack".to_string(),
            })
            .await;

        self.base.set_status(AdapterStatus::Running);

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.base.set_status(AdapterStatus::Stopping);

        if let Some(tx) = self.event_tx.read().await.as_ref() {
            let _ = tx
                .send(ChannelEvent::Disconnected {
                    channel: "slack".to_string(),
                    reason: "Adapter stopped".to_string(),
                })
                .await;
        }

        *self.event_tx.write().await = None;
        self.base.set_status(AdapterStatus::Stopped);

        tracing::info!("Slack adapter stopped");

        Ok(())
    }

    async fn send_message(&self, message: OutboundMessage) -> Result<String> {
        if !self.base.is_running() {
            return Err(Error::Channel("Slack adapter not running".to_string()));
        }

        let mut payload = json!({
            "channel": message.chat_id,
            "text": message.content,
            "unfurl_links": false,
        });
        if !message.actions.is_empty() {
            payload["blocks"] = render_blocks(&message);
        }
        if let Some(thread_ts) = &message.thread_ref {
            payload["thread_ts"] = json!(thread_ts);
        }

        tracing::debug!("Sending message to Slack channel {}", message.chat_id);

        let body = self
            .call(
                "chat.postMessage",
                self.http.post(self.url("chat.postMessage")).json(&payload),
            )
            .await?;
        let ts = body["ts"].as_str().unwrap_or_default().to_string();
        match message.thread_ref.as_deref() {
            Some(root) => self.join_thread(&message.chat_id, root),
            None if !ts.is_empty() => self.join_thread(&message.chat_id, &ts),
            None => {}
        }
        Ok(ts)
    }

    async fn open_form(
        &self,
        actor_id: &str,
        trigger_ref: Option<&str>,
        form: FormRequest,
    ) -> Result<()> {
        let trigger_id = trigger_ref.ok_or_else(|| {
            Error::Channel(format!("cannot open a Slack form for {} without a trigger", actor_id))
        })?;
        let payload = json!({
            "trigger_id": trigger_id,
            "view": render_view(&form),
        });
        self.call(
            "views.open",
            self.http.post(self.url("views.open")).json(&payload),
        )
        .await?;
        Ok(())
    }

    async fn fetch_thread(&self, chat_id: &str, thread_ref: &str) -> Result<Vec<ThreadMessage>> {
        let limit = THREAD_FETCH_LIMIT.to_string();
        let body = self
            .call(
                "conversations.replies",
                self.http.get(self.url("conversations.replies")).query(&[
                    ("channel", chat_id),
                    ("ts", thread_ref),
                    ("limit", limit.as_str()),
                ]),
            )
            .await?;

        Ok(body["messages"]
            .as_array()
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| {
                        let author = m["user"].as_str().or_else(|| m["bot_id"].as_str())?;
                        Some(ThreadMessage {
                            author_id: author.to_string(),
                            text: m["text"].as_str().unwrap_or_default().to_string(),
                            ts: m["ts"].as_str().map(str::to_string),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn channel_label(&self, chat_id: &str) -> Option<String> {
        if let Some(name) = self.labels.read().await.get(chat_id) {
            return Some(name.clone());
        }
        let body = match self
            .call(
                "conversations.info",
                self.http
                    .get(self.url("conversations.info"))
                    .query(&[("channel", chat_id)]),
            )
            .await
        {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("Could not resolve Slack channel {}: {}", chat_id, e);
                return None;
            }
        };
        let name = body["channel"]["name"].as_str()?.to_string();
        self.labels
            .write()
            .await
            .insert(chat_id.to_string(), name.clone());
        Some(name)
    }

    fn is_connected(&self) -> bool {
        self.base.is_running()
    }
}

/// Hex helpers (avoids adding hex crate dependency)
mod hex {
    pub fn encode(data: &[u8]) -> String {
        data.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
            .collect()
    }
}

/// Sign a body the way Slack does (`v0=<hex>`)
pub fn sign_request(signing_secret: &str, timestamp: &str, body: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, signing_secret.as_bytes());
    let signature = hmac::sign(&key, format!("v0:{}:{}", timestamp, body).as_bytes());
    format!("v0={}", hex::encode(signature.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{FormField, MessageAction};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn create_test_config() -> SlackConfig {
        SlackConfig {
            bot_token_ref: "SLACK_BOT_TOKEN".to_string(),
            signing_secret_ref: "SLACK_SIGNING_SECRET".to_string(),
            bot_user_id: "UBOT".to_string(),
            allowed_workspaces: vec!["T01234567".to_string()],
        }
    }

    fn adapter() -> SlackAdapter {
        SlackAdapter::new(
            create_test_config(),
            "xoxb-test".to_string(),
            "test_signing_secret".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_adapter_creation() {
        let adapter = adapter();
        assert_eq!(adapter.name(), "slack");
        assert!(!adapter.is_connected());
    }

    #[test]
    fn test_workspace_allowed() {
        let adapter = adapter();
        assert!(adapter.is_workspace_allowed("T01234567"));
        assert!(!adapter.is_workspace_allowed("T99999999"));
    }

    #[test]
    fn test_empty_allowed_workspaces() {
        let config = SlackConfig {
            allowed_workspaces: vec![],
            ..create_test_config()
        };
        let adapter = SlackAdapter::new(config, "t".to_string(), "s".to_string()).unwrap();

        assert!(adapter.is_workspace_allowed("any_workspace"));
    }

    #[test]
    fn test_verify_signature() {
        let signing_secret = "test_signing_secret";
        let timestamp = "1531420618";
        let body = r#"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J"#;

        let expected = sign_request(signing_secret, timestamp, body);

        assert!(SlackAdapter::verify_signature(
            signing_secret,
            timestamp,
            body,
            &expected
        ));
        assert!(!SlackAdapter::verify_signature(
            signing_secret,
            timestamp,
            body,
            "v0=wrong"
        ));
        assert!(!SlackAdapter::verify_signature(
            "other_secret",
            timestamp,
            body,
            &expected
        ));
    }

    #[test]
    fn test_verify_request_rejects_stale() {
        let adapter = adapter();
        let body = "{}";
        let signature = sign_request("test_signing_secret", "1000", body);

        assert!(adapter.verify_request("1000", body, &signature, 1100));
        assert!(!adapter.verify_request("1000", body, &signature, 1000 + 301));
        assert!(!adapter.verify_request("nan", body, &signature, 1000));
    }

    #[test]
    fn test_parse_app_mention() {
        let adapter = adapter();
        let body = json!({
            "type": "event_callback",
            "team_id": "T01234567",
            "event": {
                "type": "app_mention",
                "user": "U1",
                "text": "<@UBOT> remember this thread",
                "channel": "C1",
                "ts": "1700000000.000200",
                "thread_ts": "1700000000.000100"
            }
        });

        let Some(ChannelEvent::Message(msg)) = adapter.parse_event_callback(&body) else {
            panic!("expected a message");
        };
        assert_eq!(msg.kind, MessageKind::Mention);
        assert_eq!(msg.text, "remember this thread");
        assert_eq!(msg.chat_id, "C1");
        assert_eq!(msg.thread_ref.as_deref(), Some("1700000000.000100"));
    }

    #[test]
    fn test_parse_direct_message() {
        let adapter = adapter();
        let body = json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "channel_type": "im",
                "user": "U1",
                "text": "CES booth confirmed",
                "channel": "D1",
                "ts": "1.0"
            }
        });
        let Some(ChannelEvent::Message(msg)) = adapter.parse_event_callback(&body) else {
            panic!("expected a message");
        };
        assert_eq!(msg.kind, MessageKind::DirectMessage);
    }

    #[test]
    fn test_ignored_events() {
        let adapter = adapter();
        let from_bot = json!({
            "type": "event_callback",
            "event": {"type": "message", "channel_type": "im", "user": "UBOT", "text": "hi", "channel": "D1"}
        });
        let edited = json!({
            "type": "event_callback",
            "event": {"type": "message", "subtype": "message_changed", "channel": "C1"}
        });
        let channel_chatter = json!({
            "type": "event_callback",
            "event": {"type": "message", "channel_type": "channel", "user": "U1", "text": "hi", "channel": "C1"}
        });
        let duplicate_mention = json!({
            "type": "event_callback",
            "event": {"type": "message", "user": "U1", "text": "<@UBOT> hi", "channel": "C1", "thread_ts": "1.0"}
        });
        let other_workspace = json!({
            "type": "event_callback",
            "team_id": "T99999999",
            "event": {"type": "app_mention", "user": "U1", "text": "hi", "channel": "C1"}
        });
        let foreign_thread_reply = json!({
            "type": "event_callback",
            "event": {"type": "message", "channel_type": "channel", "user": "U7", "text": "lol see you at lunch", "channel": "C9", "thread_ts": "1.0"}
        });

        for body in [
            from_bot,
            edited,
            channel_chatter,
            duplicate_mention,
            other_workspace,
            foreign_thread_reply,
        ] {
            assert!(adapter.parse_event_callback(&body).is_none(), "{body}");
        }
    }

    fn thread_reply(chat_id: &str, thread_ts: &str) -> Value {
        json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "channel_type": "channel",
                "user": "U7",
                "text": "Budget is approved too",
                "channel": chat_id,
                "ts": "1700000009.000100",
                "thread_ts": thread_ts
            }
        })
    }

    #[test]
    fn test_reply_after_mention_is_thread_reply() {
        let adapter = adapter();
        assert!(adapter
            .parse_event_callback(&thread_reply("C1", "1700000000.000100"))
            .is_none());

        let mention = json!({
            "type": "event_callback",
            "event": {
                "type": "app_mention",
                "user": "U1",
                "text": "<@UBOT> what's new?",
                "channel": "C1",
                "ts": "1700000000.000100"
            }
        });
        assert!(adapter.parse_event_callback(&mention).is_some());

        let Some(ChannelEvent::Message(msg)) =
            adapter.parse_event_callback(&thread_reply("C1", "1700000000.000100"))
        else {
            panic!("expected a thread reply");
        };
        assert_eq!(msg.kind, MessageKind::ThreadReply);
        assert_eq!(msg.text, "Budget is approved too");

        // Same thread timestamp in another channel is a different thread
        assert!(adapter
            .parse_event_callback(&thread_reply("C2", "1700000000.000100"))
            .is_none());
    }

    async fn mock_web_api() -> (String, Arc<AtomicUsize>) {
        use axum::routing::{get, post};
        use axum::{Json, Router};

        let info_calls = Arc::new(AtomicUsize::new(0));
        let counter = info_calls.clone();
        let app = Router::new()
            .route(
                "/chat.postMessage",
                post(|| async { Json(json!({"ok": true, "ts": "1700000001.000100"})) }),
            )
            .route(
                "/conversations.info",
                get(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Json(json!({"ok": true, "channel": {"id": "C1", "name": "launch"}}))
                    }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), info_calls)
    }

    #[tokio::test]
    async fn test_bot_post_joins_thread() {
        let (api, _) = mock_web_api().await;
        let adapter = adapter().with_api_base(api);
        let (tx, _rx) = mpsc::channel(4);
        adapter.start(tx).await.unwrap();

        let ts = adapter
            .send_message(OutboundMessage::new("C9", "Reminder: launch review at 3pm"))
            .await
            .unwrap();
        assert_eq!(ts, "1700000001.000100");

        let Some(ChannelEvent::Message(msg)) =
            adapter.parse_event_callback(&thread_reply("C9", &ts))
        else {
            panic!("expected a thread reply");
        };
        assert_eq!(msg.kind, MessageKind::ThreadReply);

        adapter
            .send_message(
                OutboundMessage::new("C9", "Noted").in_thread(Some("1699999000.000100".to_string())),
            )
            .await
            .unwrap();
        assert!(adapter.has_joined_thread("C9", "1699999000.000100"));
    }

    #[tokio::test]
    async fn test_channel_label_is_resolved_once() {
        let (api, info_calls) = mock_web_api().await;
        let adapter = adapter().with_api_base(api);

        assert_eq!(adapter.channel_label("C1").await.as_deref(), Some("launch"));
        assert_eq!(adapter.channel_label("C1").await.as_deref(), Some("launch"));
        assert_eq!(info_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_channel_label_unavailable() {
        let adapter = adapter().with_api_base("http://127.0.0.1:9");
        assert!(adapter.channel_label("C1").await.is_none());
    }

    #[test]
    fn test_parse_block_action() {
        let adapter = adapter();
        let payload = json!({
            "type": "block_actions",
            "user": {"id": "U_REVIEWER"},
            "trigger_id": "trig-1",
            "channel": {"id": "D9"},
            "actions": [{"action_id": "approve_update_abc", "value": "x"}]
        });
        let Some(ChannelEvent::Action(action)) = adapter.parse_interaction(&payload) else {
            panic!("expected an action");
        };
        assert_eq!(action.action_id, "approve_update_abc");
        assert_eq!(action.actor_id, "U_REVIEWER");
        assert_eq!(action.trigger_ref.as_deref(), Some("trig-1"));
    }

    #[test]
    fn test_parse_view_submission_from_form_body() {
        let adapter = adapter();
        let payload = json!({
            "type": "view_submission",
            "user": {"id": "U_REVIEWER"},
            "view": {
                "callback_id": "edit_update_abc",
                "state": {"values": {
                    "target": {"value": {"type": "plain_text_input", "value": "Acme"}},
                    "value": {"value": {"type": "plain_text_input", "value": "signed & sealed"}}
                }}
            }
        });
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("payload", &payload.to_string())
            .finish();

        let Some(ChannelEvent::FormSubmitted(form)) = adapter.parse_interaction_body(&body) else {
            panic!("expected a form submission");
        };
        assert_eq!(form.callback_id, "edit_update_abc");
        assert_eq!(form.fields.get("target").map(String::as_str), Some("Acme"));
        assert_eq!(
            form.fields.get("value").map(String::as_str),
            Some("signed & sealed")
        );
        assert!(adapter.parse_interaction_body("payload=not-json").is_none());
        assert!(adapter.parse_interaction_body("other=1").is_none());
    }

    #[test]
    fn test_render_blocks_with_buttons() {
        let message = OutboundMessage::new("U_REVIEWER", "*Review*").with_actions(vec![
            MessageAction {
                action_id: "approve_update_abc".to_string(),
                label: "Approve".to_string(),
                style: Some(ButtonStyle::Primary),
            },
            MessageAction {
                action_id: "edit_update_abc".to_string(),
                label: "Edit".to_string(),
                style: None,
            },
        ]);
        let blocks = render_blocks(&message);
        assert_eq!(blocks[0]["text"]["text"], "*Review*");
        assert_eq!(blocks[1]["elements"][0]["style"], "primary");
        assert_eq!(blocks[1]["elements"][1]["action_id"], "edit_update_abc");
        assert!(blocks[1]["elements"][1].get("style").is_none());
    }

    #[test]
    fn test_render_view() {
        let view = render_view(&FormRequest {
            callback_id: "edit_memory_xyz".to_string(),
            title: "Edit memories".to_string(),
            fields: vec![FormField {
                name: "memories".to_string(),
                label: "Memories".to_string(),
                value: "fact | x |  | ".to_string(),
                multiline: true,
            }],
        });
        assert_eq!(view["callback_id"], "edit_memory_xyz");
        assert_eq!(view["blocks"][0]["block_id"], "memories");
        assert_eq!(view["blocks"][0]["element"]["multiline"], true);
    }

    #[tokio::test]
    async fn test_send_requires_running() {
        let adapter = adapter();
        let result = adapter.send_message(OutboundMessage::new("C1", "hi")).await;
        assert!(matches!(result, Err(Error::Channel(_))));
    }

    #[tokio::test]
    async fn test_open_form_requires_trigger() {
        let adapter = adapter();
        let form = FormRequest {
            callback_id: "edit_update_abc".to_string(),
            title: "Edit".to_string(),
            fields: vec![],
        };
        assert!(adapter.open_form("U1", None, form).await.is_err());
    }

    #[tokio::test]
    async fn test_adapter_lifecycle() {
        let adapter = adapter();
        let (tx, mut rx) = mpsc::channel(10);

        adapter.start(tx).await.unwrap();
        assert!(adapter.is_connected());

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ChannelEvent::Connected { .. }));

        adapter.stop().await.unwrap();
        assert!(!adapter.is_connected());
    }
}
