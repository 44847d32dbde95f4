//! HTTP implementation of [`LoungeTransport`].
//!
//! One client serves every configured screen. Each screen gets its own bound
//! session (lounge token, `SID`, `gsessionid`, request counters) and a
//! background long-poll task feeding its [`Subscription`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::codec::Decoder;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::codec::LoungeCodec;
use crate::command::Command;
use crate::error::{LoungeError, Result};
use crate::event::RawEvent;
use crate::transport::{LoungeTransport, SUBSCRIPTION_BUFFER, Subscription};

/// Default lounge API root.
pub const DEFAULT_BASE_URL: &str = "https://www.youtube.com/api/lounge/";

/// Timeout for token, bind and command requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for a single long-poll request.
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Initial receive buffer size for a poll response.
const BUFFER_CAPACITY: usize = 16 * 1024;

/// Configuration for [`LoungeClient`].
#[derive(Debug, Clone)]
pub struct LoungeClientConfig {
    /// Lounge API root, must end with `/`
    pub base_url: String,
    /// Name shown on the screen for this remote
    pub device_name: String,
    /// Stable remote identifier for this process
    pub device_id: String,
}

impl Default for LoungeClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            device_name: "skiptv".to_string(),
            device_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl LoungeClientConfig {
    /// Create a config with the given remote name and a random device id.
    pub fn with_name(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenScreen {
    screen_id: String,
    lounge_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenBatchResponse {
    screens: Vec<TokenScreen>,
}

/// Session identifiers and initial state returned by the bind.
#[derive(Debug, Clone, PartialEq)]
struct BindResponse {
    sid: String,
    gsessionid: String,
    /// Highest array id seen in the bind body
    aid: Option<u64>,
    /// Events describing the current screen state, e.g. `loungeStatus`
    events: Vec<RawEvent>,
}

/// State of one bound screen.
#[derive(Debug)]
struct BoundSession {
    lounge_token: String,
    sid: String,
    gsessionid: String,
    rid: AtomicU64,
    ofs: AtomicU64,
    aid: Mutex<Option<u64>>,
}

impl BoundSession {
    fn aid_param(&self) -> String {
        let aid = *self.aid.lock();
        aid.map_or_else(|| "-1".to_string(), |aid| aid.to_string())
    }
}

/// Shared pieces handed to each poll task.
struct PollContext {
    http: Client,
    bind_url: Url,
    device_name: String,
    screen_id: String,
    session: Arc<BoundSession>,
    sessions: Arc<Mutex<HashMap<String, Arc<BoundSession>>>>,
}

/// Why a single poll request ended.
enum PollEnd {
    /// Response completed normally; poll again
    Eof,
    /// Remote asked to stop the session
    Stopped,
    /// Subscriber is gone
    Closed,
}

/// Lounge client over HTTP.
pub struct LoungeClient {
    http: Client,
    config: LoungeClientConfig,
    base_url: Url,
    tokens: Mutex<HashMap<String, String>>,
    sessions: Arc<Mutex<HashMap<String, Arc<BoundSession>>>>,
}

impl LoungeClient {
    /// Create a new client.
    pub fn new(config: LoungeClientConfig) -> Result<Self> {
        let http = Client::builder().build()?;
        Self::with_http_client(http, config)
    }

    /// Create a client sharing an existing HTTP client.
    pub fn with_http_client(http: Client, config: LoungeClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        Ok(Self {
            http,
            config,
            base_url,
            tokens: Mutex::new(HashMap::new()),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn bind_url(&self) -> Result<Url> {
        Ok(self.base_url.join("bc/bind")?)
    }

    /// Fetch a fresh lounge token for a screen.
    pub async fn fetch_lounge_token(&self, screen_id: &str) -> Result<String> {
        let url = self.base_url.join("pairing/get_lounge_token_batch")?;
        let response = self
            .http
            .post(url)
            .form(&[("screen_ids", screen_id)])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoungeError::HttpStatus {
                status: status.as_u16(),
                endpoint: "get_lounge_token_batch".to_string(),
            });
        }

        let batch: TokenBatchResponse = response.json().await?;
        let token = batch
            .screens
            .into_iter()
            .find(|screen| screen.screen_id == screen_id)
            .map(|screen| screen.lounge_token)
            .ok_or_else(|| LoungeError::protocol(format!("no lounge token for {screen_id}")))?;

        self.tokens
            .lock()
            .insert(screen_id.to_string(), token.clone());
        debug!(screen_id = %screen_id, "Fetched lounge token");
        Ok(token)
    }

    async fn lounge_token(&self, screen_id: &str) -> Result<String> {
        let cached = self.tokens.lock().get(screen_id).cloned();
        match cached {
            Some(token) => Ok(token),
            None => self.fetch_lounge_token(screen_id).await,
        }
    }

    async fn bind(&self, screen_id: &str, lounge_token: &str) -> Result<BindResponse> {
        let params = [
            ("RID", "1"),
            ("VER", "8"),
            ("CVER", "1"),
            ("auth_failure_option", "send_error"),
            ("TYPE", "xmlhttp"),
        ];
        let form = [
            ("app", "web"),
            ("mdx-version", "3"),
            ("name", self.config.device_name.as_str()),
            ("id", self.config.device_id.as_str()),
            ("device", "REMOTE_CONTROL"),
            ("capabilities", "que,dsdtr,atp"),
            ("method", "setPlaylist"),
            ("magnaKey", "cloudPairedDevice"),
            ("ui", "false"),
            ("theme", "cl"),
            ("loungeIdToken", lounge_token),
        ];

        let response = self
            .http
            .post(self.bind_url()?)
            .query(&params)
            .form(&form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoungeError::from_status(status.as_u16(), "bind", screen_id));
        }

        let body = response.bytes().await?;
        parse_bind_body(&body)
    }

    async fn bind_with_refresh(&self, screen_id: &str) -> Result<(String, BindResponse)> {
        let token = self.lounge_token(screen_id).await?;
        match self.bind(screen_id, &token).await {
            Ok(bound) => Ok((token, bound)),
            Err(e) if e.is_token_expired() => {
                info!(screen_id = %screen_id, "Lounge token expired, refreshing");
                let token = self.fetch_lounge_token(screen_id).await?;
                let bound = self.bind(screen_id, &token).await?;
                Ok((token, bound))
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl LoungeTransport for LoungeClient {
    async fn subscribe(&self, screen_id: &str) -> Result<Subscription> {
        let (lounge_token, bound) = self.bind_with_refresh(screen_id).await?;
        info!(
            screen_id = %screen_id,
            sid = %bound.sid,
            initial_events = bound.events.len(),
            "Bound lounge session"
        );

        let session = Arc::new(BoundSession {
            lounge_token,
            sid: bound.sid,
            gsessionid: bound.gsessionid,
            rid: AtomicU64::new(2),
            ofs: AtomicU64::new(0),
            aid: Mutex::new(bound.aid),
        });
        self.sessions
            .lock()
            .insert(screen_id.to_string(), session.clone());

        let ctx = PollContext {
            http: self.http.clone(),
            bind_url: self.bind_url()?,
            device_name: self.config.device_name.clone(),
            screen_id: screen_id.to_string(),
            session,
            sessions: self.sessions.clone(),
        };

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        forward_initial_events(&tx, bound.events, screen_id);
        let task = tokio::spawn(run_poll_loop(ctx, tx));
        Ok(Subscription::new(rx, task))
    }

    async fn send_command(&self, screen_id: &str, command: &Command) -> Result<()> {
        let session = self
            .sessions
            .lock()
            .get(screen_id)
            .cloned()
            .ok_or_else(|| LoungeError::NotConnected(screen_id.to_string()))?;

        let rid = session.rid.fetch_add(1, Ordering::SeqCst).to_string();
        let ofs = session.ofs.fetch_add(1, Ordering::SeqCst);
        let aid = session.aid_param();
        let params = [
            ("SID", session.sid.as_str()),
            ("gsessionid", session.gsessionid.as_str()),
            ("RID", rid.as_str()),
            ("VER", "8"),
            ("v", "2"),
            ("TYPE", "bind"),
            ("t", "1"),
            ("AID", aid.as_str()),
            ("CI", "0"),
            ("name", self.config.device_name.as_str()),
            ("id", self.config.device_id.as_str()),
            ("device", "REMOTE_CONTROL"),
            ("loungeIdToken", session.lounge_token.as_str()),
        ];

        trace!(screen_id = %screen_id, command = %command, "Sending lounge command");
        let response = self
            .http
            .post(self.bind_url()?)
            .query(&params)
            .form(&command.to_form(ofs))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoungeError::from_status(
                status.as_u16(),
                command.name(),
                screen_id,
            ));
        }

        debug!(screen_id = %screen_id, command = %command, "Lounge command sent");
        Ok(())
    }
}

/// Queue the bind response's state events ahead of the first poll.
fn forward_initial_events(tx: &mpsc::Sender<RawEvent>, events: Vec<RawEvent>, screen_id: &str) {
    for event in events {
        if tx.try_send(event).is_err() {
            warn!(screen_id = %screen_id, "Too many events in bind response, dropping the rest");
            break;
        }
    }
}

/// Poll until the session ends or the subscriber goes away.
async fn run_poll_loop(ctx: PollContext, tx: mpsc::Sender<RawEvent>) {
    loop {
        match poll_once(&ctx, &tx).await {
            Ok(PollEnd::Eof) => continue,
            Ok(PollEnd::Stopped) => {
                info!(screen_id = %ctx.screen_id, "Screen closed the lounge session");
                break;
            }
            Ok(PollEnd::Closed) => break,
            Err(e) => {
                warn!(screen_id = %ctx.screen_id, error = %e, "Lounge poll failed");
                break;
            }
        }
    }

    let mut sessions = ctx.sessions.lock();
    if sessions
        .get(&ctx.screen_id)
        .is_some_and(|current| Arc::ptr_eq(current, &ctx.session))
    {
        sessions.remove(&ctx.screen_id);
    }
}

async fn poll_once(ctx: &PollContext, tx: &mpsc::Sender<RawEvent>) -> Result<PollEnd> {
    let session = &ctx.session;
    let aid = session.aid_param();
    let params = [
        ("SID", session.sid.as_str()),
        ("gsessionid", session.gsessionid.as_str()),
        ("RID", "rpc"),
        ("VER", "8"),
        ("v", "2"),
        ("device", "REMOTE_CONTROL"),
        ("app", "youtube-desktop"),
        ("loungeIdToken", session.lounge_token.as_str()),
        ("name", ctx.device_name.as_str()),
        ("CI", "0"),
        ("TYPE", "xmlhttp"),
        ("AID", aid.as_str()),
    ];

    let response = ctx
        .http
        .get(ctx.bind_url.clone())
        .query(&params)
        .timeout(LONG_POLL_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(LoungeError::from_status(
            status.as_u16(),
            "poll",
            &ctx.screen_id,
        ));
    }

    let mut stream = response.bytes_stream();
    let mut codec = LoungeCodec::new();
    let mut buffer = BytesMut::with_capacity(BUFFER_CAPACITY);

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => buffer.extend_from_slice(&chunk),
            Err(e) if e.is_timeout() => {
                debug!(screen_id = %ctx.screen_id, "Long poll timed out, polling again");
                return Ok(PollEnd::Eof);
            }
            Err(e) => return Err(e.into()),
        }

        while let Some(events) = codec.decode(&mut buffer)? {
            if let Some(aid) = codec.last_aid() {
                *session.aid.lock() = Some(aid);
            }
            for event in events {
                match event.name.as_str() {
                    "c" | "S" => continue,
                    "stop" => return Ok(PollEnd::Stopped),
                    _ => {}
                }
                if tx.send(event).await.is_err() {
                    return Ok(PollEnd::Closed);
                }
            }
        }
    }

    Ok(PollEnd::Eof)
}

/// Split an initial bind response into session ids and state events.
fn parse_bind_body(body: &[u8]) -> Result<BindResponse> {
    let mut codec = LoungeCodec::new();
    let mut buffer = BytesMut::from(body);
    let mut sid = None;
    let mut gsessionid = None;
    let mut state_events = Vec::new();

    while let Some(events) = codec.decode(&mut buffer)? {
        for event in events {
            match event.name.as_str() {
                "c" => sid = event.payload.as_str().map(str::to_string),
                "S" => gsessionid = event.payload.as_str().map(str::to_string),
                "stop" | "noop" => {}
                _ => state_events.push(event),
            }
        }
    }

    match (sid, gsessionid) {
        (Some(sid), Some(gsessionid)) => Ok(BindResponse {
            sid,
            gsessionid,
            aid: codec.last_aid(),
            events: state_events,
        }),
        _ => Err(LoungeError::protocol(
            "bind response is missing SID or gsessionid",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(body: &str) -> String {
        format!("{}\n{}", body.len(), body)
    }

    #[test]
    fn test_parse_bind_body() {
        let body = format!(
            "{}{}",
            chunk(r#"[[0,["c","SID-1","",8]],[1,["S","gs-1"]]]"#),
            chunk(r#"[[2,["loungeStatus",{"devices":"[]"}]]]"#),
        );

        let bound = parse_bind_body(body.as_bytes()).unwrap();
        assert_eq!(bound.sid, "SID-1");
        assert_eq!(bound.gsessionid, "gs-1");
    }

    #[test]
    fn test_parse_bind_body_keeps_state_events() {
        let devices = r#"[{\"type\":\"LOUNGE_SCREEN\",\"deviceInfo\":\"{}\"}]"#;
        let body = format!(
            "{}{}",
            chunk(r#"[[0,["c","SID-1","",8]],[1,["S","gs-1"]],[2,["noop"]]]"#),
            chunk(&format!(
                r#"[[3,["loungeStatus",{{"devices":"{devices}"}}]],[4,["nowPlaying",{{}}]]]"#
            )),
        );

        let bound = parse_bind_body(body.as_bytes()).unwrap();
        assert_eq!(bound.aid, Some(4));
        let names: Vec<&str> = bound.events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["loungeStatus", "nowPlaying"]);
        assert_eq!(
            bound.events[0].str_field("devices"),
            Some(r#"[{"type":"LOUNGE_SCREEN","deviceInfo":"{}"}]"#)
        );
    }

    #[tokio::test]
    async fn test_initial_events_reach_subscription_first() {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        forward_initial_events(
            &tx,
            vec![
                RawEvent::new("loungeStatus", serde_json::json!({"devices": "[]"})),
                RawEvent::new("nowPlaying", serde_json::json!({})),
            ],
            "screen",
        );
        tx.send(RawEvent::new("onStateChange", serde_json::json!({})))
            .await
            .unwrap();
        drop(tx);

        let mut subscription = Subscription::from_channel(rx);
        let mut names = Vec::new();
        while let Some(event) = subscription.next().await {
            names.push(event.name);
        }
        assert_eq!(names, vec!["loungeStatus", "nowPlaying", "onStateChange"]);
    }

    #[test]
    fn test_initial_events_beyond_buffer_are_dropped() {
        let (tx, mut rx) = mpsc::channel(2);
        let events = (0..5)
            .map(|i| RawEvent::new(format!("e{i}"), serde_json::Value::Null))
            .collect();
        forward_initial_events(&tx, events, "screen");

        assert_eq!(rx.try_recv().unwrap().name, "e0");
        assert_eq!(rx.try_recv().unwrap().name, "e1");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_parse_bind_body_missing_ids() {
        let body = chunk(r#"[[0,["noop"]]]"#);
        assert!(parse_bind_body(body.as_bytes()).is_err());
    }

    #[test]
    fn test_token_batch_response_shape() {
        let batch: TokenBatchResponse = serde_json::from_str(
            r#"{"screens":[{"screenId":"abc","loungeToken":"tok","expiration":1}]}"#,
        )
        .unwrap();
        assert_eq!(batch.screens[0].screen_id, "abc");
        assert_eq!(batch.screens[0].lounge_token, "tok");
    }

    #[tokio::test]
    async fn test_send_command_without_session() {
        let client = LoungeClient::new(LoungeClientConfig::with_name("test")).unwrap();
        let err = client
            .send_command("screen", &Command::SkipAd)
            .await
            .unwrap_err();
        assert!(matches!(err, LoungeError::NotConnected(_)));
    }
}
