use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use modgate_common::GatewayConfig;
use modgate_protocol::openai::types::ChatCompletionRequest;
use modgate_provider_core::{
    ByteStream, GateResult, ModerationPolicy, UpstreamBody, UpstreamFailure,
    UpstreamHttpResponse, build_moderation_request, build_relay_body, build_relay_request,
    enforce_verdict, interpret_verdict, relay_log_summary,
};

use crate::upstream_client::UpstreamClient;

/// What the relay produced once the gate let the request through.
#[derive(Debug)]
pub enum RelayOutcome {
    /// Buffered reply. A body that is not JSON is carried as a JSON string.
    Json(JsonValue),
    /// Live body, forwarded byte for byte.
    Stream(ByteStream),
}

/// Runs the two upstream calls for one request: moderation, then relay.
#[derive(Clone)]
pub struct GateEngine {
    config: Arc<GatewayConfig>,
    policy: ModerationPolicy,
    client: Arc<dyn UpstreamClient>,
}

impl GateEngine {
    pub fn new(config: Arc<GatewayConfig>, client: Arc<dyn UpstreamClient>) -> Self {
        Self {
            config,
            policy: ModerationPolicy::default(),
            client,
        }
    }

    pub fn with_policy(mut self, policy: ModerationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Moderation must come back clear before the relay is attempted.
    pub async fn run(
        &self,
        request: &ChatCompletionRequest,
        trace_id: &str,
    ) -> GateResult<RelayOutcome> {
        self.moderate(request, trace_id).await?;
        self.relay(request, trace_id).await
    }

    pub async fn moderate(
        &self,
        request: &ChatCompletionRequest,
        trace_id: &str,
    ) -> GateResult<()> {
        let upstream = build_moderation_request(
            &self.config.moderation,
            &self.policy,
            &self.config.moderation_model,
            request,
        )?;
        debug!(
            event = "moderation_request",
            trace_id = %trace_id,
            url = %upstream.url,
            model = %self.config.moderation_model,
            messages = request.messages.len(),
        );

        let resp = self.client.send(upstream).await?;
        let status = resp.status;
        let body = success_body(resp).await?;
        let verdict = interpret_verdict(&body).inspect_err(|err| {
            warn!(
                event = "moderation_verdict",
                trace_id = %trace_id,
                status,
                error = %err,
            );
        })?;
        info!(
            event = "moderation_verdict",
            trace_id = %trace_id,
            status,
            is_violation = verdict.is_violation,
        );
        enforce_verdict(verdict)
    }

    pub async fn relay(
        &self,
        request: &ChatCompletionRequest,
        trace_id: &str,
    ) -> GateResult<RelayOutcome> {
        let summary = relay_log_summary(&build_relay_body(request));
        let upstream = build_relay_request(&self.config.relay, request)?;
        let is_stream = upstream.is_stream;
        debug!(
            event = "relay_request",
            trace_id = %trace_id,
            url = %upstream.url,
            stream = is_stream,
            body = %summary,
        );

        let resp = self.client.send(upstream).await?;
        if !is_success(resp.status) {
            return Err(http_failure(resp).await.into());
        }

        if is_stream {
            return Ok(RelayOutcome::Stream(into_stream(resp.body)));
        }
        let body = collect_body(resp.body).await?;
        Ok(RelayOutcome::Json(buffered_json(&body)))
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

async fn success_body(resp: UpstreamHttpResponse) -> Result<Bytes, UpstreamFailure> {
    if !is_success(resp.status) {
        return Err(http_failure(resp).await);
    }
    collect_body(resp.body).await
}

async fn http_failure(resp: UpstreamHttpResponse) -> UpstreamFailure {
    let body = match collect_body(resp.body).await {
        Ok(body) => body,
        Err(err) => {
            warn!(
                event = "upstream_error_body_unreadable",
                status = resp.status,
                error = %err,
            );
            Bytes::new()
        }
    };
    UpstreamFailure::Http {
        status: resp.status,
        headers: resp.headers,
        body,
    }
}

async fn collect_body(body: UpstreamBody) -> Result<Bytes, UpstreamFailure> {
    match body {
        UpstreamBody::Bytes(bytes) => Ok(bytes),
        UpstreamBody::Stream(mut rx) => {
            let mut buf = BytesMut::new();
            while let Some(chunk) = rx.recv().await {
                buf.extend_from_slice(&chunk?);
            }
            Ok(buf.freeze())
        }
    }
}

/// An upstream that ignored `stream: true` still gets relayed as one chunk.
fn into_stream(body: UpstreamBody) -> ByteStream {
    match body {
        UpstreamBody::Stream(rx) => rx,
        UpstreamBody::Bytes(bytes) => {
            let (tx, rx) = tokio::sync::mpsc::channel(1);
            if !bytes.is_empty() {
                let _ = tx.try_send(Ok(bytes));
            }
            rx
        }
    }
}

fn buffered_json(body: &[u8]) -> JsonValue {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(body).into_owned()))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use modgate_common::ProviderConfig;
    use modgate_provider_core::{
        GateError, ReservedCode, UpstreamHttpRequest, UpstreamTransportErrorKind,
    };
    use serde_json::json;

    use super::*;

    type Reply = Result<UpstreamHttpResponse, UpstreamFailure>;

    #[derive(Default)]
    struct ScriptedClient {
        replies: Mutex<VecDeque<Reply>>,
        seen: Mutex<Vec<UpstreamHttpRequest>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::default(),
            })
        }

        fn urls(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|req| req.url.clone())
                .collect()
        }
    }

    impl UpstreamClient for ScriptedClient {
        fn send<'a>(
            &'a self,
            req: UpstreamHttpRequest,
        ) -> Pin<Box<dyn Future<Output = Reply> + Send + 'a>> {
            self.seen.lock().unwrap().push(req);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected upstream call");
            Box::pin(async move { reply })
        }
    }

    fn config() -> Arc<GatewayConfig> {
        Arc::new(GatewayConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            auth_key: "k".to_string(),
            moderation: ProviderConfig {
                base_url: "http://mod".to_string(),
                api_key: "mk".to_string(),
                timeout_ms: 45_000,
            },
            moderation_model: "guard".to_string(),
            relay: ProviderConfig {
                base_url: "http://relay".to_string(),
                api_key: "rk".to_string(),
                timeout_ms: 60_000,
            },
            proxy: None,
        })
    }

    fn reply(status: u16, body: JsonValue) -> Reply {
        Ok(UpstreamHttpResponse {
            status,
            headers: Vec::new(),
            body: UpstreamBody::Bytes(Bytes::from(serde_json::to_vec(&body).unwrap())),
        })
    }

    fn verdict(is_violation: bool) -> Reply {
        let content = json!({"isViolation": is_violation}).to_string();
        reply(200, json!({"choices": [{"message": {"content": content}}]}))
    }

    fn request(stream: bool) -> ChatCompletionRequest {
        serde_json::from_value(json!({
            "model": "m",
            "stream": stream,
            "messages": [{"role": "user", "content": "hello"}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn violation_stops_before_relay() {
        let client = ScriptedClient::new(vec![verdict(true)]);
        let engine = GateEngine::new(config(), client.clone());

        let err = engine.run(&request(false), "t").await.unwrap_err();
        assert!(matches!(
            err,
            GateError::Rejected(ReservedCode::ContentViolation)
        ));
        assert_eq!(client.urls(), vec!["http://mod/v1/chat/completions"]);
    }

    #[tokio::test]
    async fn clear_verdict_relays_in_order() {
        let client = ScriptedClient::new(vec![
            verdict(false),
            reply(200, json!({"id": "r1", "choices": []})),
        ]);
        let engine = GateEngine::new(config(), client.clone());

        let outcome = engine.run(&request(false), "t").await.unwrap();
        let RelayOutcome::Json(value) = outcome else {
            panic!("expected buffered outcome");
        };
        assert_eq!(value, json!({"id": "r1", "choices": []}));
        assert_eq!(
            client.urls(),
            vec![
                "http://mod/v1/chat/completions",
                "http://relay/v1/chat/completions"
            ]
        );
    }

    #[tokio::test]
    async fn unreadable_verdict_never_relays() {
        let client = ScriptedClient::new(vec![reply(
            200,
            json!({"choices": [{"message": {"content": "not json"}}]}),
        )]);
        let engine = GateEngine::new(config(), client.clone());

        let err = engine.run(&request(true), "t").await.unwrap_err();
        assert!(matches!(err, GateError::InvalidModerationResponse(_)));
        assert_eq!(client.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn moderation_http_error_keeps_payload() {
        let client = ScriptedClient::new(vec![reply(
            429,
            json!({"error": {"message": "slow down", "type": "rate_limit"}}),
        )]);
        let engine = GateEngine::new(config(), client.clone());

        let err = engine.run(&request(false), "t").await.unwrap_err();
        let GateError::Upstream(UpstreamFailure::Http { status, body, .. }) = err else {
            panic!("expected http failure");
        };
        assert_eq!(status, 429);
        assert!(String::from_utf8_lossy(&body).contains("slow down"));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_upstream_error() {
        let client = ScriptedClient::new(vec![Err(UpstreamFailure::Transport {
            kind: UpstreamTransportErrorKind::Connect,
            message: "refused".to_string(),
        })]);
        let engine = GateEngine::new(config(), client);

        let err = engine.run(&request(false), "t").await.unwrap_err();
        assert!(matches!(
            err,
            GateError::Upstream(UpstreamFailure::Transport {
                kind: UpstreamTransportErrorKind::Connect,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn non_json_relay_body_becomes_string() {
        let client = ScriptedClient::new(vec![
            verdict(false),
            Ok(UpstreamHttpResponse {
                status: 200,
                headers: Vec::new(),
                body: UpstreamBody::Bytes(Bytes::from_static(b"plain text")),
            }),
        ]);
        let engine = GateEngine::new(config(), client);

        let RelayOutcome::Json(value) = engine.run(&request(false), "t").await.unwrap() else {
            panic!("expected buffered outcome");
        };
        assert_eq!(value, JsonValue::String("plain text".to_string()));
    }

    #[tokio::test]
    async fn custom_policy_frames_moderation_messages() {
        let client = ScriptedClient::new(vec![verdict(false), reply(200, json!({"id": "r"}))]);
        let engine = GateEngine::new(config(), client.clone()).with_policy(ModerationPolicy {
            system_prompt: "house rules",
            directive: "judge it",
        });

        engine.run(&request(false), "t").await.unwrap();

        let seen = client.seen.lock().unwrap();
        let body: JsonValue = serde_json::from_slice(&seen[0].body).unwrap();
        assert_eq!(body["model"], "guard");
        assert_eq!(
            body["messages"],
            json!([
                {"role": "system", "content": "house rules"},
                {"role": "user", "content": "hello"},
                {"role": "user", "content": "judge it"}
            ])
        );
    }

    #[tokio::test]
    async fn unreadable_error_body_keeps_status() {
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        tx.send(Ok(Bytes::from_static(b"{\"error\""))).await.unwrap();
        tx.send(Err(UpstreamFailure::Transport {
            kind: UpstreamTransportErrorKind::Other,
            message: "connection closed".to_string(),
        }))
        .await
        .unwrap();
        drop(tx);
        let client = ScriptedClient::new(vec![Ok(UpstreamHttpResponse {
            status: 502,
            headers: Vec::new(),
            body: UpstreamBody::Stream(rx),
        })]);
        let engine = GateEngine::new(config(), client);

        let err = engine.run(&request(false), "t").await.unwrap_err();
        let GateError::Upstream(UpstreamFailure::Http { status, body, .. }) = err else {
            panic!("expected http failure");
        };
        assert_eq!(status, 502);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn buffered_upstream_body_still_streams() {
        let client = ScriptedClient::new(vec![
            verdict(false),
            Ok(UpstreamHttpResponse {
                status: 200,
                headers: Vec::new(),
                body: UpstreamBody::Bytes(Bytes::from_static(b"data: x\n\n")),
            }),
        ]);
        let engine = GateEngine::new(config(), client.clone());

        let RelayOutcome::Stream(mut rx) = engine.run(&request(true), "t").await.unwrap() else {
            panic!("expected stream outcome");
        };
        assert_eq!(rx.recv().await.unwrap().unwrap(), Bytes::from_static(b"data: x\n\n"));
        assert!(rx.recv().await.is_none());

        let seen = client.seen.lock().unwrap();
        assert!(!seen[0].is_stream);
        assert!(seen[1].is_stream);
    }
}
