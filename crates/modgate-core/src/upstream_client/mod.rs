use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::time::{Instant, timeout, timeout_at};
use wreq::{Client, Proxy};

use modgate_common::GatewayConfig;
use modgate_provider_core::{
    Headers, UpstreamBody, UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse,
    UpstreamTransportErrorKind as Kind,
};

pub trait UpstreamClient: Send + Sync {
    fn send<'a>(
        &'a self,
        req: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>>;
}

#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub proxy: Option<String>,
    pub connect_timeout: Duration,
    /// Longest gap between two chunks of a streamed body.
    pub stream_idle_timeout: Duration,
}

impl UpstreamClientConfig {
    pub fn from_gateway(config: &GatewayConfig) -> Self {
        Self {
            proxy: config.proxy.clone(),
            ..Self::default()
        }
    }
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            connect_timeout: Duration::from_secs(5),
            stream_idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Shared HTTP client for both providers. Each request carries its own
/// deadline, so the moderation and relay timeouts stay independent.
#[derive(Clone)]
pub struct WreqUpstreamClient {
    config: UpstreamClientConfig,
    client: Client,
}

impl WreqUpstreamClient {
    pub fn new(config: UpstreamClientConfig) -> Result<Self, wreq::Error> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }
}

fn build_client(config: &UpstreamClientConfig) -> Result<Client, wreq::Error> {
    let mut builder = Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.stream_idle_timeout);

    if let Some(proxy) = config.proxy.as_deref() {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

impl UpstreamClient for WreqUpstreamClient {
    fn send<'a>(
        &'a self,
        req: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>>
    {
        Box::pin(async move {
            let deadline = Instant::now() + req.timeout;
            let mut builder = self.client.post(&req.url);
            for (k, v) in &req.headers {
                builder = builder.header(k, v);
            }
            builder = builder.body(req.body);

            let resp = timeout_at(deadline, builder.send())
                .await
                .map_err(|_| deadline_exceeded(req.timeout))?
                .map_err(map_wreq_error)?;
            convert_response(
                resp,
                req.is_stream,
                deadline,
                req.timeout,
                self.config.stream_idle_timeout,
            )
            .await
        })
    }
}

async fn convert_response(
    resp: wreq::Response,
    want_stream: bool,
    deadline: Instant,
    limit: Duration,
    stream_idle_timeout: Duration,
) -> Result<UpstreamHttpResponse, UpstreamFailure> {
    let status = resp.status().as_u16();
    let headers = headers_from_wreq(resp.headers());

    let is_success = (200..300).contains(&status);
    if !is_success || !want_stream {
        let body = timeout_at(deadline, resp.bytes())
            .await
            .map_err(|_| deadline_exceeded(limit))?
            .map_err(map_wreq_error)?;
        return Ok(UpstreamHttpResponse {
            status,
            headers,
            body: UpstreamBody::Bytes(body),
        });
    }

    // The deadline covers the response head only; a live stream is bounded
    // by the idle timeout instead.
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, UpstreamFailure>>(16);
    tokio::spawn(async move {
        let mut stream = resp.bytes_stream();
        loop {
            let item = match timeout(stream_idle_timeout, stream.next()).await {
                Ok(item) => item,
                Err(_) => {
                    let _ = tx
                        .send(Err(UpstreamFailure::Transport {
                            kind: Kind::ReadTimeout,
                            message: format!(
                                "upstream stream idle for {}ms",
                                stream_idle_timeout.as_millis()
                            ),
                        }))
                        .await;
                    break;
                }
            };
            let Some(item) = item else {
                break;
            };
            let item = item.map_err(map_wreq_error);
            let failed = item.is_err();
            if tx.send(item).await.is_err() || failed {
                break;
            }
        }
    });

    Ok(UpstreamHttpResponse {
        status,
        headers,
        body: UpstreamBody::Stream(rx),
    })
}

fn deadline_exceeded(limit: Duration) -> UpstreamFailure {
    UpstreamFailure::Transport {
        kind: Kind::Timeout,
        message: format!("timeout of {}ms exceeded", limit.as_millis()),
    }
}

fn headers_from_wreq(map: &wreq::header::HeaderMap) -> Headers {
    map.iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn map_wreq_error(err: wreq::Error) -> UpstreamFailure {
    UpstreamFailure::Transport {
        kind: classify_wreq_error(&err),
        message: err.to_string(),
    }
}

/// Connect, Timeout and ReadTimeout are what callers see as "unavailable".
fn classify_wreq_error(err: &wreq::Error) -> Kind {
    let text = err.to_string().to_ascii_lowercase();
    let mentions = |needles: &[&str]| needles.iter().any(|needle| text.contains(needle));

    if err.is_timeout() {
        return if mentions(&["read", "idle"]) {
            Kind::ReadTimeout
        } else {
            Kind::Timeout
        };
    }
    let is_tls = mentions(&["tls", "ssl", "certificate"]);
    if err.is_connect() && mentions(&["dns", "resolve"]) {
        Kind::Dns
    } else if (err.is_connect() && !is_tls) || err.is_connection_reset() {
        Kind::Connect
    } else if is_tls {
        Kind::Tls
    } else {
        Kind::Other
    }
}
