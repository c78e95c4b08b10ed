use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};

use axum::{extract::Request, http::HeaderMap, response::Response};
use opentelemetry::propagation::Extractor;
use std::future::Future;
use tower::{Layer, Service};
use tracing::{Instrument, debug, info, span, warn};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::discovery::request_authority;

tokio::task_local! {
    pub static REQUEST_CONTEXT: RequestContext;
}

/// What the current request was addressed to, available to log macros
/// anywhere below the layer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub endpoint: String,
    pub host: String,
    pub method: String,
}

pub fn with_request_info<F, R>(f: F) -> R
where
    F: Fn(&RequestContext) -> R,
{
    REQUEST_CONTEXT.try_with(|r| f(r)).unwrap_or_else(|_| {
        static DEFAULT_CTX: RequestContext = RequestContext {
            endpoint: String::new(),
            host: String::new(),
            method: String::new(),
        };
        f(&DEFAULT_CTX)
    })
}

pub struct HeaderExtractor<'a> {
    headers: &'a HeaderMap,
}

impl<'a> Extractor for HeaderExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .get(key)
            .and_then(|header| header.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(|h| h.as_str()).collect()
    }
}

/// Opens a `request` span per request (continuing an incoming W3C
/// `traceparent` when there is one), scopes a [`RequestContext`] over the
/// inner service and logs one line per finished request.
#[derive(Debug, Clone)]
pub struct RequestContextService<S> {
    inner: S,
    trust_forwarded_host: bool,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestContextService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    // Boxed because `.instrument()` and the task-local scope change the
    // future's type away from S::Future.
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let parent_context = opentelemetry::global::get_text_map_propagator(|propagator| {
            propagator.extract(&HeaderExtractor {
                headers: req.headers(),
            })
        });

        let ctx = RequestContext {
            endpoint: req.uri().path().to_string(),
            host: request_authority(req.headers(), req.uri(), self.trust_forwarded_host)
                .unwrap_or_default(),
            method: req.method().to_string(),
        };

        let request_span = span!(
            tracing::Level::INFO,
            "request",
            http.method = %ctx.method,
            http.route = %ctx.endpoint,
        );

        if let Err(err) = request_span.set_parent(parent_context) {
            warn!(
                error = debug(err),
                "unable to set otel parent, span will be new instead"
            );
        } else {
            debug!(
                traceparent = ?req.headers().get("traceparent"),
                "trace parent set"
            )
        }

        let started = Instant::now();
        let fut = self.inner.call(req);
        Box::pin(async move {
            REQUEST_CONTEXT
                .scope(ctx, async move {
                    let response: Result<Self::Response, Self::Error> =
                        fut.instrument(request_span).await;

                    if let Ok(ref res) = response {
                        let status = res.status();
                        with_request_info(|ctx| {
                            info!(
                                endpoint = %ctx.endpoint,
                                host = %ctx.host,
                                httpMethod = %ctx.method,
                                status = %status.as_u16(),
                                latency_ms = started.elapsed().as_millis() as u64,
                                "request to {} finished",
                                ctx.endpoint
                            );
                        });
                    }

                    response
                })
                .await
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestContextLayer {
    trust_forwarded_host: bool,
}

impl RequestContextLayer {
    pub fn new(trust_forwarded_host: bool) -> Self {
        RequestContextLayer {
            trust_forwarded_host,
        }
    }
}

impl<S> Layer<S> for RequestContextLayer {
    type Service = RequestContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContextService {
            inner,
            trust_forwarded_host: self.trust_forwarded_host,
        }
    }
}
