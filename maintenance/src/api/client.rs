//! Rate-limit aware request/response exchange.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::envelope::{ApiError, ApiResponseEnvelope, ErrorKind, UnparseableBody};
use super::retry::RetryPolicy;
use super::transport::{RawResponse, SignedRequest, Transport};
use crate::error::ConfigurationError;

/// One outbound call of a retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiAttempt {
    /// 1-based.
    pub number: u32,
    /// Sleep that preceded this attempt; zero for the first.
    pub backoff: Duration,
    pub request: SignedRequest,
}

/// Result of [`ResilientApiClient::execute_recorded`].
#[derive(Debug)]
pub struct Execution<P> {
    pub result: Result<P, ApiError>,
    pub attempts: Vec<ApiAttempt>,
}

enum Retryable {
    RateLimited(Vec<String>),
    Transport(String),
}

enum Step<P> {
    Finished(Result<P, ApiError>),
    Retry(Retryable),
}

/// Sends signed requests and retries rate-limited or unreachable calls.
///
/// Rate-limit envelopes and transport failures are retried with exponential
/// backoff up to [`RetryPolicy::max_retries`] times. Every other API error is
/// terminal on the first occurrence.
pub struct ResilientApiClient<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> ResilientApiClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Result<Self, ConfigurationError> {
        policy.validate()?;
        Ok(Self { transport, policy })
    }

    /// Run the exchange and return only its outcome.
    ///
    /// `build` is called once per attempt so every attempt carries a fresh
    /// signature.
    pub async fn execute<P, B, F>(&self, build: B, parse: F) -> Result<P, ApiError>
    where
        B: FnMut() -> Result<SignedRequest, ApiError>,
        F: Fn(&RawResponse) -> Result<ApiResponseEnvelope<P>, UnparseableBody>,
    {
        self.execute_recorded(build, parse).await.result
    }

    /// Run the exchange and keep every attempt that went out.
    #[instrument(skip_all, fields(max_retries = self.policy.max_retries))]
    pub async fn execute_recorded<P, B, F>(&self, mut build: B, parse: F) -> Execution<P>
    where
        B: FnMut() -> Result<SignedRequest, ApiError>,
        F: Fn(&RawResponse) -> Result<ApiResponseEnvelope<P>, UnparseableBody>,
    {
        let mut attempts = Vec::new();
        let mut retry = 0u32;
        let mut backoff = Duration::ZERO;

        loop {
            let number = retry + 1;
            let request = match build() {
                Ok(request) => request,
                Err(e) => {
                    return Execution {
                        result: Err(e),
                        attempts,
                    };
                }
            };

            let step = match self.transport.send(&request).await {
                Err(e) => Step::Retry(Retryable::Transport(e.message)),
                Ok(response) => Self::classify(&response, &parse),
            };
            attempts.push(ApiAttempt {
                number,
                backoff,
                request,
            });

            let reason = match step {
                Step::Finished(result) => {
                    debug!(attempt = number, ok = result.is_ok(), "Exchange finished");
                    return Execution { result, attempts };
                }
                Step::Retry(reason) => reason,
            };

            if retry >= self.policy.max_retries {
                let result = Err(match reason {
                    Retryable::RateLimited(messages) => ApiError::RateLimited {
                        attempts: number,
                        messages,
                    },
                    Retryable::Transport(message) => ApiError::Transport {
                        attempts: number,
                        message,
                    },
                });
                warn!(attempts = number, "Giving up, retries exhausted");
                return Execution { result, attempts };
            }

            backoff = self.policy.delay_for_retry(retry);
            match &reason {
                Retryable::RateLimited(_) => {
                    warn!(attempt = number, wait = ?backoff, "Rate limited, backing off");
                }
                Retryable::Transport(message) => {
                    warn!(
                        attempt = number,
                        wait = ?backoff,
                        %message,
                        "Transport failure, backing off"
                    );
                }
            }
            tokio::time::sleep(backoff).await;
            retry += 1;
        }
    }

    fn classify<P, F>(response: &RawResponse, parse: &F) -> Step<P>
    where
        F: Fn(&RawResponse) -> Result<ApiResponseEnvelope<P>, UnparseableBody>,
    {
        match parse(response) {
            Ok(ApiResponseEnvelope::Success(payload)) => Step::Finished(Ok(payload)),
            Ok(ApiResponseEnvelope::Error(error)) if error.kind == ErrorKind::RateLimited => {
                Step::Retry(Retryable::RateLimited(error.messages))
            }
            Ok(ApiResponseEnvelope::Error(error)) => Step::Finished(Err(ApiError::Exception {
                code: error.code,
                messages: error.messages,
            })),
            Err(UnparseableBody(detail)) if !response.is_success() => {
                Step::Retry(Retryable::Transport(format!(
                    "HTTP {} with unparseable body: {detail}",
                    response.status
                )))
            }
            Err(UnparseableBody(detail)) => Step::Finished(Err(ApiError::Malformed(detail))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::envelope::{ApiErrorKind, EnvelopeError};
    use crate::api::transport::{Method, TransportError};
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Plays back canned outcomes, one per request.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
        sent_at: Mutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<RawResponse, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                sent_at: Mutex::new(Vec::new()),
            }
        }

        fn sent_at(&self) -> Vec<Instant> {
            self.sent_at.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(&self, _request: &SignedRequest) -> Result<RawResponse, TransportError> {
            self.sent_at.lock().unwrap().push(Instant::now());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::new("script exhausted")))
        }
    }

    fn request() -> Result<SignedRequest, ApiError> {
        Ok(SignedRequest {
            method: Method::Post,
            url: "https://api.example.com/search".to_owned(),
            headers: BTreeMap::new(),
            body: Vec::new(),
        })
    }

    /// Bodies: `ok:<payload>`, `throttled`, `error:<code>`, anything else is unparseable.
    fn parse(response: &RawResponse) -> Result<ApiResponseEnvelope<String>, UnparseableBody> {
        let body = String::from_utf8_lossy(&response.body).into_owned();
        if let Some(payload) = body.strip_prefix("ok:") {
            Ok(ApiResponseEnvelope::Success(payload.to_owned()))
        } else if body == "throttled" {
            Ok(ApiResponseEnvelope::Error(EnvelopeError::rate_limited(vec![
                "slow down".to_owned(),
            ])))
        } else if let Some(code) = body.strip_prefix("error:") {
            Ok(ApiResponseEnvelope::Error(EnvelopeError::exception(
                code,
                vec!["rejected".to_owned()],
            )))
        } else {
            Err(UnparseableBody(body))
        }
    }

    fn reply(status: u16, body: &str) -> Result<RawResponse, TransportError> {
        Ok(RawResponse::new(status, body))
    }

    fn client(
        transport: ScriptedTransport,
        max_retries: u32,
    ) -> ResilientApiClient<ScriptedTransport> {
        ResilientApiClient::new(
            transport,
            RetryPolicy::new(max_retries, Duration::from_millis(1000)),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_backs_off_1s_2s_4s_then_succeeds() {
        let transport = ScriptedTransport::new(vec![
            reply(429, "throttled"),
            reply(429, "throttled"),
            reply(429, "throttled"),
            reply(200, "ok:found"),
        ]);
        let client = client(transport, 3);
        let started = Instant::now();

        let execution = client.execute_recorded(request, parse).await;

        assert_eq!(execution.result, Ok("found".to_owned()));
        let backoffs: Vec<_> = execution.attempts.iter().map(|a| a.backoff).collect();
        assert_eq!(
            backoffs,
            vec![
                Duration::ZERO,
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
            ]
        );
        let numbers: Vec<_> = execution.attempts.iter().map(|a| a.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);

        let sent_at = client.transport.sent_at();
        let expected = [1000, 2000, 4000];
        for (window, millis) in sent_at.windows(2).zip(expected) {
            let gap = window[1] - window[0];
            assert!(
                gap >= Duration::from_millis(millis) && gap < Duration::from_millis(millis + 50),
                "expected ~{millis}ms between attempts, got {gap:?}"
            );
        }
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(7000), "slept {elapsed:?}");
        assert!(elapsed < Duration::from_millis(7200), "slept {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_rate_limited_makes_max_retries_plus_one_attempts() {
        let transport = ScriptedTransport::new(vec![
            reply(429, "throttled"),
            reply(429, "throttled"),
            reply(429, "throttled"),
            reply(200, "ok:too late"),
        ]);
        let client = client(transport, 2);

        let execution = client.execute_recorded(request, parse).await;

        assert_eq!(execution.attempts.len(), 3);
        assert_eq!(
            execution.result,
            Err(ApiError::RateLimited {
                attempts: 3,
                messages: vec!["slow down".to_owned()],
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exception_is_terminal_without_sleeping() {
        let transport = ScriptedTransport::new(vec![
            reply(400, "error:InvalidParameterValue"),
            reply(200, "ok:never"),
        ]);
        let client = client(transport, 3);
        let started = Instant::now();

        let execution = client.execute_recorded(request, parse).await;

        assert_eq!(execution.attempts.len(), 1);
        let error = execution.result.unwrap_err();
        assert_eq!(error.kind(), ApiErrorKind::Exception);
        assert!(started.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_means_one_attempt() {
        let transport = ScriptedTransport::new(vec![reply(429, "throttled"), reply(200, "ok:x")]);
        let client = client(transport, 0);

        let execution = client.execute_recorded(request, parse).await;

        assert_eq!(execution.attempts.len(), 1);
        assert_eq!(execution.result.unwrap_err().kind(), ApiErrorKind::RateLimited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_is_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::new("connection reset")),
            reply(503, "<html>unavailable</html>"),
            reply(200, "ok:recovered"),
        ]);
        let client = client(transport, 3);

        let execution = client.execute_recorded(request, parse).await;

        assert_eq!(execution.result, Ok("recovered".to_owned()));
        assert_eq!(execution.attempts.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_exhausts_into_terminal_error() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::new("connection refused")),
            Err(TransportError::new("connection refused")),
        ]);
        let client = client(transport, 1);

        let result = client.execute(request, parse).await;

        assert_eq!(
            result,
            Err(ApiError::Transport {
                attempts: 2,
                message: "connection refused".to_owned(),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_success_is_malformed() {
        let transport = ScriptedTransport::new(vec![reply(200, "garbage")]);
        let client = client(transport, 3);

        let result = client.execute(request, parse).await;

        assert_eq!(result, Err(ApiError::Malformed("garbage".to_owned())));
    }

    #[tokio::test]
    async fn test_build_failure_is_returned_without_sending() {
        let transport = ScriptedTransport::new(vec![reply(200, "ok:x")]);
        let client = client(transport, 3);

        let execution = client
            .execute_recorded(|| Err(ApiError::Signing("bad url".to_owned())), parse)
            .await;

        assert!(execution.attempts.is_empty());
        assert!(client.transport.sent_at().is_empty());
        assert_eq!(execution.result.unwrap_err().kind(), ApiErrorKind::Configuration);
    }

    #[test]
    fn test_new_rejects_zero_backoff() {
        let result = ResilientApiClient::new(
            ScriptedTransport::default(),
            RetryPolicy::new(3, Duration::ZERO),
        );
        assert!(result.is_err());
    }
}
