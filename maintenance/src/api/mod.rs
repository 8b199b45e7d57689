//! Resilient client for rate-limited, signed JSON APIs.
//!
//! [`ResilientApiClient`] owns the retry loop; request building and response
//! classification are supplied per call. [`ProductApiClient`] wires it to the
//! Product Advertising API with [`SigV4Signer`].

mod client;
mod envelope;
mod paapi;
mod retry;
mod sigv4;
mod transport;

pub use client::{ApiAttempt, Execution, ResilientApiClient};
pub use envelope::{
    ApiError, ApiErrorKind, ApiResponseEnvelope, EnvelopeError, ErrorKind, UnparseableBody,
};
pub use paapi::{
    PAAPI_DEFAULT_HOST, PAAPI_DEFAULT_MARKETPLACE, PAAPI_DEFAULT_REGION, PaapiConfig,
    ProductApiClient, ProductMatch,
};
pub use retry::{DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_RETRIES, RetryPolicy};
pub use sigv4::{RequestParts, SigV4Signer, SigningError};
pub use transport::{HttpTransport, Method, RawResponse, SignedRequest, Transport, TransportError};
