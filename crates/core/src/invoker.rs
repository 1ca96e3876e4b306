use std::sync::Arc;
use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use backoff::backoff::Backoff;
use research_chat_model::ModelProviderError;
use tokio::time::sleep;

use crate::credential::CredentialPool;
use crate::error::Error;
use crate::model_client::{ClientError, ModelClient};

/// Message fragments that mark an error as a capacity problem, even when the
/// provider did not classify it as one.
const TRANSIENT_MARKERS: [&str; 6] =
    ["429", "503", "quota", "rate", "unavailable", "overload"];

/// Extra attempts [`call_with_retries`] makes by default.
pub const DIRECT_CALL_RETRIES: u32 = 2;

const DIRECT_CALL_WAIT: Duration = Duration::from_secs(1);

/// How often and how patiently the invoker goes through the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of passes over the whole pool.
    pub max_retries: u32,
    /// Wait after the first failed pass. Doubles after every further pass.
    pub initial_wait: Duration,
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_wait)
            .with_randomization_factor(0.0)
            .with_multiplier(2.0)
            .with_max_interval(Duration::from_secs(24 * 60 * 60))
            .with_max_elapsed_time(None)
            .build()
    }
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_wait: Duration::from_secs(15),
        }
    }
}

/// Returns `true` if `err` is worth retrying on another credential.
pub fn is_transient(err: &dyn ModelProviderError) -> bool {
    if err.kind().is_transient() {
        return true;
    }
    let message = err.to_string().to_lowercase();
    TRANSIENT_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Runs model calls against a [`CredentialPool`], spreading load over the
/// credentials and riding out rate limits.
#[derive(Clone, Debug)]
pub struct ResilientInvoker {
    pool: Arc<CredentialPool>,
    policy: RetryPolicy,
}

impl ResilientInvoker {
    /// Creates an invoker over `pool`.
    #[inline]
    pub fn new(pool: Arc<CredentialPool>, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    /// Returns the pool the invoker draws clients from.
    #[inline]
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Calls `call` with pool clients until one succeeds.
    ///
    /// Every pass tries each client once, in a fresh random order. A
    /// transient error moves on to the next client, any other error is
    /// returned right away. Passes are separated by exponentially growing
    /// waits.
    pub async fn invoke<T, F, Fut>(&self, mut call: F) -> Result<T, Error>
    where
        F: FnMut(&ModelClient) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        if self.pool.is_empty() {
            return Err(Error::no_credentials());
        }

        let mut backoff = self.policy.backoff();
        let mut last_error = None;
        for attempt in 0..self.policy.max_retries {
            for (idx, client) in self.pool.shuffled() {
                match call(client).await {
                    Ok(value) => return Ok(value),
                    Err(err) if is_transient(err.as_ref()) => {
                        warn!(
                            attempt,
                            credential = idx,
                            "transient model error: {err}"
                        );
                        last_error = Some(err);
                    }
                    Err(err) => {
                        error!(credential = idx, "model error: {err}");
                        return Err(Error::model(err));
                    }
                }
            }

            if attempt + 1 < self.policy.max_retries {
                let wait = backoff
                    .next_backoff()
                    .unwrap_or(self.policy.initial_wait);
                warn!(
                    "all {} credentials are busy, retrying in {wait:?}",
                    self.pool.len()
                );
                sleep(wait).await;
            }
        }

        Err(Error::pool_exhausted(last_error))
    }
}

/// Calls `call` on one random client of `pool`, repeating it up to `retries`
/// more times on the same client while it fails transiently.
///
/// Waits start at one second and double after every failed attempt. The
/// last error is returned as a model error once the retries run out.
pub async fn call_with_retries<T, F, Fut>(
    pool: &CredentialPool,
    retries: u32,
    mut call: F,
) -> Result<T, Error>
where
    F: FnMut(&ModelClient) -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let client = pool.pick().ok_or_else(Error::no_credentials)?;
    let mut backoff = RetryPolicy {
        max_retries: retries,
        initial_wait: DIRECT_CALL_WAIT,
    }
    .backoff();

    let mut attempt = 0;
    loop {
        match call(client).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < retries && is_transient(err.as_ref()) => {
                let wait = backoff.next_backoff().unwrap_or(DIRECT_CALL_WAIT);
                warn!(attempt, "transient model error, retrying in {wait:?}: {err}");
                sleep(wait).await;
                attempt += 1;
            }
            Err(err) => {
                error!(attempt, "model error: {err}");
                return Err(Error::model(err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use research_chat_model::{ErrorKind, ModelRequest};
    use research_chat_test_model::{PresetResponse, TestModelProvider};
    use tokio::time::Instant;

    use super::*;

    fn provider_with(preset: PresetResponse) -> TestModelProvider {
        let mut provider = TestModelProvider::default();
        provider.set_fallback(preset);
        provider
    }

    fn invoker(providers: &[TestModelProvider]) -> ResilientInvoker {
        let pool = CredentialPool::from_providers(providers.iter().cloned());
        ResilientInvoker::new(Arc::new(pool), RetryPolicy::default())
    }

    async fn ask(invoker: &ResilientInvoker) -> Result<String, Error> {
        let req = ModelRequest::text("test", "ping");
        invoker
            .invoke(|client| {
                let fut = client.send_request(req.clone());
                async move { fut.await.map(|resp| resp.text) }
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_rate_limited_credentials() {
        let busy = PresetResponse::failing(
            ErrorKind::RateLimitExceeded,
            "429 Too Many Requests",
        );
        let providers = [
            provider_with(busy.clone()),
            provider_with(busy),
            provider_with(PresetResponse::with_text("pong")),
        ];
        let invoker = invoker(&providers);

        let start = Instant::now();
        assert_eq!(ask(&invoker).await.unwrap(), "pong");

        // Succeeds within the first pass, without waiting.
        assert!(start.elapsed() < Duration::from_secs(15));
        let calls: usize = providers.iter().map(|p| p.request_count()).sum();
        assert!(calls <= 3);
        assert_eq!(providers[2].request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_exhausted() {
        let busy = PresetResponse::failing(
            ErrorKind::Other,
            "Resource has been exhausted (e.g. check quota).",
        );
        let providers = [provider_with(busy.clone()), provider_with(busy)];
        let invoker = invoker(&providers);

        let start = Instant::now();
        let err = ask(&invoker).await.unwrap_err();
        let elapsed = start.elapsed();

        assert_eq!(err.kind(), crate::ErrorKind::PoolExhausted);
        assert_eq!(err.provider_kind(), Some(ErrorKind::Other));
        for provider in &providers {
            assert_eq!(provider.request_count(), 5);
        }
        // 15 + 30 + 60 + 120 seconds between five passes.
        assert!(elapsed >= Duration::from_secs(225));
        assert!(elapsed < Duration::from_secs(226));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_error_aborts() {
        let broken = PresetResponse::failing(ErrorKind::Other, "invalid argument");
        let providers = [provider_with(broken.clone()), provider_with(broken)];
        let invoker = invoker(&providers);

        let err = ask(&invoker).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Model);
        assert_eq!(err.reason(), "invalid argument");
        let calls: usize = providers.iter().map(|p| p.request_count()).sum();
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let invoker = invoker(&[]);
        let err = ask(&invoker).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NoCredentials);
    }

    async fn ask_directly(
        pool: &CredentialPool,
        retries: u32,
    ) -> Result<String, Error> {
        let req = ModelRequest::text("test", "ping");
        call_with_retries(pool, retries, |client| {
            let fut = client.send_request(req.clone());
            async move { fut.await.map(|resp| resp.text) }
        })
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_call_recovers_from_rate_limit() {
        let provider = provider_with(
            PresetResponse::with_text("pong").with_failures(
                ErrorKind::RateLimitExceeded,
                "429 Too Many Requests",
                2,
            ),
        );
        let pool = CredentialPool::from_providers([provider.clone()]);

        let start = Instant::now();
        assert_eq!(ask_directly(&pool, 2).await.unwrap(), "pong");

        assert_eq!(provider.request_count(), 3);
        // 1 + 2 seconds between three attempts.
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_call_gives_up() {
        let provider = provider_with(PresetResponse::failing(
            ErrorKind::Unavailable,
            "503 Service Unavailable",
        ));
        let pool = CredentialPool::from_providers([provider.clone()]);

        let err = ask_directly(&pool, DIRECT_CALL_RETRIES).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Model);
        assert_eq!(err.provider_kind(), Some(ErrorKind::Unavailable));
        assert_eq!(provider.request_count(), 3);

        let broken = provider_with(PresetResponse::failing(
            ErrorKind::Other,
            "invalid argument",
        ));
        let pool = CredentialPool::from_providers([broken.clone()]);
        let err = ask_directly(&pool, DIRECT_CALL_RETRIES).await.unwrap_err();
        assert_eq!(err.reason(), "invalid argument");
        assert_eq!(broken.request_count(), 1);

        let err = ask_directly(&CredentialPool::default(), 2).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NoCredentials);
    }

    #[test]
    fn test_transient_markers() {
        struct Plain(&'static str, ErrorKind);

        impl std::fmt::Debug for Plain {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.0)
            }
        }

        impl std::fmt::Display for Plain {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.0)
            }
        }

        impl std::error::Error for Plain {}

        impl ModelProviderError for Plain {
            fn kind(&self) -> ErrorKind {
                self.1
            }
        }

        assert!(is_transient(&Plain("boom", ErrorKind::Unavailable)));
        assert!(is_transient(&Plain("Model is OVERLOADED", ErrorKind::Other)));
        assert!(is_transient(&Plain("HTTP 503", ErrorKind::Other)));
        assert!(!is_transient(&Plain("permission denied", ErrorKind::Other)));
        assert!(!is_transient(&Plain("blocked", ErrorKind::Moderated)));
    }
}
