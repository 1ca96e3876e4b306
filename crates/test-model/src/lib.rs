//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use research_chat_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: VecDeque<ModelResponseEvent>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            // Returns `None` after completion, and keeps doing so.
            return Poll::Ready(Ok(this.events.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

struct Rule {
    needle: String,
    responses: VecDeque<PresetResponse>,
}

#[derive(Default)]
struct Script {
    rules: Vec<Rule>,
    fallback: Option<PresetResponse>,
    requests: Vec<ModelRequest>,
}

impl Script {
    /// Picks the response for `req`, consuming one failure or one queued
    /// response of the matched rule.
    fn respond(&mut self, req: &ModelRequest) -> Result<PresetResponse, Error> {
        self.requests.push(req.clone());

        let preset = match self
            .rules
            .iter_mut()
            .find(|rule| req.prompt.contains(&rule.needle))
        {
            Some(rule) => {
                // The last response of a rule repeats forever.
                if rule.responses.len() > 1
                    && rule.responses[0].failure.is_none()
                {
                    rule.responses.pop_front()
                } else {
                    rule.responses.front_mut().map(take_attempt)
                }
            }
            None => self.fallback.as_mut().map(take_attempt),
        };
        let Some(preset) = preset else {
            return Err(Error {
                message: format!("no step matches prompt: {}", req.prompt),
                kind: ErrorKind::Other,
            });
        };

        match preset.failure {
            Some(failure) => Err(Error {
                message: failure.message,
                kind: failure.kind,
            }),
            None => Ok(preset),
        }
    }
}

/// Returns the response of one attempt, counting down the failures.
fn take_attempt(preset: &mut PresetResponse) -> PresetResponse {
    let attempt = preset.clone();
    if let Some(failure) = &mut preset.failure {
        if failure.times == 1 {
            preset.failure = None;
        } else if failure.times > 1 {
            failure.times -= 1;
        }
    }
    attempt
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should respond to a request. A request is answered by the first
/// rule whose needle occurs in the prompt, or by the fallback response if no
/// rule matches. If neither exists, an error will be returned.
///
/// Clones share the script and the request log, so a test can keep a clone
/// around to inspect what the code under test has sent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    /// Answers prompts containing `needle` with `preset`.
    ///
    /// Adding several responses for the same needle queues them: each
    /// request consumes one, and the last one repeats.
    pub fn add_rule<S: Into<String>>(&mut self, needle: S, preset: PresetResponse) {
        let needle = needle.into();
        let mut script = self.lock();
        if let Some(rule) = script.rules.iter_mut().find(|r| r.needle == needle)
        {
            rule.responses.push_back(preset);
            return;
        }
        script.rules.push(Rule {
            needle,
            responses: VecDeque::from([preset]),
        });
    }

    /// Answers every prompt no rule matches with `preset`.
    #[inline]
    pub fn set_fallback(&mut self, preset: PresetResponse) {
        self.lock().fallback = Some(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, in order.
    #[inline]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    /// Returns the number of requests received so far.
    #[inline]
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        // A panicking test thread must not hide the script from the others.
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = self.lock().respond(req).map(|preset| {
            let mut events: VecDeque<_> = preset
                .events
                .into_iter()
                .map(|event| match event {
                    PresetEvent::TextDelta(delta) => {
                        ModelResponseEvent::TextDelta(delta)
                    }
                    PresetEvent::Grounding(metadata) => {
                        ModelResponseEvent::Grounding(metadata)
                    }
                })
                .collect();
            events.push_back(ModelResponseEvent::Completed(
                ModelFinishReason::Stop,
            ));
            TestModelResponse {
                events,
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                sleep: None,
            }
        });
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use research_chat_model::GroundingMetadata;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Option<GroundingMetadata>) {
        let mut resp = pin!(resp);
        let mut text = String::new();
        let mut grounding = None;
        loop {
            let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
                .unwrap();
            match event {
                ModelResponseEvent::Completed(_) => break,
                ModelResponseEvent::TextDelta(delta) => text.push_str(&delta),
                ModelResponseEvent::Grounding(metadata) => {
                    grounding = Some(metadata)
                }
            }
        }
        (text, grounding)
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_rule(
            "weather",
            PresetResponse::with_events([
                PresetEvent::TextDelta("Sunny, ".to_owned()),
                PresetEvent::TextDelta("22 degrees.".to_owned()),
            ])
            .with_grounding(
                &[("https://weather.example/today", "weather.example")],
                &[(0, 6, &[0])],
            ),
        );
        provider.set_fallback(PresetResponse::with_text("I don't know."));

        let req = ModelRequest::text("test", "What is the weather like?")
            .with_grounded_search();
        let resp = provider.send_request(&req).await.unwrap();
        let (text, grounding) = collect_response(resp).await;
        assert_eq!(text, "Sunny, 22 degrees.");
        assert_eq!(grounding.unwrap().chunks.len(), 1);

        let req = ModelRequest::text("test", "Who are you?");
        let resp = provider.send_request(&req).await.unwrap();
        let (text, grounding) = collect_response(resp).await;
        assert_eq!(text, "I don't know.");
        assert!(grounding.is_none());

        assert_eq!(provider.request_count(), 2);
        assert_eq!(provider.requests()[1].prompt, "Who are you?");
    }

    #[tokio::test]
    async fn test_queued_responses() {
        let mut provider = TestModelProvider::default();
        provider.add_rule("next", PresetResponse::with_text("first"));
        provider.add_rule("next", PresetResponse::with_text("second"));

        let req = ModelRequest::text("test", "next please");
        let mut texts = vec![];
        for _ in 0..3 {
            let resp = provider.send_request(&req).await.unwrap();
            texts.push(collect_response(resp).await.0);
        }
        assert_eq!(texts, ["first", "second", "second"]);
    }

    #[tokio::test]
    async fn test_failures() {
        let mut provider = TestModelProvider::default();
        provider.set_fallback(PresetResponse::with_text("ok").with_failures(
            ErrorKind::RateLimitExceeded,
            "429 Too Many Requests",
            2,
        ));

        let req = ModelRequest::text("test", "anything");
        for _ in 0..2 {
            let err = provider.send_request(&req).await.err().unwrap();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
            assert_eq!(err.to_string(), "429 Too Many Requests");
        }
        let resp = provider.send_request(&req).await.unwrap();
        assert_eq!(collect_response(resp).await.0, "ok");

        let mut provider = TestModelProvider::default();
        provider.set_fallback(PresetResponse::failing(ErrorKind::Other, "boom"));
        for _ in 0..5 {
            assert!(provider.send_request(&req).await.is_err());
        }
    }

    #[tokio::test]
    async fn test_unmatched_request() {
        let provider = TestModelProvider::default();
        let req = ModelRequest::text("test", "hello");
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
