use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use research_chat_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::{self, GenerateContentResponse};

struct PartialState {
    sse: Sse,
    // Events decoded from the stream but not yet handed out.
    pending: VecDeque<ModelResponseEvent>,
    // Gemini repeats the whole metadata on later chunks, so the latest
    // non-empty one wins.
    grounding: Option<research_chat_model::GroundingMetadata>,
    finish_reason: Option<ModelFinishReason>,
    finished: bool,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct GeminiResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl GeminiResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            pending: VecDeque::new(),
            grounding: None,
            finish_reason: None,
            finished: false,
        };
        Self {
            next_event_fut: Some(Box::pin(next_event(partial_state))),
        }
    }
}

impl ModelResponse for GeminiResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        match ready!(next_event_fut.as_mut().poll(cx)) {
            Ok((Some(event), partial_state)) => {
                *this.next_event_fut =
                    Some(Box::pin(next_event(partial_state)));
                Poll::Ready(Ok(Some(event)))
            }
            Ok((None, _)) => {
                *this.next_event_fut = None;
                Poll::Ready(Ok(None))
            }
            Err(err) => {
                *this.next_event_fut = None;
                Poll::Ready(Err(err))
            }
        }
    }
}

async fn next_event(mut state: PartialState) -> NextEvent {
    loop {
        if let Some(event) = state.pending.pop_front() {
            return Ok((Some(event), state));
        }
        if state.finished {
            return Ok((None, state));
        }

        let data = match state.sse.next_event().await {
            Ok(data) => data,
            Err(SseError::Chunks(err)) => {
                return Err(Error::new(
                    format!("response stream unavailable: {}", err.0),
                    ErrorKind::Unavailable,
                ));
            }
            Err(SseError::InvalidPayload) => {
                return Err(Error::new("invalid SSE payload", ErrorKind::Other));
            }
        };
        let Some(data) = data else {
            // End of stream: flush metadata, then complete.
            if let Some(grounding) = state.grounding.take() {
                state.pending.push_back(ModelResponseEvent::Grounding(grounding));
            }
            let reason = state.finish_reason.unwrap_or(ModelFinishReason::Stop);
            state.pending.push_back(ModelResponseEvent::Completed(reason));
            state.finished = true;
            continue;
        };
        trace!("got sse event: {data}");

        let chunk = serde_json::from_str::<GenerateContentResponse>(&data)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        apply_chunk(&mut state, chunk)?;
    }
}

fn apply_chunk(
    state: &mut PartialState,
    chunk: GenerateContentResponse,
) -> Result<(), Error> {
    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(Error::new(
            format!("prompt blocked: {reason}"),
            ErrorKind::Moderated,
        ));
    }

    let Some(candidate) = chunk.candidates.into_iter().next() else {
        return Ok(());
    };
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    for part in parts {
        if part.thought == Some(true) {
            continue;
        }
        if let Some(text) = part.text.filter(|t| !t.is_empty()) {
            state.pending.push_back(ModelResponseEvent::TextDelta(text));
        }
    }
    if let Some(metadata) = candidate.grounding_metadata {
        let metadata = proto::convert_grounding(metadata);
        if !metadata.is_empty() {
            state.grounding = Some(metadata);
        }
    }
    if let Some(reason) = candidate.finish_reason {
        state.finish_reason = Some(proto::convert_finish_reason(&reason));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use super::*;
    use crate::io::Chunks;

    async fn collect(
        chunks: Chunks,
    ) -> Result<Vec<ModelResponseEvent>, Error> {
        let mut resp = pin!(GeminiResponse::from_sse(Sse::new(chunks)));
        let mut events = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
        {
            events.push(event);
        }
        Ok(events)
    }

    #[tokio::test]
    async fn test_grounded_stream() {
        let chunks = Chunks::canned([
            &br#"data: {"candidates":[{"content":{"role":"model","parts":[{"text":"Rust "}]}}]}"#[..],
            &b"\r\n\r\n"[..],
            &br#"data: {"candidates":[{"content":{"role":"model","parts":[{"text":"thinking","thought":true},{"text":"is fast."}]},"finishReason":"STOP","groundingMetadata":{"groundingChunks":[{"web":{"uri":"https://rust-lang.org","title":"rust-lang.org"}}],"groundingSupports":[{"segment":{"endIndex":13},"groundingChunkIndices":[0]}]}}]}"#[..],
            &b"\r\n\r\n"[..],
        ]);
        let events = collect(chunks).await.unwrap();

        assert_eq!(events.len(), 4);
        assert_eq!(events[0], ModelResponseEvent::TextDelta("Rust ".to_owned()));
        assert_eq!(
            events[1],
            ModelResponseEvent::TextDelta("is fast.".to_owned())
        );
        let ModelResponseEvent::Grounding(metadata) = &events[2] else {
            unreachable!("unexpected event: {:?}", events[2]);
        };
        assert_eq!(metadata.supports[0].end_index, 13);
        assert_eq!(
            events[3],
            ModelResponseEvent::Completed(ModelFinishReason::Stop)
        );
    }

    #[tokio::test]
    async fn test_blocked_prompt() {
        let chunks = Chunks::canned([
            &br#"data: {"promptFeedback":{"blockReason":"SAFETY"}}"#[..],
            &b"\n\n"[..],
        ]);
        let err = collect(chunks).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Moderated);
    }

    #[tokio::test]
    async fn test_malformed_chunk() {
        let chunks = Chunks::canned([&b"data: {not json}\n\n"[..]]);
        let err = collect(chunks).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Other);
    }
}
