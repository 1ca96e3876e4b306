use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Chunks(ChunksError),
    InvalidPayload,
}

/// A type for reading the `data` of server-sent events from a chunk
/// stream.
///
/// Bytes are buffered until a whole event is available, so multi-byte
/// characters split across chunks are decoded correctly. Comment lines and
/// fields other than `data` are ignored, and an event without `data` is
/// skipped entirely.
pub struct Sse {
    buf: Vec<u8>,
    /// Length of the buffer prefix already searched for an event end.
    scanned: usize,
    chunks: Chunks,
    eof: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            chunks,
            eof: false,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }
            // An unterminated event at the end of the stream is dropped.
            if self.eof {
                return Ok(None);
            }
            match self.chunks.next_chunk().await.map_err(Error::Chunks)? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.eof = true,
            }
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        while let Some((end, sep_len)) = find_event_end(&self.buf, self.scanned)
        {
            let block: Vec<u8> = self.buf.drain(..end + sep_len).collect();
            self.scanned = 0;
            let Ok(block) = str::from_utf8(&block[..end]) else {
                return Err(Error::InvalidPayload);
            };

            let mut data: Option<Vec<&str>> = None;
            for line in block.lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let (field, value) = match line.split_once(':') {
                    Some((field, value)) => {
                        (field, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                if field == "data" {
                    data.get_or_insert_default().push(value);
                }
            }
            if let Some(data) = data {
                return Ok(Some(data.join("\n")));
            }
        }
        self.scanned = self.buf.len();
        Ok(None)
    }
}

/// Finds the blank line terminating the first event, returning its offset
/// and the length of the separator.
///
/// The first `scanned` bytes are known to hold no complete separator, so
/// only a separator straddling that boundary is looked for before it.
fn find_event_end(buf: &[u8], scanned: usize) -> Option<(usize, usize)> {
    (scanned.saturating_sub(3)..buf.len()).find_map(|idx| {
        let rest = &buf[idx..];
        if rest.starts_with(b"\r\n\r\n") {
            Some((idx, 4))
        } else if rest.starts_with(b"\n\n") || rest.starts_with(b"\r\r") {
            Some((idx, 2))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_crlf_events() {
        let chunks = Chunks::canned([
            &b"data: {\"a\":1}\r\n\r\n"[..],
            &b"data: {\"b\":2}\r\n\r\n"[..],
        ]);
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "{\"a\":1}");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "{\"b\":2}");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_chunks() {
        // "é" is split between the two chunks.
        let chunks = Chunks::canned([
            &b"data: caf\xc3"[..],
            &b"\xa9\n"[..],
            &b"\n"[..],
        ]);
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "café");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_byte_by_byte_chunks() {
        const STREAM: &[u8] = b"data: {\"text\":\"hello\"}\r\n\r\ndata: bye\n\n";
        let mut sse = Sse::new(Chunks::canned(STREAM.chunks(1)));
        assert_eq!(
            sse.next_event().await.unwrap().unwrap(),
            "{\"text\":\"hello\"}"
        );
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "bye");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[test]
    fn test_find_event_end_resumes() {
        let buf = b"data: a\r\n\r\n";
        assert_eq!(find_event_end(buf, 0), Some((7, 4)));
        // A separator straddling the scanned prefix is still found.
        assert_eq!(find_event_end(buf, 10), Some((7, 4)));
        assert_eq!(find_event_end(b"data: a\n", 9), None);
        assert_eq!(find_event_end(b"data: a\n\n", 8), Some((7, 2)));
    }

    #[tokio::test]
    async fn test_comments_and_fields() {
        let chunks = Chunks::canned([
            &b": keep-alive\n\n"[..],
            &b"event: message\nid: 7\ndata: first\ndata: second\n\n"[..],
        ]);
        let mut sse = Sse::new(chunks);
        assert_eq!(
            sse.next_event().await.unwrap().unwrap(),
            "first\nsecond"
        );
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unterminated_and_invalid() {
        let chunks = Chunks::canned([&b"data: half"[..]]);
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap(), None);

        let chunks = Chunks::canned([&b"data: \xff\xfe\n\n"[..]]);
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);
    }
}
