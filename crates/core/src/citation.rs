//! Citation handling for grounded search results.
//!
//! Search results cite their sources through long redirect URLs. Before a
//! summary reaches any prompt, every URL is swapped for a short token that
//! is cheap to repeat. The finalizer swaps the tokens back in the answer.

use std::collections::{HashMap, HashSet};

use research_chat_model::{GroundingChunk, GroundingMetadata};
use serde::{Deserialize, Serialize};

/// The common prefix of every short URL token.
pub const SHORT_URL_PREFIX: &str = "https://research.invalid/id/";

/// A cited web source.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedSource {
    /// Display name, derived from the source title.
    pub label: String,
    /// The token standing in for the URL in summaries.
    pub short_url: String,
    /// The original URL.
    pub value: String,
    /// Id of the query that found the source.
    pub query_id: usize,
}

/// A segment of a summary and the sources backing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Citation {
    /// Byte offset where the segment starts.
    pub start_index: usize,
    /// Byte offset where the segment ends (exclusive).
    pub end_index: usize,
    /// The sources backing the segment.
    pub segments: Vec<ResolvedSource>,
}

/// Returns the short URL token of the `n`-th source of query `query_id`.
#[inline]
pub fn short_url(query_id: usize, n: usize) -> String {
    format!("{SHORT_URL_PREFIX}{query_id}-{n}")
}

/// Maps every distinct chunk URI to a short URL token, numbered in order
/// of first appearance. Chunks without URI are ignored.
pub fn resolve_short_urls(
    chunks: &[GroundingChunk],
    query_id: usize,
) -> HashMap<String, String> {
    let mut short_urls = HashMap::new();
    for uri in chunks.iter().filter_map(|chunk| chunk.uri.as_ref()) {
        if !short_urls.contains_key(uri) {
            let token = short_url(query_id, short_urls.len());
            short_urls.insert(uri.clone(), token);
        }
    }
    short_urls
}

/// Turns grounding supports into citations.
///
/// Chunk indices that are out of range or point at a chunk without URI are
/// skipped, as are supports that end up without any source.
pub fn collect_citations(
    metadata: &GroundingMetadata,
    short_urls: &HashMap<String, String>,
    query_id: usize,
) -> Vec<Citation> {
    metadata
        .supports
        .iter()
        .filter_map(|support| {
            let segments: Vec<_> = support
                .chunk_indices
                .iter()
                .filter_map(|&idx| metadata.chunks.get(idx))
                .filter_map(|chunk| {
                    let uri = chunk.uri.as_ref()?;
                    Some(ResolvedSource {
                        label: source_label(chunk.title.as_deref()),
                        short_url: short_urls.get(uri)?.clone(),
                        value: uri.clone(),
                        query_id,
                    })
                })
                .collect();
            (!segments.is_empty()).then(|| Citation {
                start_index: support.start_index,
                end_index: support.end_index,
                segments,
            })
        })
        .collect()
}

/// Inserts a markdown link ` [label](short_url)` after every cited segment.
///
/// Citations are applied from the end of the text backwards, so offsets of
/// the ones still pending stay valid. Offsets past the end of the text are
/// clamped, offsets inside a character are moved back to its start.
pub fn insert_citation_markers(text: &str, citations: &[Citation]) -> String {
    let mut ordered: Vec<_> = citations.iter().collect();
    ordered.sort_by(|a, b| b.end_index.cmp(&a.end_index));

    let mut result = text.to_owned();
    for citation in ordered {
        let mut end = citation.end_index.min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let marker: String = citation
            .segments
            .iter()
            .map(|source| format!(" [{}]({})", source.label, source.short_url))
            .collect();
        result.insert_str(end, &marker);
    }
    result
}

/// Rewrites a grounded search result into a cited summary.
///
/// Returns the summary and the sources it cites, deduplicated by short URL.
pub fn resolve_grounded_text(
    text: &str,
    metadata: Option<&GroundingMetadata>,
    query_id: usize,
) -> (String, Vec<ResolvedSource>) {
    let Some(metadata) = metadata else {
        return (text.to_owned(), vec![]);
    };

    let short_urls = resolve_short_urls(&metadata.chunks, query_id);
    let citations = collect_citations(metadata, &short_urls, query_id);
    let summary = insert_citation_markers(text, &citations);

    let mut seen = HashSet::new();
    let sources = citations
        .into_iter()
        .flat_map(|citation| citation.segments)
        .filter(|source| seen.insert(source.short_url.clone()))
        .collect();
    (summary, sources)
}

/// Replaces known short URL tokens in `answer` by the original URLs.
///
/// Returns the rewritten answer and the sources it cites, deduplicated, in
/// the order of `sources`. Tokens are matched in full, so a token never
/// matches the beginning of a longer one.
pub fn replace_short_urls(
    answer: &str,
    sources: &[ResolvedSource],
) -> (String, Vec<ResolvedSource>) {
    let mut by_token = HashMap::new();
    for source in sources {
        by_token.entry(source.short_url.as_str()).or_insert(source);
    }

    let mut used = HashSet::new();
    let mut result = String::with_capacity(answer.len());
    let mut rest = answer;
    while let Some(pos) = rest.find(SHORT_URL_PREFIX) {
        result.push_str(&rest[..pos]);
        let id_start = pos + SHORT_URL_PREFIX.len();
        let token = &rest[pos..id_start + token_id_len(&rest[id_start..])];
        match by_token.get(token) {
            Some(source) => {
                result.push_str(&source.value);
                used.insert(token);
            }
            None => result.push_str(token),
        }
        rest = &rest[pos + token.len()..];
    }
    result.push_str(rest);

    let mut seen = HashSet::new();
    let cited = sources
        .iter()
        .filter(|source| used.contains(source.short_url.as_str()))
        .filter(|source| seen.insert(source.short_url.as_str()))
        .cloned()
        .collect();
    (result, cited)
}

/// Returns the length of the `{query_id}-{n}` part at the start of `s`, or
/// `0` if there is none.
fn token_id_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let digits = |from: usize| {
        bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count()
    };

    let query_id = digits(0);
    if query_id == 0 || bytes.get(query_id) != Some(&b'-') {
        return 0;
    }
    match digits(query_id + 1) {
        0 => 0,
        n => query_id + 1 + n,
    }
}

fn source_label(title: Option<&str>) -> String {
    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        return "source".to_owned();
    };
    match title.rsplit_once('.') {
        Some((name, _)) if !name.is_empty() => name.to_owned(),
        _ => title.to_owned(),
    }
}
