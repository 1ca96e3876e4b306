//! Prompt templates of the graph nodes.
//!
//! Placeholders look like `{{NAME}}`. The research topic is substituted
//! last, so text typed by the user is never scanned for placeholders.

const QUERY_WRITER: &str = include_str!("prompts/query_writer.md");
const WEB_SEARCHER: &str = include_str!("prompts/web_searcher.md");
const REFLECTION: &str = include_str!("prompts/reflection.md");
const ANSWER: &str = include_str!("prompts/answer.md");

/// Separates summaries inside a prompt.
pub const SUMMARY_SEPARATOR: &str = "\n\n---\n\n";

/// Returns today's date the way the prompts spell it, e.g.
/// `October 15, 2026`.
pub fn current_date() -> String {
    chrono::Local::now().format("%B %d, %Y").to_string()
}

pub fn query_writer(topic: &str, number_queries: usize, date: &str) -> String {
    QUERY_WRITER
        .replace("{{NUMBER_QUERIES}}", &number_queries.to_string())
        .replace("{{CURRENT_DATE}}", date)
        .replace("{{RESEARCH_TOPIC}}", topic)
}

pub fn web_searcher(query: &str, date: &str) -> String {
    WEB_SEARCHER
        .replace("{{CURRENT_DATE}}", date)
        .replace("{{QUERY}}", query)
}

pub fn reflection(
    topic: &str,
    summaries: &[String],
    loop_count: usize,
    max_loops: usize,
) -> String {
    REFLECTION
        .replace("{{LOOP}}", &loop_count.to_string())
        .replace("{{MAX_LOOPS}}", &max_loops.to_string())
        .replace("{{SUMMARIES}}", &summaries.join(SUMMARY_SEPARATOR))
        .replace("{{RESEARCH_TOPIC}}", topic)
}

pub fn answer(topic: &str, summaries: &[String], date: &str) -> String {
    ANSWER
        .replace("{{CURRENT_DATE}}", date)
        .replace("{{SUMMARIES}}", &summaries.join(SUMMARY_SEPARATOR))
        .replace("{{RESEARCH_TOPIC}}", topic)
}
