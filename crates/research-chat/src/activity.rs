//! One-line descriptions of research progress, for status displays.

use research_chat_core::ProgressEvent;

/// Shown before the first event arrives.
pub const STARTING: &str = "🔍 Generating search queries...";

/// Describes what the agent is doing after `event`.
pub fn describe(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::QueryGenerated { queries } => {
            let queries: Vec<_> =
                queries.iter().map(|query| query.text.as_str()).collect();
            format!("🔍 Generating search queries: {}", queries.join(", "))
        }
        ProgressEvent::SourcesFound { sources, .. } => {
            let mut labels: Vec<&str> = vec![];
            for source in sources {
                if !labels.contains(&source.label.as_str()) {
                    labels.push(&source.label);
                }
            }
            labels.truncate(3);
            let about = if labels.is_empty() {
                "the topic".to_owned()
            } else {
                labels.join(", ")
            };
            format!(
                "🌐 Researching: Found {} sources about {about}",
                sources.len()
            )
        }
        ProgressEvent::Reflecting {
            is_sufficient: true,
            ..
        } => "✨ Research complete! Generating final answer...".to_owned(),
        ProgressEvent::Reflecting {
            will_continue: false,
            ..
        } => "📝 Composing final answer...".to_owned(),
        ProgressEvent::Reflecting {
            follow_up_queries, ..
        } => {
            let mut activity =
                "🤔 Analyzing results: Need more information about:".to_owned();
            for query in follow_up_queries {
                activity.push_str("\n- ");
                activity.push_str(query);
            }
            activity
        }
        ProgressEvent::Finalized { .. } => "✅ Research complete!".to_owned(),
    }
}
