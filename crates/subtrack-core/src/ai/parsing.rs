//! JSON parsing for classifier replies
//!
//! The classifier returns free-form text that is expected to contain a JSON
//! array, but nothing enforces that. Parsing is therefore layered: a strict
//! parse of the whole reply, then extraction of the first `[...]` span, then
//! giving up with an empty list. A malformed reply costs one detection run,
//! never an error.

use tracing::warn;

use super::types::ClassificationResult;

/// Parse the classifier reply into classification entries.
///
/// Returns an empty vector when no JSON array can be recovered; the caller
/// treats that as "zero detections", not as a failure.
pub fn parse_classification_results(reply: &str) -> Vec<ClassificationResult> {
    let reply = reply.trim();

    if let Ok(results) = serde_json::from_str::<Vec<ClassificationResult>>(reply) {
        return results;
    }

    // Legacy fallback: the model wrapped the array in prose or markdown.
    // Take the widest [...] span and retry.
    if let (Some(start), Some(end)) = (reply.find('['), reply.rfind(']')) {
        if start < end {
            if let Ok(results) =
                serde_json::from_str::<Vec<ClassificationResult>>(&reply[start..=end])
            {
                return results;
            }
        }
    }

    warn!(
        reply = %truncate_for_log(reply),
        "No parseable JSON array in classifier reply"
    );
    Vec::new()
}

fn truncate_for_log(reply: &str) -> String {
    if reply.chars().count() > 200 {
        format!("{}...", reply.chars().take(200).collect::<String>())
    } else {
        reply.to_string()
    }
}
