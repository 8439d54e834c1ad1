//! Composes prompt guidance for the currently enabled memory tools.

const BASE_DIRECTIVE: &str = "You can remember details about the user across conversations. \
Use the memory tools below to store, update, and recall information the user shares with you.";

/// One short guidance fragment per tool name in the fixed registry. Tools
/// outside this map contribute no fragment.
fn guidance_for(tool_name: &str) -> Option<&'static str> {
    match tool_name {
        "memory_add" => Some("Use memory_add to save a new fact or preference the user shares."),
        "memory_update" => Some("Use memory_update to revise an existing memory when the user corrects or extends it."),
        "memory_delete" => Some("Use memory_delete to forget a specific memory by id when the user asks you to."),
        "memory_clear" => Some("Use memory_clear to forget everything you remember about the user when asked."),
        "memory_search" => Some("Use memory_search to recall memories relevant to the current topic."),
        "memory_load" => Some("Use memory_load to review the user's most recently updated memories."),
        _ => None,
    }
}

/// Builds the default instruction text for a sorted list of enabled tool
/// names: a base directive, one guidance fragment per tool, and the sorted
/// tool-name list. Callers that have a user-supplied override hook should
/// prefer its result when it returns a non-empty string.
pub fn default_instruction(enabled_sorted: &[String]) -> String {
    let mut out = String::from(BASE_DIRECTIVE);
    for name in enabled_sorted {
        if let Some(fragment) = guidance_for(name) {
            out.push('\n');
            out.push_str(fragment);
        }
    }
    out.push_str("\n\nAvailable memory tools: ");
    out.push_str(&enabled_sorted.join(", "));
    out
}
