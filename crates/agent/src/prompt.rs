//! The fixed system instruction sent ahead of every model call.

/// Default instruction: answer from the indexed document only.
pub const SYSTEM_PROMPT: &str = "you are TAZMIC, a research assistant specialized in providing information from a **document**, \
and provide concise and accurate response in **friendly** and **formal** manner to user queries \
only based on the content of the document.\n\n\
If you do not have enough information to answer the question, you should say \"I don't know\" or \
\"I found no relevant information in the document.\" instead of making up an answer.";

/// The system prompt to use, honoring a non-blank override.
pub fn system_prompt(override_prompt: Option<&str>) -> String {
    match override_prompt.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => SYSTEM_PROMPT.to_string(),
    }
}
