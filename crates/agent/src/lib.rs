//! The TAZMIC answer loop.
//!
//! A turn follows a **Model → Tools → Model** cycle:
//!
//! 1. **Receive** a user message for a thread
//! 2. **Build the request** (system prompt + windowed thread history)
//! 3. **Send to the model** with the retrieval tool advertised
//! 4. **If tool calls**: run them, append the results, loop back to step 3
//! 5. **If text**: commit the thread and return the answer
//!
//! After `max_tool_rounds` tool batches the model is called once more
//! without tools, so every turn ends in a direct answer.

pub mod assistant;
pub mod loop_runner;
pub mod prompt;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assistant::{Assistant, FALLBACK_MESSAGE};
pub use loop_runner::{AgentLoop, LoopState, TurnOutcome};
pub use prompt::{SYSTEM_PROMPT, system_prompt};
pub use session::{InMemoryThreadStore, ThreadStore, ThreadSummary};
