//! `tazmic chat` and `tazmic ask` — Talk to the assistant from the console.

use std::io::Write;

use tazmic_core::message::ThreadId;
use tokio::io::{self, AsyncBufReadExt, BufReader};

use super::runtime::{self, Options};

/// Answer one question and exit.
pub async fn run_single(
    opts: &Options,
    message: &str,
    thread: Option<String>,
) -> anyhow::Result<()> {
    let runtime = runtime::build(opts).await?;
    let thread_id = thread_id(thread, &runtime.config.agent.default_thread_id);

    eprint!("  Thinking...");
    let response = runtime.assistant.answer_or_fallback(&thread_id, message).await;
    eprint!("\r              \r");
    println!("{response}");
    Ok(())
}

/// Read questions from stdin until `exit`, `quit` or end of input.
pub async fn run_interactive(opts: &Options, thread: Option<String>) -> anyhow::Result<()> {
    let runtime = runtime::build(opts).await?;
    let thread_id = thread_id(thread, &runtime.config.agent.default_thread_id);
    let chunks =
        runtime::collection_size(runtime.store.as_ref(), &runtime.config.store.collection).await?;

    println!();
    println!("  TAZMIC — Interactive Mode");
    println!("  =========================");
    println!();
    println!("  Model:      {}", runtime.assistant.agent().model());
    println!("  Collection: {} ({chunks} chunks)", runtime.config.store.collection);
    println!("  Thread:     {thread_id}");
    println!();
    println!("  Ask about the document and press Enter.");
    println!("  Type 'exit' or 'quit' to leave.");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit_command(line) {
            break;
        }

        eprint!("  ...");
        let response = runtime.assistant.answer_or_fallback(&thread_id, line).await;
        eprint!("\r     \r");
        println!();
        for text in response.lines() {
            println!("  TAZMIC > {text}");
        }
        println!();
    }

    println!("  Goodbye.");
    Ok(())
}

fn thread_id(requested: Option<String>, default: &str) -> ThreadId {
    ThreadId(requested.unwrap_or_else(|| default.to_string()))
}

fn is_exit_command(line: &str) -> bool {
    matches!(
        line.to_ascii_lowercase().as_str(),
        "exit" | "quit" | "/exit" | "/quit" | ":q"
    )
}
