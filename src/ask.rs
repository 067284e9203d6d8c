//! `askdocs ask` and `askdocs chat`.
//!
//! `chat` keeps its history in memory for the session only; nothing is
//! written back to the database.

use anyhow::Result;
use std::io::{BufRead, Write};

use askdocs_core::models::{Answer, ChatTurn};

use crate::app::open_pipeline;
use crate::config::Config;

pub const NO_INFORMATION: &str = "No relevant information found.";
pub const NO_ANSWER: &str = "No answer found.";

pub async fn run_ask(config: &Config, question: &str, json: bool) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let mut history = Vec::new();
    let turn = pipeline.ask(question, &mut history).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&turn)?);
    } else {
        print_turn(&turn);
    }

    if let Answer::Failed(cause) = &turn.answer {
        anyhow::bail!("generation failed: {}", cause);
    }
    Ok(())
}

pub async fn run_chat(config: &Config) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let mut history: Vec<ChatTurn> = Vec::new();

    eprintln!(
        "askdocs chat ({} / {}). Empty line or Ctrl-D to quit, /history to review.",
        pipeline.embedder().model_name(),
        pipeline.generator().model_name()
    );

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        eprint!("> ");
        std::io::stderr().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            break;
        }
        if question == "/history" {
            print_history(&history);
            continue;
        }

        let turn = pipeline.ask(question, &mut history).await;
        print_turn(&turn);
        println!();
    }
    Ok(())
}

pub fn print_turn(turn: &ChatTurn) {
    match &turn.answer {
        Answer::Generated(text) => println!("{}", text),
        Answer::NoAnswer => println!("{}", NO_ANSWER),
        Answer::Failed(cause) => println!("Error: {}", cause),
    }

    match turn.retrieval.top_source() {
        Some(top) => println!("\nSource: {} ({})", top.document_name, top.source_url),
        None => println!("\n{}", NO_INFORMATION),
    }
}

fn print_history(history: &[ChatTurn]) {
    if history.is_empty() {
        println!("(no questions yet)");
        return;
    }
    for (i, turn) in history.iter().enumerate() {
        let answer = match &turn.answer {
            Answer::Generated(text) => text.lines().next().unwrap_or_default().to_string(),
            Answer::NoAnswer => NO_ANSWER.to_string(),
            Answer::Failed(cause) => format!("Error: {cause}"),
        };
        println!("{:>3}. Q: {}", i + 1, turn.question);
        println!("     A: {}", answer);
    }
}
