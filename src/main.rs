//! rootwise CLI
//!
//! Guided root-cause reflection from the terminal.
//!
//! Run with: cargo run
//! One-shot: cargo run -- --request '<stage request JSON>'

use anyhow::Result;
use rootwise::{
    db, AnthropicClient, GatewayConfig, LlmGateway, RandomPicker, SessionEngine, Stage,
    StageRequest,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let data_dir = get_data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("rootwise.db");
    let conn = db::init_db(&db_path)?;
    tracing::info!("database initialized at {:?}", db_path);

    let config = GatewayConfig::default();
    let client = AnthropicClient::new(&config)?;
    let gateway = LlmGateway::new(Arc::new(client), config);
    let picker = RandomPicker;
    let engine = SessionEngine::new(&conn, &gateway, &picker);

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--request" => {
                let raw = match args.get(2) {
                    Some(raw) => raw.clone(),
                    None => read_stdin()?,
                };
                let request: StageRequest = serde_json::from_str(&raw)?;
                let reply = engine.respond(&request).await?;
                println!("{}", serde_json::to_string_pretty(&reply)?);
                return Ok(());
            }
            "--log" => {
                let session_id = args.get(2).map(String::as_str).unwrap_or("local");
                for record in db::session_log(&conn, session_id)? {
                    println!(
                        "{}  {}  {} in / {} out  ${:.6}",
                        record.created_at.format("%Y-%m-%d %H:%M:%S"),
                        record.stage,
                        record.input_tokens,
                        record.output_tokens,
                        record.cost_usd,
                    );
                }
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {other}");
                eprintln!("Usage: rootwise [--request <json> | --log <session_id>]");
                return Ok(());
            }
        }
    }

    run_repl(&engine).await
}

fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rootwise")
}

fn read_stdin() -> Result<String> {
    use std::io::Read;
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

/// Interactive cause-analysis conversation against a local session.
async fn run_repl(engine: &SessionEngine<'_>) -> Result<()> {
    use std::io;

    println!("rootwise - guided root-cause reflection");
    println!("=======================================");
    println!("Let's dig into one problem. Type 'quit' at any point to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let session_id = uuid::Uuid::new_v4().to_string();

    let pain_point = prompt_line(&stdin, &mut stdout, "What problem are you facing? ")?;
    if should_quit(&pain_point) {
        return Ok(());
    }
    let cause = prompt_line(&stdin, &mut stdout, "What do you think is causing it? ")?;
    if should_quit(&cause) {
        return Ok(());
    }

    let mut history: Vec<String> = Vec::new();
    loop {
        let request = StageRequest {
            user_id: "local".to_string(),
            session_id: session_id.clone(),
            stage: Stage::ConversationalCauseAnalysis,
            user_input: String::new(),
            context: json!({
                "cause": cause,
                "history": history,
                "painPoint": pain_point,
            })
            .as_object()
            .cloned()
            .unwrap_or_default(),
        };

        let reply = engine.respond(&request).await?;
        if !reply.success {
            if let Some(fallback) = reply.fallback {
                println!("\n{fallback}");
            }
            break;
        }

        if reply.is_complete == Some(true) {
            println!("\nPossible root causes:");
            for (i, option) in reply.root_cause_options.unwrap_or_default().iter().enumerate() {
                println!("  {}. {option}", i + 1);
            }
            break;
        }

        let question = reply.response.unwrap_or_default();
        println!("\n{question}");
        let answer = prompt_line(&stdin, &mut stdout, "> ")?;
        if should_quit(&answer) {
            break;
        }
        history.push(question);
        history.push(answer);
    }

    Ok(())
}

fn prompt_line(stdin: &std::io::Stdin, stdout: &mut std::io::Stdout, prompt: &str) -> Result<String> {
    use std::io::{BufRead, Write};
    print!("{prompt}");
    stdout.flush()?;
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn should_quit(line: &str) -> bool {
    line == "quit" || line == "exit"
}
