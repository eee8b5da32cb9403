//! recomate companion CLI
//!
//! Run with: cargo run
//! Set OPENAI_API_KEY to talk to a real model; without it every turn
//! uses the offline fallbacks.

use anyhow::Result;
use recomate::{CompanionConfig, CompanionSession, Emotion, HttpCompletionClient, TurnOutcome};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

type Session = CompanionSession<HttpCompletionClient>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let config_path = args
        .iter()
        .find_map(|a| a.strip_prefix("--config="))
        .map(PathBuf::from);
    let config = match &config_path {
        Some(path) => CompanionConfig::load(path)?,
        None => CompanionConfig::default(),
    };

    let positional: Vec<&str> = args[1..]
        .iter()
        .map(String::as_str)
        .filter(|a| !a.starts_with("--config="))
        .collect();

    match positional.first().copied() {
        Some("--show-config") => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Some("--subtopics") => {
            let topic = positional[1..].join(" ");
            if topic.is_empty() {
                eprintln!("Usage: recomate --subtopics <topic>");
                return Ok(());
            }
            let session = new_session(config)?;
            print_subtopics(&topic, &session.suggest_subtopics(&topic).await);
            Ok(())
        }
        Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some("--repl") | None => {
            let mut session = new_session(config)?;
            run_repl(&mut session).await
        }
        Some(other) => {
            eprintln!("Unknown argument: {}", other);
            print_usage();
            Ok(())
        }
    }
}

fn new_session(config: CompanionConfig) -> Result<Session> {
    let client = HttpCompletionClient::from_config(config.llm.clone());
    CompanionSession::new(config, client)
}

fn print_usage() {
    println!("Usage: recomate [--config=<path>] [COMMAND]");
    println!();
    println!("Commands:");
    println!("  --repl               Chat interactively (default)");
    println!("  --subtopics <topic>  Suggest conversation angles for a topic");
    println!("  --show-config        Print the effective configuration");
}

async fn run_repl(session: &mut Session) -> Result<()> {
    use std::io::{self, BufRead, Write};

    println!("recomate companion");
    println!("==================");
    println!("Topics: {}", session.bandit().topics().join(", "));
    if !session.has_backend() {
        println!("(no language model configured, replies use offline fallbacks)");
    }
    println!("Type a message, /help for commands, or 'quit' to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut emotion: Option<Emotion> = None;

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        if line.starts_with('/') {
            handle_command(session, line, &mut emotion).await?;
        } else {
            let turn = session.take_turn(line, emotion).await;
            print_turn(&turn);
        }
    }

    Ok(())
}

async fn handle_command(
    session: &mut Session,
    line: &str,
    emotion: &mut Option<Emotion>,
) -> Result<()> {
    let parts: Vec<&str> = line.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/stats" => {
            println!("{:<16} {:>6} {:>9} {:>9}", "TOPIC", "COUNT", "AVG", "EXPECTED");
            for (topic, stats) in session.stats() {
                println!(
                    "{:<16} {:>6} {:>9.3} {:>9.3}",
                    topic, stats.count, stats.average_reward, stats.expected_reward
                );
            }
            println!("Selections: {}", session.bandit().total_selections());
        }
        "/feel" => {
            if arg.is_empty() || arg == "none" {
                *emotion = None;
                println!("Emotion cleared");
            } else {
                match Emotion::parse(arg) {
                    Some(e) => {
                        *emotion = Some(e);
                        println!("Emotion set to {}", e);
                    }
                    None => println!("Unknown emotion: {}", arg),
                }
            }
        }
        "/subtopics" => {
            if arg.is_empty() {
                println!("Usage: /subtopics <topic>");
            } else {
                print_subtopics(arg, &session.suggest_subtopics(arg).await);
            }
        }
        "/explore" => {
            let (index, topic) = session.explore(&mut rand::thread_rng()).await;
            println!("Explorer suggests topic #{}: {}", index, topic);
        }
        "/history" => {
            for record in session.history() {
                println!(
                    "[{}] ({}) you: {}\n    me: {}",
                    record.timestamp.format("%H:%M:%S"),
                    record.topic,
                    record.user_text,
                    record.reply_text
                );
            }
        }
        "/json" => {
            println!("{}", serde_json::to_string_pretty(&session.stats())?);
        }
        "/help" => {
            println!("Commands:");
            println!("  <message>            Talk to the companion");
            println!("  /feel <emotion>      Set your current emotion");
            println!("                       (joy, sadness, anger, fear, calm, none)");
            println!("  /stats               Show per-topic bandit statistics");
            println!("  /json                Statistics as JSON");
            println!("  /subtopics <topic>   Suggest conversation angles");
            println!("  /explore             Ask the model to pick a topic");
            println!("  /history             Show this session's turns");
            println!("  quit                 Exit");
        }
        _ => {
            println!("Unknown command: {}. Type /help for commands.", cmd);
        }
    }

    Ok(())
}

fn print_turn(turn: &TurnOutcome) {
    println!("{}", turn.reply);
    println!(
        "   topic: {} (score {:.3} = {:.3} + {:.3}), reward {:.2}{}",
        turn.topic,
        turn.score.total,
        turn.score.exploitation,
        turn.score.exploration,
        turn.reward,
        if turn.reply_generated { "" } else { " [offline]" }
    );
    if !turn.subtopics.is_empty() {
        println!("   next: {}", turn.subtopics.join(" / "));
    }
    println!();
}

fn print_subtopics(topic: &str, subtopics: &[String]) {
    if subtopics.is_empty() {
        println!("No suggestions available for {}", topic);
        return;
    }
    println!("Angles for {}:", topic);
    for (i, subtopic) in subtopics.iter().enumerate() {
        println!("   {}. {}", i + 1, subtopic);
    }
}
