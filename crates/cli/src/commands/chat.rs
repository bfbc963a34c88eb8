//! `veritas chat` — Interactive or single-claim verification.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use veritas_agent::{Session, TurnEvent, TurnOrchestrator, TurnPhase};
use veritas_core::error::TurnError;

const INDICATOR: &str = "  Analyzing web data...";
const EXIT_COMMANDS: [&str; 5] = ["exit", "quit", "/exit", "/quit", ":q"];

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let orchestrator = super::build_orchestrator(&config)?;
    let mut session = Session::new();

    if let Some(msg) = message {
        // Single message mode
        let msg = msg.trim();
        if msg.is_empty() {
            return Err("Nothing to verify: the message is empty".into());
        }
        // The failure has already been rendered; only the exit status is left
        return Ok(match run_turn(&orchestrator, &mut session, msg, "").await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::debug!(kind = e.kind(), "Turn failed");
                ExitCode::FAILURE
            }
        });
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Veritas — Real-Time Fact Checker       ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Search:    {}", config.search.api_url);
    println!("  Model:     {}", orchestrator.model());
    println!("  Session:   {}", session.id);
    println!();
    println!("  Type a claim and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&input) {
            break;
        }

        // A failed turn is reported and the session keeps going
        if let Err(e) = run_turn(&orchestrator, &mut session, input, "  Veritas > ").await {
            tracing::debug!(kind = e.kind(), "Turn failed");
        }
        println!();
    }

    println!("\n  Goodbye.");
    Ok(ExitCode::SUCCESS)
}

/// Run one turn, rendering its events as they arrive.
async fn run_turn(
    orchestrator: &TurnOrchestrator,
    session: &mut Session,
    input: &str,
    prefix: &'static str,
) -> Result<(), TurnError> {
    let (tx, rx) = mpsc::channel(64);
    let printer = tokio::spawn(render(rx, prefix));

    let result = orchestrator.process_turn(session, input, Some(&tx)).await;
    drop(tx);
    let _ = printer.await;

    result.map(|_| ())
}

async fn render(mut rx: mpsc::Receiver<TurnEvent>, prefix: &'static str) {
    let mut indicator_shown = false;
    let mut started = false;
    let mut stdout = std::io::stdout();

    let clear_indicator = |shown: &mut bool| {
        if std::mem::take(shown) {
            eprint!("\r{}\r", " ".repeat(INDICATOR.len()));
        }
    };

    while let Some(event) = rx.recv().await {
        match event {
            TurnEvent::Phase {
                phase: TurnPhase::Searching,
            } => {
                eprint!("{INDICATOR}");
                indicator_shown = true;
            }
            TurnEvent::Chunk { content } => {
                if !started {
                    clear_indicator(&mut indicator_shown);
                    print!("{prefix}");
                    started = true;
                }
                print!("{content}");
                let _ = stdout.flush();
            }
            TurnEvent::Committed { .. } => {
                clear_indicator(&mut indicator_shown);
                println!();
            }
            TurnEvent::Error { message, .. } => {
                clear_indicator(&mut indicator_shown);
                if started {
                    println!();
                }
                eprintln!("  System Error: {message}");
            }
            _ => {}
        }
    }
}
