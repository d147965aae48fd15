// src/cli/console.rs
// Interactive client: stdin commands against a running endpoint

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::client::{BlackoutOverlay, HttpMealApi, MealSession, SessionEvent, ShellBridge};
use crate::settings::AppSettings;

use super::meals::format_meals;
use super::CliError;

const HELP: &str = "Commands: eat <row> [person] | undo | refresh | list | blackout | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Eat { row: u32, person: Option<String> },
    Undo,
    Refresh,
    List,
    Blackout,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(HELP.to_string());
    };
    let command = match verb.to_ascii_lowercase().as_str() {
        "eat" => {
            let row = words
                .next()
                .ok_or_else(|| "usage: eat <row> [person]".to_string())?
                .parse::<u32>()
                .map_err(|_| "row must be a number".to_string())?;
            ConsoleCommand::Eat { row, person: words.next().map(str::to_string) }
        }
        "undo" => ConsoleCommand::Undo,
        "refresh" => ConsoleCommand::Refresh,
        "list" | "ls" => ConsoleCommand::List,
        "blackout" => ConsoleCommand::Blackout,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{}'. {}", other, HELP)),
    };
    Ok(command)
}

pub async fn run(settings: &AppSettings, url: Option<String>) -> Result<(), CliError> {
    let url = url.unwrap_or_else(|| settings.client.server_url.clone());
    println!("Connecting to {}", url);

    let api = Arc::new(HttpMealApi::new(url));
    let (session, mut events) = MealSession::new(api, settings.client.undo_window());
    let overlay = BlackoutOverlay::new();

    if let Err(e) = session.refresh().await {
        warn!("initial refresh failed: {}", e);
        println!("Could not load meals: {}", e);
    }
    print!("{}", format_meals(&session.meals()));
    println!("{}", HELP);

    let poller = session.spawn_poller(settings.client.poll_interval());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            Some(event) = events.recv() => {
                print_event(event);
                continue;
            }
        };
        let Some(line) = line else { break };

        // any input while blacked out is a tap on the overlay
        if overlay.wake() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };
        match command {
            ConsoleCommand::Eat { row, person } => match session.eat(row, person.as_deref()) {
                Ok(_) => println!(
                    "Row {} decremented. 'undo' within {}s to take it back.",
                    row, settings.client.undo_window_secs
                ),
                Err(e) => println!("{}", e),
            },
            ConsoleCommand::Undo => match session.undo_last() {
                Ok(_) => println!("Undone."),
                Err(e) => println!("{}", e),
            },
            ConsoleCommand::Refresh => match session.refresh().await {
                Ok(()) => print!("{}", format_meals(&session.meals())),
                Err(e) => println!("Refresh failed: {}", e),
            },
            ConsoleCommand::List => print!("{}", format_meals(&session.meals())),
            ConsoleCommand::Blackout => overlay.toggle_blackout(),
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => break,
        }
    }

    poller.abort();
    session.flush().await;
    while let Ok(event) = events.try_recv() {
        print_event(event);
    }
    Ok(())
}

fn print_event(event: SessionEvent) {
    match event {
        SessionEvent::Refreshed { meals } => debug!("refreshed {} meal(s)", meals),
        SessionEvent::Committed { row, .. } => println!("Saved row {}.", row),
        SessionEvent::Notice { message, .. } => println!("{}", message),
        SessionEvent::RolledBack { row, message, .. } => {
            println!("Could not update row {}: {}. Change undone.", row, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command("eat 4 nathan"),
            Ok(ConsoleCommand::Eat { row: 4, person: Some("nathan".to_string()) })
        );
        assert_eq!(parse_command("  EAT 2 "), Ok(ConsoleCommand::Eat { row: 2, person: None }));
        assert_eq!(parse_command("undo"), Ok(ConsoleCommand::Undo));
        assert_eq!(parse_command("q"), Ok(ConsoleCommand::Quit));
        assert_eq!(parse_command("blackout"), Ok(ConsoleCommand::Blackout));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("eat").is_err());
        assert!(parse_command("eat two").is_err());
        assert!(parse_command("dance").unwrap_err().starts_with("unknown command 'dance'"));
        assert!(parse_command("").is_err());
    }
}
