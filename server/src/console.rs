//! Administrative commands read from stdin on their own thread.
//!
//! The console shares nothing with the tick loop except the running flag.

use log::{error, info};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

const HELP: &str = "commands: help, uptime, shutdown (or quit, exit)";

pub struct ConsoleCommands {
    running: Arc<AtomicBool>,
    started: Instant,
}

impl ConsoleCommands {
    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self {
            running,
            started: Instant::now(),
        }
    }

    /// Runs one command line and returns the text to print.
    pub fn execute(&self, line: &str) -> String {
        let command = line.trim().to_ascii_lowercase();
        match command.as_str() {
            "" => String::new(),
            "help" | "?" => HELP.to_string(),
            "uptime" => {
                let secs = self.started.elapsed().as_secs();
                format!(
                    "up {}h {}m {}s",
                    secs / 3600,
                    (secs / 60) % 60,
                    secs % 60
                )
            }
            "shutdown" | "quit" | "exit" => {
                self.running.store(false, Ordering::Release);
                "shutting down".to_string()
            }
            other => format!("unknown command `{other}`, try `help`"),
        }
    }

    fn run<R: BufRead>(self, input: R) {
        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("Console input failed: {}", e);
                    break;
                }
            };
            let output = self.execute(&line);
            if !output.is_empty() {
                let mut stdout = io::stdout().lock();
                let _ = writeln!(stdout, "{output}");
            }
            if !self.running.load(Ordering::Acquire) {
                return;
            }
        }
        info!("Console input closed; server keeps running");
    }
}

/// Starts the console thread on stdin.
pub fn spawn_console(running: Arc<AtomicBool>) -> io::Result<JoinHandle<()>> {
    let console = ConsoleCommands::new(running);
    thread::Builder::new()
        .name("console".into())
        .spawn(move || console.run(io::stdin().lock()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_commands() {
        let running = Arc::new(AtomicBool::new(true));
        let console = ConsoleCommands::new(Arc::clone(&running));

        assert_eq!(console.execute("help"), HELP);
        assert!(console.execute(" UPTIME ").starts_with("up 0h 0m"));
        assert!(console.execute("dance").contains("unknown command `dance`"));
        assert!(running.load(Ordering::Acquire));

        assert_eq!(console.execute("quit"), "shutting down");
        assert!(!running.load(Ordering::Acquire));
    }

    #[test]
    fn test_end_of_input_keeps_server_running() {
        let running = Arc::new(AtomicBool::new(true));
        ConsoleCommands::new(Arc::clone(&running)).run(Cursor::new("help\nuptime\n"));
        assert!(running.load(Ordering::Acquire));
    }

    #[test]
    fn test_shutdown_line_stops_reading() {
        let running = Arc::new(AtomicBool::new(true));
        ConsoleCommands::new(Arc::clone(&running)).run(Cursor::new("exit\nhelp\n"));
        assert!(!running.load(Ordering::Acquire));
    }
}
