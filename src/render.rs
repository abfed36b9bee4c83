//! Terminal output for explanations and supervisor status lines.

use std::io::Write;
use std::time::Duration;

use colored::Colorize;
use tokio::task::JoinHandle;

use crate::backends::{BackendKind, Explanation};
use crate::config::Mode;

/// Print an explanation under a header built from the error's first line.
///
/// When the session runs in gemini mode but the body came from the pattern
/// backend, the header notes the fallback so the user can tell an offline
/// answer from a remote one.
pub fn print_explanation(error_text: &str, explanation: &Explanation, mode: Mode) {
    let width = textwrap::termwidth().min(100);
    let headline = error_text.lines().next().unwrap_or("").trim();

    println!();
    println!("{} {}", "●".red(), headline.bold());

    if mode == Mode::Gemini && explanation.source == BackendKind::Pattern {
        println!("  {}", "(offline explanation)".dimmed());
    }
    println!();

    for line in explanation.body.lines() {
        if line.trim().is_empty() {
            println!();
            continue;
        }
        for wrapped in textwrap::wrap(line, width.saturating_sub(2)) {
            println!("  {wrapped}");
        }
    }
    println!();
}

pub fn print_status(message: &str) {
    eprintln!("{} {}", "▸".blue(), message.dimmed());
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", "?".yellow(), message.yellow());
}

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Transient progress indicator shown while an explanation call is
/// outstanding. Aborted and erased on [`Spinner::stop`].
pub struct Spinner {
    handle: JoinHandle<()>,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        let message = message.to_string();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(80));
            let mut frame = 0usize;
            loop {
                interval.tick().await;
                eprint!(
                    "\r{} {} ",
                    SPINNER_FRAMES[frame % SPINNER_FRAMES.len()].cyan(),
                    message.dimmed()
                );
                std::io::stderr().flush().ok();
                frame += 1;
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
        eprint!("\r{}\r", " ".repeat(40));
        std::io::stderr().flush().ok();
    }
}
