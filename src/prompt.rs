//! Interactive confirmation prompt with asynchronous cancellation.
//!
//! One yes/no question per detected error. The prompt owns no global state:
//! cancellation arrives through a token created by the session, so a restart
//! can resolve a pending prompt immediately without blocking the supervisor.
//! Raw mode is held by a guard and restored on every exit path.

use std::io::Write;

use anyhow::{Context, Result};
use colored::Colorize;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use futures::StreamExt;
use tokio::sync::watch;

/// How a prompt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Yes,
    No,
    /// Ctrl+C arrived while the prompt held raw mode; the caller is expected
    /// to begin graceful shutdown.
    Interrupted,
    Cancelled,
}

/// Prompt lifecycle. At most one prompt per session may be in
/// `AwaitingInput`; the supervisor enforces this by cancelling any previous
/// token before starting a new flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    Idle,
    AwaitingInput,
    Resolved(bool),
    Cancelled,
}

impl PromptState {
    /// Idle -> AwaitingInput. Returns false from any other state.
    pub fn activate(&mut self) -> bool {
        if *self == PromptState::Idle {
            *self = PromptState::AwaitingInput;
            true
        } else {
            false
        }
    }

    /// AwaitingInput -> Resolved. Returns false if not awaiting.
    pub fn resolve(&mut self, yes: bool) -> bool {
        if *self == PromptState::AwaitingInput {
            *self = PromptState::Resolved(yes);
            true
        } else {
            false
        }
    }

    /// AwaitingInput -> Cancelled. Idempotent: cancelling an already
    /// cancelled or resolved prompt changes nothing.
    pub fn cancel(&mut self) {
        if *self == PromptState::AwaitingInput {
            *self = PromptState::Cancelled;
        }
    }
}

/// Owning side of a cancellation signal. Held by the session; dropping it
/// also cancels any token still waiting.
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

/// Cloneable handle a prompt (or any task) waits on.
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        // send() drops the value when no receiver is subscribed yet; a cancel
        // must stick even if it lands before the prompt task subscribes.
        let _ = self.tx.send_replace(true);
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when the source cancels or is dropped.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Restores cooked mode when dropped, whatever path left the prompt.
struct RawModeGuard;

impl RawModeGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw mode for prompt")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Ask a yes/no question, resolvable by a keystroke or by cancellation.
///
/// `y` answers yes; `n`, Enter, or Esc answer no (no is the safe default).
/// Ctrl+C is reported as [`PromptOutcome::Interrupted`] so the caller can
/// shut the session down; with raw mode held, the terminal never turns it
/// into a signal. Cancellation wins over any later keystroke.
pub async fn ask_confirm(question: &str, cancel: &mut CancelToken) -> Result<PromptOutcome> {
    let mut state = PromptState::Idle;
    if cancel.is_cancelled() {
        return Ok(PromptOutcome::Cancelled);
    }
    state.activate();

    eprint!(
        "{} {} {} ",
        "?".yellow().bold(),
        question.bold(),
        "[y/N]".dimmed()
    );
    std::io::stderr().flush().ok();

    let _guard = RawModeGuard::new()?;
    let mut events = EventStream::new();

    let outcome = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                state.cancel();
                break PromptOutcome::Cancelled;
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        match key.code {
                            KeyCode::Char('y' | 'Y') => {
                                state.resolve(true);
                                break PromptOutcome::Yes;
                            }
                            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                                state.resolve(false);
                                break PromptOutcome::Interrupted;
                            }
                            KeyCode::Char('n' | 'N') | KeyCode::Enter | KeyCode::Esc => {
                                state.resolve(false);
                                break PromptOutcome::No;
                            }
                            _ => {}
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => {
                        // Terminal input gone; treat as a declined prompt.
                        state.resolve(false);
                        break PromptOutcome::No;
                    }
                }
            }
        }
    };

    // Raw mode suppressed echo; finish the prompt line ourselves.
    match outcome {
        PromptOutcome::Yes => eprintln!("y\r"),
        PromptOutcome::No => eprintln!("n\r"),
        PromptOutcome::Interrupted | PromptOutcome::Cancelled => eprintln!("\r"),
    }
    Ok(outcome)
}
