//! Process supervision: child lifecycle, output classification, debounced
//! error triggers, and the prompt/explanation pipeline.
//!
//! One coordinating loop selects over child exit, child output lines,
//! watcher change events, and OS signals. The child-process handle and the
//! watch handle are owned here exclusively; nothing else mutates them.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use notify::RecommendedWatcher;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::backends::Explanation;
use crate::config::{Config, Mode};
use crate::detector::{ErrorDetector, ErrorEvent, StreamKind};
use crate::event::SupervisorEvent;
use crate::prompt::{self, CancelSource, PromptOutcome};
use crate::render::{self, Spinner};
use crate::router::Router;
use crate::watcher::{self, IgnoreFilter};

/// Environment marker set on the child so it can opt into cooperative error
/// reporting when supervised.
pub const ACTIVE_MARKER: &str = "VIGIL_ACTIVE";

/// Minimum spacing between accepted error triggers. Collapses a burst of
/// related stderr lines (a full stack trace, say) into one explanation cycle.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// How long a child gets to exit after SIGTERM before SIGKILL.
const GRACE_WINDOW: Duration = Duration::from_secs(2);

/// Pause between tearing the old child down and launching the new one.
const RESTART_SETTLE: Duration = Duration::from_millis(100);

/// Cap on buffered error lines between explanations.
const MAX_BUFFERED_LINES: usize = 50;

/// What to run: `<runtime> <script> [args...]`.
#[derive(Debug, Clone)]
pub struct Target {
    pub runtime: String,
    pub script: PathBuf,
    pub args: Vec<String>,
}

/// Trigger-spacing state, separated out so the acceptance rule is testable
/// without a child process.
pub(crate) struct Debounce {
    window: Duration,
    last: Option<Instant>,
}

impl Debounce {
    fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Accept a candidate trigger at `now`, recording it, or suppress it if
    /// the previous accepted trigger was less than the window ago. Acceptance
    /// is recorded before the pipeline runs, so spacing is measured between
    /// accepted triggers, not between completions.
    fn accept(&mut self, now: Instant) -> bool {
        match self.last {
            Some(prev) if now.duration_since(prev) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

enum LoopStep {
    ChildExited(std::io::Result<std::process::ExitStatus>),
    Event(Option<SupervisorEvent>),
}

/// Owns one supervised session from start to shutdown.
pub struct Supervisor {
    config: Config,
    target: Target,
    detector: ErrorDetector,
    router: Arc<Router>,
    auto_confirm: bool,
    quiet: bool,

    child: Option<Child>,
    watcher: Option<RecommendedWatcher>,
    events_tx: mpsc::UnboundedSender<SupervisorEvent>,
    events_rx: mpsc::UnboundedReceiver<SupervisorEvent>,
    restarting: bool,
    exiting: bool,
    debounce: Debounce,
    error_buffer: Vec<String>,
    prompt_cancel: Option<CancelSource>,
    /// Incremented on every child launch; output events carry the generation
    /// of the child that produced them.
    generation: u64,
    triggers_accepted: u64,
}

impl Supervisor {
    pub fn new(config: Config, target: Target, auto_confirm: bool, quiet: bool) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let router = Arc::new(Router::new(&config));
        Self {
            config,
            target,
            detector: ErrorDetector::new(),
            router,
            auto_confirm,
            quiet,
            child: None,
            watcher: None,
            events_tx,
            events_rx,
            restarting: false,
            exiting: false,
            debounce: Debounce::new(DEBOUNCE_WINDOW),
            error_buffer: Vec::new(),
            prompt_cancel: None,
            generation: 0,
            triggers_accepted: 0,
        }
    }

    /// Run the session until shutdown. Child failures never end the session;
    /// only a signal (or event-channel closure) does.
    pub async fn run(&mut self) -> Result<()> {
        if self.config.auto_restart {
            let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            let filter = IgnoreFilter::new(root.clone(), &self.config.ignore_patterns)?;
            self.watcher = Some(watcher::spawn(&root, filter, self.events_tx.clone())?);
        }
        spawn_signal_listener(self.events_tx.clone());

        self.start().await;

        loop {
            let step = {
                let has_child = self.child.is_some();
                let child = &mut self.child;
                let events = &mut self.events_rx;
                tokio::select! {
                    status = async {
                        child.as_mut().expect("guarded by branch condition").wait().await
                    }, if has_child => LoopStep::ChildExited(status),
                    event = events.recv() => LoopStep::Event(event),
                }
            };

            match step {
                LoopStep::ChildExited(status) => {
                    self.child = None;
                    self.on_child_exit(status);
                }
                LoopStep::Event(Some(SupervisorEvent::Output {
                    generation,
                    stream,
                    line,
                })) => {
                    self.on_output_event(generation, stream, line);
                }
                LoopStep::Event(Some(SupervisorEvent::FileChanged(path))) => {
                    if self.config.auto_restart {
                        self.restart(&format!("file changed: {}", path.display()))
                            .await;
                    }
                }
                LoopStep::Event(Some(SupervisorEvent::Shutdown)) => {
                    self.exiting = true;
                    if !self.quiet {
                        if self.triggers_accepted > 0 {
                            render::print_status(&format!(
                                "shutting down ({} error event{} handled)",
                                self.triggers_accepted,
                                if self.triggers_accepted == 1 { "" } else { "s" }
                            ));
                        } else {
                            render::print_status("shutting down");
                        }
                    }
                    self.stop().await;
                    break;
                }
                LoopStep::Event(None) => break,
            }
        }
        Ok(())
    }

    /// Launch the child, stopping any previous one first. A spawn failure is
    /// an immediate error event, not a session failure.
    async fn start(&mut self) {
        if self.child.is_some() {
            self.terminate_child().await;
        }

        let mut cmd = Command::new(&self.target.runtime);
        cmd.arg(&self.target.script)
            .args(&self.target.args)
            .env(ACTIVE_MARKER, "1")
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        match cmd.spawn() {
            Ok(mut child) => {
                self.generation += 1;
                if let Some(stdout) = child.stdout.take() {
                    spawn_reader(
                        stdout,
                        self.generation,
                        StreamKind::Stdout,
                        self.events_tx.clone(),
                    );
                }
                if let Some(stderr) = child.stderr.take() {
                    spawn_reader(
                        stderr,
                        self.generation,
                        StreamKind::Stderr,
                        self.events_tx.clone(),
                    );
                }
                if !self.quiet {
                    render::print_status(&format!(
                        "running `{} {}`",
                        self.target.runtime,
                        self.target.script.display()
                    ));
                }
                self.child = Some(child);
            }
            Err(err) => {
                let message = format!(
                    "Error: failed to launch {} {}: {err}",
                    self.target.runtime,
                    self.target.script.display()
                );
                render::print_warning(&message);
                self.trigger(StreamKind::Stderr, Some(message));
            }
        }
    }

    /// Restart the child. No-op while another restart is in progress. Any
    /// pending prompt is cancelled first so a stale question never survives
    /// into the new run.
    pub async fn restart(&mut self, reason: &str) {
        if self.restarting {
            return;
        }
        self.restarting = true;

        if let Some(source) = self.prompt_cancel.take() {
            source.cancel();
        }
        if !self.quiet {
            render::print_status(&format!("restarting ({reason})"));
        }

        self.terminate_child().await;
        tokio::time::sleep(RESTART_SETTLE).await;

        self.error_buffer.clear();
        self.restarting = false;
        self.start().await;
    }

    /// Tear down the watch and terminate the child. Used for final shutdown;
    /// afterwards no watch or process remains.
    pub async fn stop(&mut self) {
        self.watcher = None;
        if let Some(source) = self.prompt_cancel.take() {
            source.cancel();
        }
        self.terminate_child().await;
    }

    /// SIGTERM, wait out the grace window, then SIGKILL if still alive.
    async fn terminate_child(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        #[cfg(unix)]
        if let Some(pid) = child.id() {
            // SAFETY: plain kill(2) on a pid we own; no memory concerns.
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
            if tokio::time::timeout(GRACE_WINDOW, child.wait()).await.is_ok() {
                return;
            }
            if !self.quiet {
                render::print_status("process did not exit in time, killing");
            }
        }

        let _ = child.kill().await;
    }

    /// Output event from the loop. Lines produced by a previous child (its
    /// reader task may still be draining the pipe after a restart) are
    /// dropped so a dying child's last gasp never raises a prompt in the new
    /// run.
    fn on_output_event(&mut self, generation: u64, stream: StreamKind, line: String) {
        if generation != self.generation {
            return;
        }
        self.on_output(stream, line);
    }

    fn on_output(&mut self, stream: StreamKind, line: String) {
        if !self.detector.is_error_output(&line) {
            return;
        }
        self.error_buffer.push(line);
        if self.error_buffer.len() > MAX_BUFFERED_LINES {
            let excess = self.error_buffer.len() - MAX_BUFFERED_LINES;
            self.error_buffer.drain(..excess);
        }
        self.trigger(stream, None);
    }

    fn on_child_exit(&mut self, status: std::io::Result<std::process::ExitStatus>) {
        if self.restarting || self.exiting {
            return;
        }
        let status = match status {
            Ok(status) => status,
            Err(err) => {
                render::print_warning(&format!("failed to reap process: {err}"));
                return;
            }
        };

        match status.code() {
            Some(0) => {
                if !self.quiet {
                    render::print_status("clean exit, waiting for file changes");
                }
            }
            Some(code) => {
                render::print_warning(&format!("process exited with code {code}"));
                self.trigger(
                    StreamKind::Stderr,
                    Some(format!("process exited with code {code}")),
                );
            }
            None => {
                // Terminated by a signal: logged, not treated as an
                // application error.
                #[cfg(unix)]
                {
                    use std::os::unix::process::ExitStatusExt;
                    if let Some(signal) = status.signal() {
                        if !self.quiet {
                            render::print_status(&format!("process terminated by signal {signal}"));
                        }
                        return;
                    }
                }
                if !self.quiet {
                    render::print_status("process terminated by signal");
                }
            }
        }
    }

    /// Candidate error trigger. Suppressed while exiting or restarting, and
    /// debounced against the previous accepted trigger. On acceptance,
    /// cancels any pending prompt (at most one active flow per session) and
    /// dispatches the prompt/explanation pipeline.
    fn trigger(&mut self, stream: StreamKind, fallback_text: Option<String>) {
        if self.exiting || self.restarting {
            return;
        }
        if !self.debounce.accept(Instant::now()) {
            return;
        }

        let mut text = self.error_buffer.join("\n");
        self.error_buffer.clear();
        if text.trim().is_empty() {
            match fallback_text {
                Some(fallback) => text = fallback,
                None => return,
            }
        }
        self.triggers_accepted += 1;

        if let Some(source) = self.prompt_cancel.take() {
            source.cancel();
        }
        let source = CancelSource::new();
        let mut token = source.token();
        self.prompt_cancel = Some(source);

        let event = ErrorEvent::new(text, stream);
        let router = Arc::clone(&self.router);
        let events = self.events_tx.clone();
        let mode = self.config.mode;
        let auto_confirm = self.auto_confirm;

        // The pipeline runs off the coordinating loop so a restart can land
        // while we wait on the user or the network. A restart cancels the
        // prompt; a remote call already dispatched is not aborted, and its
        // result is still printed when it arrives (it gates nothing).
        tokio::spawn(async move {
            let outcome = if auto_confirm {
                PromptOutcome::Yes
            } else {
                prompt::ask_confirm("Explain this error?", &mut token)
                    .await
                    .unwrap_or(PromptOutcome::No)
            };
            run_pipeline(outcome, &router, &event.text, mode, &events).await;
        });
    }
}

/// Act on a resolved prompt. An interrupt becomes a shutdown event; anything
/// else feeds [`explain_if_confirmed`] and renders its result.
async fn run_pipeline(
    outcome: PromptOutcome,
    router: &Router,
    error_text: &str,
    mode: Mode,
    events: &mpsc::UnboundedSender<SupervisorEvent>,
) {
    if outcome == PromptOutcome::Interrupted {
        let _ = events.send(SupervisorEvent::Shutdown);
        return;
    }
    match explain_if_confirmed(router, error_text, outcome).await {
        Some(Ok(explanation)) => render::print_explanation(error_text, &explanation, mode),
        Some(Err(err)) => render::print_warning(&format!("could not explain error: {err}")),
        None => {}
    }
}

/// Consult the router only on an explicit yes. A declined or cancelled
/// prompt produces nothing: no explanation, no backend call.
async fn explain_if_confirmed(
    router: &Router,
    error_text: &str,
    outcome: PromptOutcome,
) -> Option<Result<Explanation>> {
    if outcome != PromptOutcome::Yes {
        return None;
    }
    let spinner = Spinner::start("explaining");
    let result = router.explain(error_text).await;
    spinner.stop();
    Some(result)
}

fn spawn_reader<R>(
    reader: R,
    generation: u64,
    stream: StreamKind,
    tx: mpsc::UnboundedSender<SupervisorEvent>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            // Echo the child's output to the matching parent stream.
            match stream {
                StreamKind::Stdout => println!("{line}"),
                StreamKind::Stderr => eprintln!("{line}"),
            }
            let event = SupervisorEvent::Output {
                generation,
                stream,
                line,
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    });
}

fn spawn_signal_listener(tx: mpsc::UnboundedSender<SupervisorEvent>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    let _ = tx.send(SupervisorEvent::Shutdown);
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        let _ = tx.send(SupervisorEvent::Shutdown);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_supervisor() -> Supervisor {
        let target = Target {
            runtime: "/nonexistent/vigil-test-runtime".to_string(),
            script: PathBuf::from("app.js"),
            args: vec![],
        };
        let config = Config {
            auto_restart: false,
            ..Config::default()
        };
        Supervisor::new(config, target, false, true)
    }

    #[test]
    fn test_debounce_accepts_first_trigger() {
        let mut debounce = Debounce::new(Duration::from_millis(500));
        assert!(debounce.accept(Instant::now()));
    }

    #[test]
    fn test_debounce_suppresses_within_window() {
        let mut debounce = Debounce::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(debounce.accept(t0));
        assert!(!debounce.accept(t0 + Duration::from_millis(100)));
        assert!(!debounce.accept(t0 + Duration::from_millis(499)));
    }

    #[test]
    fn test_debounce_accepts_after_window() {
        let mut debounce = Debounce::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(debounce.accept(t0));
        assert!(debounce.accept(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn test_debounce_measured_from_acceptance() {
        // Suppressed candidates must not push the window forward.
        let mut debounce = Debounce::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(debounce.accept(t0));
        assert!(!debounce.accept(t0 + Duration::from_millis(400)));
        assert!(debounce.accept(t0 + Duration::from_millis(600)));
    }

    #[tokio::test]
    async fn test_burst_of_error_lines_dispatches_one_pipeline() {
        let mut supervisor = test_supervisor();
        supervisor.on_output(StreamKind::Stderr, "Error: first".to_string());
        supervisor.on_output(StreamKind::Stderr, "Error: second".to_string());
        supervisor.on_output(StreamKind::Stderr, "Error: third".to_string());
        assert_eq!(supervisor.triggers_accepted, 1);
    }

    #[tokio::test]
    async fn test_trigger_suppressed_while_exiting() {
        let mut supervisor = test_supervisor();
        supervisor.exiting = true;
        supervisor.on_output(StreamKind::Stderr, "Error: boom".to_string());
        assert_eq!(supervisor.triggers_accepted, 0);
        assert!(supervisor.prompt_cancel.is_none());
    }

    #[tokio::test]
    async fn test_trigger_discarded_while_restart_in_flight() {
        let mut supervisor = test_supervisor();
        supervisor.restarting = true;
        supervisor.on_output(StreamKind::Stderr, "Error: boom".to_string());
        assert_eq!(supervisor.triggers_accepted, 0);
    }

    #[tokio::test]
    async fn test_non_error_output_never_triggers() {
        let mut supervisor = test_supervisor();
        supervisor.on_output(StreamKind::Stdout, "listening on :3000".to_string());
        assert_eq!(supervisor.triggers_accepted, 0);
        assert!(supervisor.error_buffer.is_empty());
    }

    #[tokio::test]
    async fn test_stale_output_after_restart_is_dropped() {
        // `true` exists everywhere, takes no interest in its args, and exits
        // cleanly, so the relaunch inside restart() succeeds.
        let target = Target {
            runtime: "true".to_string(),
            script: PathBuf::from("ignored.js"),
            args: vec![],
        };
        let config = Config {
            auto_restart: false,
            ..Config::default()
        };
        let mut supervisor = Supervisor::new(config, target, false, true);
        let stale_generation = supervisor.generation;

        supervisor.restart("file changed").await;
        supervisor.on_output_event(
            stale_generation,
            StreamKind::Stderr,
            "Error: old child dying".to_string(),
        );

        assert_eq!(supervisor.triggers_accepted, 0);
        assert!(supervisor.prompt_cancel.is_none());
    }

    #[tokio::test]
    async fn test_current_generation_output_still_triggers() {
        let mut supervisor = test_supervisor();
        let generation = supervisor.generation;
        supervisor.on_output_event(generation, StreamKind::Stderr, "Error: boom".to_string());
        assert_eq!(supervisor.triggers_accepted, 1);
    }

    #[tokio::test]
    async fn test_declined_prompt_never_reaches_router() {
        let router = Router::new(&Config::default());
        let declined = explain_if_confirmed(&router, "Error: boom", PromptOutcome::No).await;
        assert!(declined.is_none());

        let cancelled =
            explain_if_confirmed(&router, "Error: boom", PromptOutcome::Cancelled).await;
        assert!(cancelled.is_none());
    }

    #[tokio::test]
    async fn test_confirmed_prompt_produces_explanation() {
        let router = Router::new(&Config::default());
        let result = explain_if_confirmed(&router, "TypeError: boom", PromptOutcome::Yes)
            .await
            .expect("yes must consult the router")
            .expect("pattern tier is total");
        assert!(!result.body.is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_during_prompt_forwards_shutdown() {
        let router = Router::new(&Config::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        run_pipeline(
            PromptOutcome::Interrupted,
            &router,
            "Error: boom",
            Mode::Normal,
            &tx,
        )
        .await;

        assert!(matches!(rx.try_recv(), Ok(SupervisorEvent::Shutdown)));
    }

    #[tokio::test]
    async fn test_restart_cancels_pending_prompt() {
        let mut supervisor = test_supervisor();
        supervisor.on_output(StreamKind::Stderr, "Error: boom".to_string());
        let token = supervisor
            .prompt_cancel
            .as_ref()
            .expect("trigger should have opened a prompt flow")
            .token();

        supervisor.restart("test").await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_restart_is_idempotent_under_reentry() {
        let mut supervisor = test_supervisor();
        supervisor.restarting = true;
        // Must return without touching anything while a restart is in
        // progress.
        supervisor.restart("again").await;
        assert!(supervisor.restarting);
        assert!(supervisor.child.is_none());
    }

    #[tokio::test]
    async fn test_second_restart_after_cancel_is_safe() {
        let mut supervisor = test_supervisor();
        supervisor.on_output(StreamKind::Stderr, "Error: boom".to_string());
        supervisor.restart("first").await;
        supervisor.restart("second").await;
        assert!(!supervisor.restarting);
    }

    #[tokio::test]
    async fn test_signal_only_exit_is_not_an_error() {
        let mut supervisor = test_supervisor();
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            let status = std::process::ExitStatus::from_raw(libc::SIGKILL);
            supervisor.on_child_exit(Ok(status));
            assert_eq!(supervisor.triggers_accepted, 0);
        }
        let _ = &mut supervisor;
    }

    #[tokio::test]
    async fn test_nonzero_exit_feeds_error_path() {
        let mut supervisor = test_supervisor();
        supervisor.auto_confirm = false;
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            // Raw wait status 0x100 is exit code 1.
            let status = std::process::ExitStatus::from_raw(0x100);
            supervisor.on_child_exit(Ok(status));
            assert_eq!(supervisor.triggers_accepted, 1);
        }
        let _ = &mut supervisor;
    }

    #[tokio::test]
    async fn test_clean_exit_triggers_nothing() {
        let mut supervisor = test_supervisor();
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            let status = std::process::ExitStatus::from_raw(0);
            supervisor.on_child_exit(Ok(status));
            assert_eq!(supervisor.triggers_accepted, 0);
        }
        let _ = &mut supervisor;
    }
}
