//! Events consumed by the supervisor's coordinating loop.

use std::path::PathBuf;

use crate::detector::StreamKind;

/// Everything that can wake the supervisor, besides child exit (which the
/// loop awaits on the child handle directly).
#[derive(Debug)]
pub enum SupervisorEvent {
    /// One line of child output, already echoed to the matching parent
    /// stream by the reader task. Tagged with the generation of the child
    /// that produced it, so lines a dying child emits during a restart can
    /// be told apart from the new child's output.
    Output {
        generation: u64,
        stream: StreamKind,
        line: String,
    },
    /// A qualifying file changed under the watch root.
    FileChanged(PathBuf),
    /// SIGINT or SIGTERM arrived; shut down gracefully.
    Shutdown,
}
