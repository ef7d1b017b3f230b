use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::env::ShellEnvironment;
use crate::error;
use crate::mainthread::MainThreadHandle;
use crate::patterns::WildcardMatcher;
use crate::procs::ProcessSource;

/// Captured output of a command substitution. `truncated` reports that the
/// subshell hit its output cap and the lines are incomplete.
#[derive(Clone, Debug, Default)]
pub struct SubshellOutput {
    pub lines: Vec<String>,
    pub truncated: bool,
}

/// The sub-shell runner used by command substitution. Implementations run
/// the source string and hand back its output split into lines; they are
/// expected to drain the subshell fully or report truncation.
#[async_trait]
pub trait SubshellExecutor: Send + Sync {
    async fn exec_subshell(&self, source: &str) -> Result<SubshellOutput, error::Error>;
}

/// Everything one expansion runs against. The environment is a read-only
/// snapshot by contract; the main-thread handle is the capability for
/// consulting the job table and history, and callers without one get the
/// reduced behavior (history missing, jobs not consulted).
pub struct ExpandContext<'a> {
    pub env: &'a ShellEnvironment,
    pub executor: &'a dyn SubshellExecutor,
    pub matcher: &'a dyn WildcardMatcher,
    pub processes: &'a dyn ProcessSource,
    pub main_thread: Option<MainThreadHandle>,
    pub working_dir: PathBuf,
    pub shell_pid: u32,
    pub cancel: CancellationToken,
}

impl<'a> ExpandContext<'a> {
    pub fn new(
        env: &'a ShellEnvironment,
        executor: &'a dyn SubshellExecutor,
        matcher: &'a dyn WildcardMatcher,
        processes: &'a dyn ProcessSource,
    ) -> Self {
        Self {
            env,
            executor,
            matcher,
            processes,
            main_thread: None,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            shell_pid: std::process::id(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_main_thread(mut self, handle: MainThreadHandle) -> Self {
        self.main_thread = Some(handle);
        self
    }

    pub fn with_working_dir<P: Into<PathBuf>>(mut self, working_dir: P) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
