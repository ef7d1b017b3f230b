pub mod abbreviation;
pub mod completion;
pub mod context;
pub mod env;
pub mod error;
pub mod escape;
pub mod expansion;
pub mod history;
pub mod jobs;
pub mod mainthread;
pub mod patterns;
pub mod procs;
mod users;
pub mod variables;

pub use abbreviation::{AbbrOp, Abbreviations, ABBR_VAR_PREFIX};
pub use completion::{CompleteFlags, Completion};
pub use context::{ExpandContext, SubshellExecutor, SubshellOutput};
pub use env::ShellEnvironment;
pub use error::{Error, ParseError, ParseErrorKind, ParseErrorList};
pub use expansion::{
    expand_one, expand_string, expand_tilde, fish_xdm_login_hack,
    replace_home_directory_with_tilde, ExpandFlags, ExpandResult,
};
pub use history::HistoryStore;
pub use jobs::{Job, JobManager, JobProcess};
pub use mainthread::{MainThreadHandle, MainThreadService, MainThreadState};
pub use patterns::{FsWildcardMatcher, WildcardMatcher, WildcardResult};
pub use procs::{system_process_source, NullProcessSource, ProcessInfo, ProcessSource};
pub use variables::ShellValue;
