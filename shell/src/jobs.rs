use std::fmt::Display;

/// One process within a job, as recorded at spawn time.
#[derive(Clone, Debug)]
pub struct JobProcess {
    pub pid: u32,
    pub command: String,
}

/// A snapshot of one job, as consumed by `%` expansion. Execution-side
/// state (join handles, signalling) lives with the interpreter, not here.
#[derive(Clone, Debug)]
pub struct Job {
    pub id: usize,
    pub pgid: u32,
    pub command_line: String,
    pub processes: Vec<JobProcess>,
}

impl Job {
    pub fn new<S: Into<String>>(pgid: u32, command_line: S, processes: Vec<JobProcess>) -> Self {
        Self {
            id: 0,
            pgid,
            command_line: command_line.into(),
            processes,
        }
    }

    pub(crate) fn command_is_empty(&self) -> bool {
        self.command_line.is_empty()
    }
}

impl Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]\t{}", self.id, self.command_line)
    }
}

/// The job table. Not thread-safe by contract: it is owned by the main
/// thread and reached through the main-thread handle.
#[derive(Clone, Default)]
pub struct JobManager {
    jobs: Vec<Job>,
    pub last_background_pgid: Option<u32>,
}

impl JobManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut job: Job) -> &Job {
        let id = self.jobs.len() + 1;
        job.id = id;
        self.jobs.push(job);
        self.jobs.last().expect("job was just pushed")
    }

    pub fn job_get(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Job> {
        self.jobs.iter()
    }

    /// The most recently started job with a non-empty command line.
    pub fn most_recent(&self) -> Option<&Job> {
        self.jobs.iter().rev().find(|j| !j.command_is_empty())
    }
}
