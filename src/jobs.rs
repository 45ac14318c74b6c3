//! Registry of background jobs.
//!
//! A [`JobTable`] is created once per interpreter and survives every loop
//! iteration. Ids start at 1 and only ever grow, so `fg 3` can never hit a job
//! that reused the id of an earlier one.

use crate::process::{self, ChildStatus};
use log::{debug, warn};
use nix::unistd::Pid;
use std::collections::BTreeMap;
use std::fmt;

/// Shell-assigned job identifier, distinct from the OS process id.
pub type JobId = u32;

/// Longest command label stored for a job, in characters.
pub const JOB_LABEL_MAX: usize = 32;

/// Last observed state of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Running as far as the last poll could tell.
    Running,
    /// Stopped by a signal; `fg` resumes it.
    Stopped,
    /// Exited or was killed; waiting to be reported.
    Done,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobState::Running => "Running",
            JobState::Stopped => "Stopped",
            JobState::Done => "Done",
        })
    }
}

/// One tracked background process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub pid: Pid,
    pub name: String,
    pub state: JobState,
}

/// An id handed out before fork, completed once the child's pid is known.
#[must_use = "a reservation only becomes a job once attached to a pid and inserted"]
#[derive(Debug)]
pub struct JobReservation {
    id: JobId,
    name: String,
}

impl JobReservation {
    /// The id the job will carry once inserted.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Binds the reservation to the forked child.
    pub fn attach(self, pid: Pid) -> Job {
        Job {
            id: self.id,
            pid,
            name: self.name,
            state: JobState::Running,
        }
    }
}

/// What to do with a job once the shell has observed that it finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Drop the record the first time its exit is observed.
    #[default]
    RemoveOnObservedExit,
    /// Keep the record forever, marked [`JobState::Done`].
    RetainForever,
}

/// Background jobs keyed by id, plus the counter that hands out new ids.
#[derive(Debug)]
pub struct JobTable {
    jobs: BTreeMap<JobId, Job>,
    next_id: JobId,
    retention: RetentionPolicy,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

impl JobTable {
    /// Creates an empty table whose first job gets id 1.
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            jobs: BTreeMap::new(),
            next_id: 1,
            retention,
        }
    }

    /// Takes the next id. The id is consumed even if the reservation is dropped.
    pub fn reserve(&mut self, name: &str) -> JobReservation {
        let id = self.next_id;
        self.next_id += 1;
        JobReservation {
            id,
            name: name.chars().take(JOB_LABEL_MAX).collect(),
        }
    }

    /// Adds a job built from a reservation and returns its id.
    pub fn insert(&mut self, job: Job) -> JobId {
        let id = job.id;
        debug!("job [{}] {} started as pid {}", id, job.name, job.pid);
        self.jobs.insert(id, job);
        id
    }

    /// True when `id` has been handed out at some point, i.e. `1 <= id < next`.
    pub fn is_assigned(&self, id: JobId) -> bool {
        id >= 1 && id < self.next_id
    }

    /// Looks up a job that is still in the table.
    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// Number of records currently held, finished ones included.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Iterates over the records in id order without polling.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Overrides the recorded state. Unknown ids are ignored.
    pub fn set_state(&mut self, id: JobId, state: JobState) {
        if let Some(job) = self.jobs.get_mut(&id) {
            job.state = state;
        }
    }

    /// Records that the job's exit has been observed, honouring the retention policy.
    pub fn finish(&mut self, id: JobId) -> Option<Job> {
        match self.retention {
            RetentionPolicy::RemoveOnObservedExit => self.jobs.remove(&id),
            RetentionPolicy::RetainForever => {
                let job = self.jobs.get_mut(&id)?;
                job.state = JobState::Done;
                Some(job.clone())
            }
        }
    }

    /// Polls every unfinished job without blocking and updates its state.
    ///
    /// Finished children are reaped here and marked [`JobState::Done`]; they stay
    /// in the table until reported.
    pub fn refresh(&mut self) {
        for job in self.jobs.values_mut() {
            if job.state == JobState::Done {
                continue;
            }
            match process::poll(job.pid) {
                Ok(ChildStatus::Alive) => {}
                Ok(ChildStatus::Continued) => job.state = JobState::Running,
                Ok(ChildStatus::Stopped(_)) => job.state = JobState::Stopped,
                Ok(status) => {
                    debug!("job [{}] {} finished: {:?}", job.id, job.name, status);
                    job.state = JobState::Done;
                }
                Err(e) => warn!("cannot poll job [{}] (pid {}): {}", job.id, job.pid, e),
            }
        }
    }

    /// Refreshes the table and returns the jobs that are still alive.
    ///
    /// Jobs found finished are left out of the result and handed to
    /// [`JobTable::finish`].
    pub fn list(&mut self) -> Vec<Job> {
        self.refresh();
        let done: Vec<JobId> = self
            .jobs
            .values()
            .filter(|job| job.state == JobState::Done)
            .map(|job| job.id)
            .collect();
        for id in done {
            self.finish(id);
        }
        self.jobs
            .values()
            .filter(|job| job.state != JobState::Done)
            .cloned()
            .collect()
    }
}
