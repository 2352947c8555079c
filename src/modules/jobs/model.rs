use crate::infrastructure::library::VideoId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobCategory {
    Scan,
    Thumbnails,
    Cleanup,
    Transcode,
}

impl JobCategory {
    pub const ALL: [JobCategory; 4] = [
        JobCategory::Scan,
        JobCategory::Thumbnails,
        JobCategory::Cleanup,
        JobCategory::Transcode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobCategory::Scan => "scan",
            JobCategory::Thumbnails => "thumbnails",
            JobCategory::Cleanup => "cleanup",
            JobCategory::Transcode => "transcode",
        }
    }

    /// Status label reported on the wire while a job of this category runs.
    pub fn running_label(&self) -> &'static str {
        match self {
            JobCategory::Scan => "scanning",
            JobCategory::Thumbnails => "generating",
            JobCategory::Cleanup => "cleaning",
            JobCategory::Transcode => "transcoding",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            JobCategory::Scan => 0,
            JobCategory::Thumbnails => 1,
            JobCategory::Cleanup => 2,
            JobCategory::Transcode => 3,
        }
    }
}

impl fmt::Display for JobCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scan" => Ok(JobCategory::Scan),
            "thumbnails" | "thumbnail" => Ok(JobCategory::Thumbnails),
            "cleanup" => Ok(JobCategory::Cleanup),
            "transcode" => Ok(JobCategory::Transcode),
            other => Err(format!("unknown job category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Starting,
    Running,
    Error,
}

impl JobState {
    /// `Starting` and `Running` hold the slot; `Idle` and `Error` admit a new job.
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Starting | JobState::Running)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Inverse of the wire label. Any label other than the three fixed ones is
    /// a category specific running label.
    pub fn from_label(label: &str) -> Self {
        match label {
            "idle" => JobState::Idle,
            "starting" => JobState::Starting,
            "error" => JobState::Error,
            _ => JobState::Running,
        }
    }
}

/// Scan subtype. Travels inside the status message, not as its own field, so
/// a caller that reattaches after a reload has to recover it from the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    New,
    Full,
}

impl ScanKind {
    pub fn from_full_flag(full_scan: bool) -> Self {
        if full_scan { ScanKind::Full } else { ScanKind::New }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ScanKind::New => "New-only scan",
            ScanKind::Full => "Full scan",
        }
    }

    pub fn start_message(self) -> String {
        format!("{} started.", self.tag())
    }

    pub fn describe(self, detail: &str) -> String {
        format!("{}: {}", self.tag(), detail)
    }

    pub fn from_message(message: &str) -> Option<Self> {
        if message.contains(ScanKind::Full.tag()) {
            Some(ScanKind::Full)
        } else if message.contains(ScanKind::New.tag()) {
            Some(ScanKind::New)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSlot {
    pub category: JobCategory,
    pub state: JobState,
    pub message: String,
    pub progress: u64,
    pub total: u64,
    pub subject_id: Option<VideoId>,
    pub run_id: Option<Uuid>,
}

impl JobSlot {
    pub fn idle(category: JobCategory) -> Self {
        Self {
            category,
            state: JobState::Idle,
            message: String::new(),
            progress: 0,
            total: 0,
            subject_id: None,
            run_id: None,
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self.state {
            JobState::Idle => "idle",
            JobState::Starting => "starting",
            JobState::Running => self.category.running_label(),
            JobState::Error => "error",
        }
    }
}
