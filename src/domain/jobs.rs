use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::StoreError;

/// Key prefix of one-off interval jobs.
pub const ONE_OFF_PREFIX: &str = "videos";
/// Key prefix of recurring weekly jobs.
pub const RECURRING_PREFIX: &str = "regular";
/// Key prefix of active-task markers.
pub const TASK_PREFIX: &str = "tasks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    OneOff,
    Recurring,
}

impl JobKind {
    pub fn prefix(self) -> &'static str {
        match self {
            JobKind::OneOff => ONE_OFF_PREFIX,
            JobKind::Recurring => RECURRING_PREFIX,
        }
    }
}

/// Composite job identity, rendered as `<prefix>:<name>:<index>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub kind: JobKind,
    pub name: String,
    pub index: usize,
}

impl JobKey {
    pub fn new(kind: JobKind, name: impl Into<String>, index: usize) -> Self {
        Self {
            kind,
            name: name.into(),
            index,
        }
    }

    /// Store key of this job's active-task marker.
    pub fn task_key(&self) -> String {
        format!("{}:{}", TASK_PREFIX, self)
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind.prefix(), self.name, self.index)
    }
}

impl FromStr for JobKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || StoreError::MalformedKey(s.to_string());
        let (prefix, rest) = s.split_once(':').ok_or_else(malformed)?;
        let kind = match prefix {
            ONE_OFF_PREFIX => JobKind::OneOff,
            RECURRING_PREFIX => JobKind::Recurring,
            _ => return Err(malformed()),
        };
        // Names may themselves contain ':', the index is always the last field.
        let (name, index) = rest.rsplit_once(':').ok_or_else(malformed)?;
        if name.is_empty() {
            return Err(malformed());
        }
        let index = index.parse().map_err(|_| malformed())?;
        Ok(JobKey::new(kind, name, index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Error,
    Completed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::Error => "error",
            JobStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// When a job records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schedule {
    OneOff {
        date_from: NaiveDateTime,
        date_to: NaiveDateTime,
    },
    /// `time_to < time_from` is a window crossing midnight.
    /// Weekdays count from Monday = 0.
    Recurring {
        time_from: NaiveTime,
        time_to: NaiveTime,
        days_of_week: Vec<u8>,
    },
}

impl Schedule {
    pub fn kind(&self) -> JobKind {
        match self {
            Schedule::OneOff { .. } => JobKind::OneOff,
            Schedule::Recurring { .. } => JobKind::Recurring,
        }
    }
}

fn default_segment_minutes() -> u32 {
    30
}

/// A persisted recording job, as stored under its `JobKey`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub rtsp_url: String,
    /// Output directory for this job's segments.
    pub path: PathBuf,
    /// Target frames per minute. `None` records at the camera's native rate.
    #[serde(default)]
    pub fpm: Option<f64>,
    pub status: JobStatus,
    #[serde(default)]
    pub with_audio: bool,
    #[serde(default = "default_segment_minutes")]
    pub segment_minutes: u32,
    #[serde(flatten)]
    pub schedule: Schedule,
}

impl Job {
    /// Target capture rate in frames per second.
    pub fn target_fps(&self) -> Option<f64> {
        self.fpm.filter(|fpm| *fpm > 0.0).map(|fpm| fpm / 60.0)
    }
}

/// Announces a finished segment, published once per segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 20)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn key_round_trips_through_display() {
        let key = JobKey::new(JobKind::Recurring, "gate", 2);
        assert_eq!(key.to_string(), "regular:gate:2");
        assert_eq!("regular:gate:2".parse::<JobKey>().unwrap(), key);
        assert_eq!(key.task_key(), "tasks:regular:gate:2");
    }

    #[test]
    fn key_name_may_contain_colons() {
        let key: JobKey = "videos:lab:east:0".parse().unwrap();
        assert_eq!(key.kind, JobKind::OneOff);
        assert_eq!(key.name, "lab:east");
        assert_eq!(key.index, 0);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        for raw in ["videos", "tasks:videos:a:0", "videos:a:x", "regular::1", "other:a:1"] {
            assert!(raw.parse::<JobKey>().is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn one_off_record_deserializes_from_store_json() {
        let json = r#"{
            "name": "cam1",
            "comment": "entrance",
            "rtsp_url": "rtsp://10.0.0.5/stream",
            "path": "records/cam1",
            "date_from": "2024-04-20T10:00:00",
            "date_to": "2024-04-20T12:00:00",
            "fpm": 60,
            "status": "queued"
        }"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert!(!job.with_audio);
        assert_eq!(job.segment_minutes, 30);
        assert_eq!(job.target_fps(), Some(1.0));
        assert_eq!(
            job.schedule,
            Schedule::OneOff {
                date_from: at(10, 0),
                date_to: at(12, 0)
            }
        );
    }

    #[test]
    fn recurring_record_deserializes_and_keeps_status_format() {
        let json = r#"{
            "name": "yard",
            "rtsp_url": "rtsp://cam/yard",
            "path": "records/yard",
            "time_from": "22:00:00",
            "time_to": "06:00:00",
            "days_of_week": [0, 4],
            "fpm": null,
            "status": "in_progress",
            "with_audio": true,
            "segment_minutes": 5
        }"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.schedule.kind(), JobKind::Recurring);
        assert_eq!(job.target_fps(), None);

        let back = serde_json::to_value(&job).unwrap();
        assert_eq!(back["status"], "in_progress");
        assert_eq!(back["time_from"], "22:00:00");
    }
}
