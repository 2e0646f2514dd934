//! Job submission: validates requests and writes one queued record per
//! interval. This is what the HTTP layer calls into.

use crate::domain::jobs::{Job, JobKey, JobKind, JobStatus, Schedule};
use crate::error::{StoreError, SubmissionError};
use crate::ports::clock::Clock;
use crate::ports::store::JobStore;
use chrono::{NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

const MAX_NAME: usize = 100;
const MAX_PATH: usize = 100;
const MAX_COMMENT: usize = 500;
const MAX_URL: usize = 200;
const CONFIG_FLAGS: [&str; 1] = ["audio"];

/// Fields shared by both request kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordBase {
    #[serde(default)]
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub rtsp_url: String,
    #[serde(default)]
    pub fpm: Option<f64>,
    #[serde(default)]
    pub config: HashMap<String, bool>,
    #[serde(default)]
    pub segment_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interval {
    pub date_from: NaiveDateTime,
    pub date_to: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyInterval {
    pub time_from: NaiveTime,
    pub time_to: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRequest {
    #[serde(flatten)]
    pub base: RecordBase,
    pub intervals: Vec<Interval>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegularRecordRequest {
    #[serde(flatten)]
    pub base: RecordBase,
    pub intervals: Vec<DailyInterval>,
    pub days_of_week: Vec<u8>,
}

/// A stored job as reported back to clients.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub key: String,
    #[serde(flatten)]
    pub job: Job,
}

/// Every stored job, split by kind.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub records: Vec<JobView>,
    #[serde(rename = "regularRecords")]
    pub regular_records: Vec<JobView>,
}

pub struct Submission<S> {
    store: S,
    clock: Arc<dyn Clock>,
    default_segment_minutes: u32,
}

impl<S: JobStore> Submission<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, default_segment_minutes: u32) -> Self {
        Self {
            store,
            clock,
            default_segment_minutes,
        }
    }

    pub async fn submit(&self, request: RecordRequest) -> Result<Vec<JobKey>, SubmissionError> {
        validate_base(&request.base)?;
        if request.intervals.is_empty() {
            return Err(invalid("at least one interval is required"));
        }
        let now = self.clock.now();
        for interval in &request.intervals {
            if interval.date_to <= interval.date_from {
                return Err(invalid("interval ends before it starts"));
            }
            if interval.date_to <= now {
                return Err(invalid("interval ends in the past"));
            }
        }

        let schedules = request
            .intervals
            .iter()
            .map(|i| Schedule::OneOff {
                date_from: i.date_from,
                date_to: i.date_to,
            })
            .collect();
        self.write(JobKind::OneOff, &request.base, schedules).await
    }

    pub async fn submit_regular(
        &self,
        request: RegularRecordRequest,
    ) -> Result<Vec<JobKey>, SubmissionError> {
        validate_base(&request.base)?;
        if request.intervals.is_empty() {
            return Err(invalid("at least one interval is required"));
        }
        if request.days_of_week.is_empty() {
            return Err(invalid("at least one weekday is required"));
        }

        let mut schedules = Vec::with_capacity(request.intervals.len());
        for interval in &request.intervals {
            let schedule = Schedule::Recurring {
                time_from: interval.time_from,
                time_to: interval.time_to,
                days_of_week: request.days_of_week.clone(),
            };
            schedule.validate().map_err(SubmissionError::Invalid)?;
            schedules.push(schedule);
        }
        self.write(JobKind::Recurring, &request.base, schedules).await
    }

    /// Every stored interval of the job called `name`, of either kind.
    pub async fn status(&self, name: &str) -> Result<Vec<JobView>, StoreError> {
        let mut views = Vec::new();
        for key in self.keys_named(name).await? {
            if let Some(job) = self.store.get(&key).await? {
                views.push(JobView {
                    key: key.to_string(),
                    job,
                });
            }
        }
        Ok(views)
    }

    /// All stored jobs of both kinds. Unreadable records are skipped.
    pub async fn list(&self) -> Result<Listing, StoreError> {
        Ok(Listing {
            records: self.views(JobKind::OneOff).await?,
            regular_records: self.views(JobKind::Recurring).await?,
        })
    }

    async fn views(&self, kind: JobKind) -> Result<Vec<JobView>, StoreError> {
        let mut views = Vec::new();
        for key in self.store.list_keys(kind).await? {
            match self.store.get(&key).await {
                Ok(Some(job)) => views.push(JobView {
                    key: key.to_string(),
                    job,
                }),
                Ok(None) => {}
                Err(e) if !e.is_unavailable() => {
                    tracing::warn!(key = %key, error = %e, "skipping unreadable job")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(views)
    }

    /// Deletes every interval of the job called `name`. A running worker
    /// notices at its next segment boundary and stops.
    pub async fn remove(&self, name: &str) -> Result<usize, StoreError> {
        let mut removed = 0;
        for key in self.keys_named(name).await? {
            if self.store.delete(&key).await? {
                removed += 1;
            }
        }
        tracing::info!(name, removed, "job removed");
        Ok(removed)
    }

    async fn keys_named(&self, name: &str) -> Result<Vec<JobKey>, StoreError> {
        let mut keys = self.store.list_keys(JobKind::OneOff).await?;
        keys.extend(self.store.list_keys(JobKind::Recurring).await?);
        keys.retain(|k| k.name == name);
        Ok(keys)
    }

    async fn write(
        &self,
        kind: JobKind,
        base: &RecordBase,
        schedules: Vec<Schedule>,
    ) -> Result<Vec<JobKey>, SubmissionError> {
        let existing = self.store.list_keys(kind).await?;
        if existing.iter().any(|k| k.name == base.name) {
            return Err(SubmissionError::Duplicate(base.name.clone()));
        }

        let path = output_dir(&base.path, &base.name);
        let mut keys = Vec::with_capacity(schedules.len());
        for (index, schedule) in schedules.into_iter().enumerate() {
            let key = JobKey::new(kind, base.name.clone(), index);
            let job = Job {
                name: base.name.clone(),
                comment: base.comment.clone(),
                rtsp_url: base.rtsp_url.clone(),
                path: path.clone(),
                fpm: base.fpm,
                status: JobStatus::Queued,
                with_audio: base.config.get("audio").copied().unwrap_or(false),
                segment_minutes: base.segment_minutes.unwrap_or(self.default_segment_minutes),
                schedule,
            };
            self.store.set(&key, &job).await?;
            keys.push(key);
        }
        tracing::info!(name = %base.name, intervals = keys.len(), path = %path.display(), "job submitted");
        Ok(keys)
    }
}

fn invalid(reason: &str) -> SubmissionError {
    SubmissionError::Invalid(reason.to_string())
}

fn rtsp_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^rtsps?://\S+$").expect("valid regex"))
}

fn validate_base(base: &RecordBase) -> Result<(), SubmissionError> {
    if base.name.trim().is_empty() {
        return Err(invalid("name must not be blank"));
    }
    if base.name.chars().count() > MAX_NAME {
        return Err(invalid("name is too long"));
    }
    if base.path.chars().count() > MAX_PATH {
        return Err(invalid("path is too long"));
    }
    if base.comment.chars().count() > MAX_COMMENT {
        return Err(invalid("comment is too long"));
    }
    if base.rtsp_url.len() > MAX_URL || !rtsp_url_regex().is_match(&base.rtsp_url) {
        return Err(invalid("rtsp_url must be an rtsp:// or rtsps:// address"));
    }
    if let Some(fpm) = base.fpm {
        if !(fpm.is_finite() && fpm > 0.0) {
            return Err(invalid("fpm must be positive"));
        }
    }
    if base.segment_minutes == Some(0) {
        return Err(invalid("segment_minutes must be positive"));
    }
    if let Some(flag) = base.config.keys().find(|k| !CONFIG_FLAGS.contains(&k.as_str())) {
        return Err(SubmissionError::Invalid(format!("unknown config option {flag}")));
    }
    Ok(())
}

/// `<path>/<name>`, with the name reduced to characters safe in a
/// directory name.
fn output_dir(path: &str, name: &str) -> PathBuf {
    let friendly = directory_friendly(name);
    let path = path.trim_end_matches(|c| c == '/' || c == '\\');
    if path.is_empty() {
        PathBuf::from(friendly)
    } else {
        PathBuf::from(path).join(friendly)
    }
}

fn directory_friendly(name: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[^\w.-]").expect("valid regex"));
    re.replace_all(name.trim(), "_").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::memory::MemoryStore;
    use chrono::{Duration, NaiveDate};
    use serde_json::json;

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 20)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn submission(store: MemoryStore) -> Submission<MemoryStore> {
        Submission::new(store, Arc::new(FixedClock(now())), 30)
    }

    fn request() -> RecordRequest {
        serde_json::from_value(json!({
            "path": "/videos/",
            "name": "Front door",
            "comment": "porch",
            "rtsp_url": "rtsp://10.0.0.5:554/stream1",
            "fpm": 60.0,
            "config": {"audio": true},
            "intervals": [
                {"date_from": "2024-04-20T09:00:00", "date_to": "2024-04-20T10:00:00"},
                {"date_from": "2024-04-21T09:00:00", "date_to": "2024-04-21T10:00:00"}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn writes_one_queued_record_per_interval() {
        let store = MemoryStore::new();
        let keys = submission(store.clone()).submit(request()).await.unwrap();

        assert_eq!(
            keys.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["videos:Front door:0", "videos:Front door:1"]
        );
        let job = store.get(&keys[1]).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.path, PathBuf::from("/videos").join("Front_door"));
        assert!(job.with_audio);
        assert_eq!(job.segment_minutes, 30);
        assert_eq!(job.target_fps(), Some(1.0));
    }

    #[tokio::test]
    async fn rejects_malformed_requests() {
        let cases: [(&str, Box<dyn Fn(&mut RecordRequest)>); 7] = [
            ("blank name", Box::new(|r: &mut RecordRequest| r.base.name = " \t".into())),
            ("http url", Box::new(|r: &mut RecordRequest| r.base.rtsp_url = "http://cam/stream".into())),
            ("zero fpm", Box::new(|r: &mut RecordRequest| r.base.fpm = Some(0.0))),
            ("unknown flag", Box::new(|r: &mut RecordRequest| {
                r.base.config.insert("timelapse".into(), true);
            })),
            ("no intervals", Box::new(|r: &mut RecordRequest| r.intervals.clear())),
            ("backwards", Box::new(|r: &mut RecordRequest| {
                let interval = &mut r.intervals[0];
                std::mem::swap(&mut interval.date_from, &mut interval.date_to);
            })),
            ("in the past", Box::new(|r: &mut RecordRequest| {
                r.intervals[0].date_from = now() - Duration::hours(3);
                r.intervals[0].date_to = now() - Duration::hours(2);
            })),
        ];

        for (case, mutate) in cases {
            let store = MemoryStore::new();
            let mut req = request();
            mutate(&mut req);
            let err = submission(store.clone()).submit(req).await.unwrap_err();
            assert!(matches!(err, SubmissionError::Invalid(_)), "{case}: {err}");
            assert!(store.list_keys(JobKind::OneOff).await.unwrap().is_empty(), "{case}");
        }
    }

    #[tokio::test]
    async fn names_are_unique_per_kind() {
        let store = MemoryStore::new();
        let submission = submission(store);
        submission.submit(request()).await.unwrap();

        let err = submission.submit(request()).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Duplicate(name) if name == "Front door"));

        let regular = RegularRecordRequest {
            base: request().base,
            intervals: vec![DailyInterval {
                time_from: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
                time_to: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            }],
            days_of_week: vec![0, 6],
        };
        let keys = submission.submit_regular(regular).await.unwrap();
        assert_eq!(keys[0].to_string(), "regular:Front door:0");
    }

    #[tokio::test]
    async fn regular_requests_check_days_and_times() {
        let submission = submission(MemoryStore::new());
        let at = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        let mut regular = RegularRecordRequest {
            base: request().base,
            intervals: vec![DailyInterval {
                time_from: at(8),
                time_to: at(8),
            }],
            days_of_week: vec![1],
        };
        assert!(submission.submit_regular(regular.clone()).await.is_err());

        regular.intervals[0].time_to = at(9);
        regular.days_of_week = vec![7];
        assert!(submission.submit_regular(regular.clone()).await.is_err());

        regular.days_of_week = vec![];
        assert!(submission.submit_regular(regular).await.is_err());
    }

    #[tokio::test]
    async fn status_and_remove_cover_every_interval() {
        let store = MemoryStore::new();
        let submission = submission(store.clone());
        submission.submit(request()).await.unwrap();

        let views = submission.status("Front door").await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].job.status, JobStatus::Queued);
        assert!(submission.status("Back door").await.unwrap().is_empty());

        assert_eq!(submission.remove("Front door").await.unwrap(), 2);
        assert!(store.list_keys(JobKind::OneOff).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_returns_both_kinds_and_skips_corrupt_records() {
        let store = MemoryStore::new();
        let submission = submission(store.clone());
        submission.submit(request()).await.unwrap();
        let regular = RegularRecordRequest {
            base: RecordBase {
                name: "yard".into(),
                ..request().base
            },
            intervals: vec![DailyInterval {
                time_from: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                time_to: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            }],
            days_of_week: vec![0, 1, 2, 3, 4],
        };
        submission.submit_regular(regular).await.unwrap();
        store.insert_raw("videos:broken:0", "{not json");

        let listing = submission.list().await.unwrap();
        let keys: Vec<_> = listing.records.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, vec!["videos:Front door:0", "videos:Front door:1"]);
        assert_eq!(listing.regular_records.len(), 1);
        assert_eq!(listing.regular_records[0].job.name, "yard");

        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["regularRecords"][0]["key"], "regular:yard:0");
        assert_eq!(json["records"][0]["status"], "queued");
    }

    #[test]
    fn output_dirs_are_directory_friendly() {
        assert_eq!(output_dir("", "cam 1"), PathBuf::from("cam_1"));
        assert_eq!(
            output_dir("site\\", "gate/north"),
            PathBuf::from("site").join("gate_north")
        );
        assert_eq!(
            output_dir("/srv/videos/", "cam1"),
            PathBuf::from("/srv/videos").join("cam1")
        );
    }
}
