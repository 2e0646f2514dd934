//! Due-job rules: deciding whether a job's window is open and turning a
//! schedule into a concrete recording window.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};

use super::jobs::Schedule;

/// Concrete recording window handed to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Whether `now` falls inside the daily window `[from, to]`.
///
/// `from > to` denotes a window crossing midnight, in which case `now` is
/// inside when it is at or after `from`, or at or before `to`.
pub fn time_in_window(now: NaiveTime, from: NaiveTime, to: NaiveTime) -> bool {
    if from < to {
        from <= now && now <= to
    } else {
        now >= from || now <= to
    }
}

impl Schedule {
    /// Rejects schedules that can never open.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Schedule::OneOff { date_from, date_to } => {
                if date_to <= date_from {
                    return Err(format!("end {} is not after start {}", date_to, date_from));
                }
            }
            Schedule::Recurring {
                time_from,
                time_to,
                days_of_week,
            } => {
                if time_from == time_to {
                    return Err(format!("empty daily window at {}", time_from));
                }
                if let Some(day) = days_of_week.iter().find(|d| **d > 6) {
                    return Err(format!("weekday {} out of range 0..6", day));
                }
            }
        }
        Ok(())
    }

    /// Whether the window is open at `now`. Marker checks are the caller's.
    pub fn is_open(&self, now: NaiveDateTime) -> bool {
        match self {
            Schedule::OneOff { date_from, date_to } => *date_from < now && now < *date_to,
            Schedule::Recurring {
                time_from,
                time_to,
                days_of_week,
            } => {
                let weekday = now.weekday().num_days_from_monday() as u8;
                days_of_week.contains(&weekday) && time_in_window(now.time(), *time_from, *time_to)
            }
        }
    }

    /// The concrete window a worker started at `now` should record.
    ///
    /// Recurring windows are anchored to today and their end rolls over to
    /// tomorrow when the end time of day is earlier than `now`.
    pub fn window_at(&self, now: NaiveDateTime) -> Window {
        let start = now.with_nanosecond(0).unwrap_or(now);
        match self {
            Schedule::OneOff { date_to, .. } => Window {
                start,
                end: *date_to,
            },
            Schedule::Recurring { time_to, .. } => {
                let day = if *time_to < start.time() {
                    start.date() + Duration::days(1)
                } else {
                    start.date()
                };
                Window {
                    start,
                    end: day.and_time(*time_to),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2024-04-22 is a Monday.
    fn monday(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 22)
            .unwrap()
            .and_time(t(h, m))
    }

    #[test]
    fn same_day_window() {
        assert!(time_in_window(t(9, 0), t(8, 0), t(17, 0)));
        assert!(time_in_window(t(8, 0), t(8, 0), t(17, 0)));
        assert!(time_in_window(t(17, 0), t(8, 0), t(17, 0)));
        assert!(!time_in_window(t(7, 59), t(8, 0), t(17, 0)));
        assert!(!time_in_window(t(22, 0), t(8, 0), t(17, 0)));
    }

    #[test]
    fn window_crossing_midnight() {
        assert!(time_in_window(t(23, 30), t(22, 0), t(6, 0)));
        assert!(time_in_window(t(1, 0), t(22, 0), t(6, 0)));
        assert!(time_in_window(t(22, 0), t(22, 0), t(6, 0)));
        assert!(!time_in_window(t(12, 0), t(22, 0), t(6, 0)));
        assert!(!time_in_window(t(6, 1), t(22, 0), t(6, 0)));
    }

    #[test]
    fn one_off_is_open_strictly_inside_its_interval() {
        let now = monday(12, 0);
        let open = Schedule::OneOff {
            date_from: now - Duration::hours(1),
            date_to: now + Duration::hours(1),
        };
        let expired = Schedule::OneOff {
            date_from: now - Duration::hours(2),
            date_to: now - Duration::hours(1),
        };
        let future = Schedule::OneOff {
            date_from: now + Duration::hours(1),
            date_to: now + Duration::hours(2),
        };
        assert!(open.is_open(now));
        assert!(!expired.is_open(now));
        assert!(!future.is_open(now));
        assert!(!open.is_open(now + Duration::hours(1)));
    }

    #[test]
    fn recurring_requires_permitted_weekday() {
        let schedule = Schedule::Recurring {
            time_from: t(8, 0),
            time_to: t(17, 0),
            days_of_week: vec![0, 2],
        };
        assert!(schedule.is_open(monday(9, 0)));
        assert!(!schedule.is_open(monday(9, 0) + Duration::days(1)));
        assert!(schedule.is_open(monday(9, 0) + Duration::days(2)));
    }

    #[test]
    fn recurring_window_rolls_end_to_tomorrow() {
        let schedule = Schedule::Recurring {
            time_from: t(22, 0),
            time_to: t(6, 0),
            days_of_week: vec![0],
        };
        let window = schedule.window_at(monday(23, 30));
        assert_eq!(window.start, monday(23, 30));
        assert_eq!(window.end, monday(6, 0) + Duration::days(1));

        let same_day = Schedule::Recurring {
            time_from: t(8, 0),
            time_to: t(17, 0),
            days_of_week: vec![0],
        };
        assert_eq!(same_day.window_at(monday(9, 15)).end, monday(17, 0));
    }

    #[test]
    fn one_off_window_ends_at_date_to() {
        let now = monday(12, 0);
        let schedule = Schedule::OneOff {
            date_from: now - Duration::minutes(5),
            date_to: now + Duration::minutes(2),
        };
        let window = schedule.window_at(now);
        assert_eq!(window.start, now);
        assert_eq!(window.end, now + Duration::minutes(2));
    }

    #[test]
    fn validation_rejects_empty_windows() {
        let inverted = Schedule::OneOff {
            date_from: monday(10, 0),
            date_to: monday(9, 0),
        };
        let empty = Schedule::Recurring {
            time_from: t(8, 0),
            time_to: t(8, 0),
            days_of_week: vec![1],
        };
        let bad_day = Schedule::Recurring {
            time_from: t(8, 0),
            time_to: t(9, 0),
            days_of_week: vec![7],
        };
        assert!(inverted.validate().is_err());
        assert!(empty.validate().is_err());
        assert!(bad_day.validate().is_err());
    }
}
