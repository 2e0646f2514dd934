use chrono::NaiveDateTime;

/// Local wall-clock time, in the zone job schedules are written in.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Wall-clock time advanced by the tokio timer from a fixed origin.
///
/// Unaffected by system clock adjustments, and follows paused tokio time.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: NaiveDateTime,
    anchor: tokio::time::Instant,
}

impl MonotonicClock {
    pub fn starting_at(origin: NaiveDateTime) -> Self {
        Self {
            origin,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = tokio::time::Instant::now().duration_since(self.anchor);
        self.origin + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}
