// Trailing-hour history: a fixed ring of wall-clock buckets, each averaging the
// raw rates observed during its interval. Advancing is lazy and keyed on the
// caller's clock, so a task that was not scheduled (or a host that slept)
// catches up on its next add.

use chrono::{DateTime, TimeDelta, Utc};

use crate::models::{HourlyPoint, HourlyStats};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bucket {
    pub down_sum: f64,
    pub up_sum: f64,
    pub count: u32,
}

impl Bucket {
    /// (down, up) average over the bucket's observations; zero when empty.
    pub fn average(&self) -> (f64, f64) {
        if self.count == 0 {
            return (0.0, 0.0);
        }
        let n = self.count as f64;
        (self.down_sum / n, self.up_sum / n)
    }
}

#[derive(Debug, Clone)]
pub struct HourlyAggregator {
    buckets: Vec<Bucket>,
    cursor: usize,
    last_advance: DateTime<Utc>,
    interval: TimeDelta,
}

impl HourlyAggregator {
    /// `capacity` is clamped to at least 1; intervals shorter than one second are raised to one second.
    pub fn new(capacity: usize, interval: TimeDelta, start: DateTime<Utc>) -> Self {
        Self {
            buckets: vec![Bucket::default(); capacity.max(1)],
            cursor: 0,
            last_advance: start,
            interval: interval.max(TimeDelta::seconds(1)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn last_advance(&self) -> DateTime<Utc> {
        self.last_advance
    }

    pub fn interval_minutes(&self) -> i64 {
        self.interval.num_minutes()
    }

    /// Bucket under the cursor (the one new observations land in).
    pub fn current(&self) -> &Bucket {
        &self.buckets[self.cursor]
    }

    /// Moves the cursor forward once per whole interval elapsed since the last
    /// advance, zeroing every bucket it enters. The anchor moves by exact
    /// intervals, not to `now`, so short delays never accumulate drift.
    /// Returns the number of slots advanced.
    pub fn advance(&mut self, now: DateTime<Utc>) -> u64 {
        let steps = self.steps_behind(now);
        if steps == 0 {
            return 0;
        }
        let capacity = self.buckets.len();
        if steps >= capacity as u64 {
            self.buckets.fill(Bucket::default());
        } else {
            for k in 1..=steps as usize {
                self.buckets[(self.cursor + k) % capacity] = Bucket::default();
            }
        }
        self.cursor = (self.cursor + (steps % capacity as u64) as usize) % capacity;

        let factor = i32::try_from(steps).unwrap_or(i32::MAX);
        self.last_advance += self.interval * factor;
        steps
    }

    /// Equivalent to looping `while now - last_advance > interval`.
    fn steps_behind(&self, now: DateTime<Utc>) -> u64 {
        let behind = nanos(now - self.last_advance);
        let interval = nanos(self.interval);
        if behind <= interval {
            return 0;
        }
        u64::try_from((behind - 1) / interval).unwrap_or(u64::MAX)
    }

    pub fn add(&mut self, now: DateTime<Utc>, down_bps: f64, up_bps: f64) {
        self.advance(now);
        let bucket = &mut self.buckets[self.cursor];
        bucket.down_sum += down_bps;
        bucket.up_sum += up_bps;
        bucket.count += 1;
    }

    /// All buckets, oldest first; the newest has offset 0.
    pub fn snapshot(&self) -> Vec<HourlyPoint> {
        let capacity = self.buckets.len();
        let interval_min = self.interval_minutes();
        (0..capacity)
            .map(|i| {
                let bucket = &self.buckets[(self.cursor + 1 + i) % capacity];
                let (down_bps, up_bps) = bucket.average();
                HourlyPoint {
                    offset_min: (i as i64 - (capacity as i64 - 1)) * interval_min,
                    down_bps,
                    up_bps,
                }
            })
            .collect()
    }

    pub fn stats(&self) -> HourlyStats {
        HourlyStats {
            interval_min: u32::try_from(self.interval_minutes()).unwrap_or(u32::MAX),
            points: self.snapshot(),
        }
    }
}

fn nanos(delta: TimeDelta) -> i128 {
    delta
        .num_nanoseconds()
        .map(i128::from)
        .unwrap_or_else(|| i128::from(delta.num_milliseconds()) * 1_000_000)
}
