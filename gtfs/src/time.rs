use std::collections::HashMap;
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Seconds since the start of the service day. GTFS allows hours past 24 for trips running past
/// midnight, so this isn't a wall-clock time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time(u32);

impl Time {
    pub const START_OF_DAY: Time = Time(0);

    pub fn from_seconds(secs: u32) -> Self {
        Self(secs)
    }

    pub fn inner_seconds(self) -> u32 {
        self.0
    }

    /// Parses `H:MM:SS` or `HH:MM:SS`.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.trim().split(':').collect();
        if parts.len() != 3 {
            bail!("Time {raw:?} isn't H:MM:SS");
        }
        let hours: u32 = parts[0]
            .parse()
            .map_err(|err| anyhow!("Time {raw:?} has bad hours: {err}"))?;
        let minutes: u32 = parts[1]
            .parse()
            .map_err(|err| anyhow!("Time {raw:?} has bad minutes: {err}"))?;
        let seconds: u32 = parts[2]
            .parse()
            .map_err(|err| anyhow!("Time {raw:?} has bad seconds: {err}"))?;
        if minutes >= 60 || seconds >= 60 {
            bail!("Time {raw:?} is out of range");
        }
        hours
            .checked_mul(3600)
            .and_then(|x| x.checked_add(minutes * 60 + seconds))
            .map(Self)
            .ok_or_else(|| anyhow!("Time {raw:?} is too large"))
    }

    /// The number of seconds from `self` to `later`, if `later` really is after `self`.
    pub fn seconds_until(self, later: Time) -> Option<u32> {
        later.0.checked_sub(self.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let hours = self.0 / 3600;
        let minutes = (self.0 % 3600) / 60;
        let seconds = self.0 % 60;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
    }
}

/// stop_times.txt repeats the same handful of times millions of times, so memoize parsing. The
/// cache is owned by one load and bounded; once full, it's flushed and starts over.
pub struct TimeParser {
    cache: HashMap<String, Time>,
    capacity: usize,
}

impl TimeParser {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: HashMap::new(),
            capacity,
        }
    }

    pub fn parse(&mut self, raw: &str) -> Result<Time> {
        if let Some(time) = self.cache.get(raw) {
            return Ok(*time);
        }
        let time = Time::parse(raw)?;
        if self.cache.len() >= self.capacity {
            self.cache.clear();
        }
        self.cache.insert(raw.to_string(), time);
        Ok(time)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl Default for TimeParser {
    fn default() -> Self {
        // Every second of a 30 hour service day
        Self::new(30 * 3600)
    }
}
