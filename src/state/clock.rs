//! Clock abstraction for the state engine.
//!
//! Release IDs are derived from wall time, so the engine takes the clock as
//! a capability. Production uses UTC wall time; tests inject fixed clocks.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// UTC wall clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
