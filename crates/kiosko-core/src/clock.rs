//! Civil-time clock for a single fixed timezone.
//!
//! All slot arithmetic in kiosko is calendar-local: a "20:00 slot" means
//! 20:00 on the wall clock of the configured zone, never 20:00 UTC. The
//! clock therefore hands out `NaiveDateTime` values in that zone, at
//! second precision so slot instants compare exactly in the store.

use chrono::{NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{KioskoError, Result};

#[derive(Debug, Clone, Copy)]
pub struct Clock {
    tz: Tz,
}

impl Clock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Parse an IANA zone name, e.g. "Europe/Madrid".
    pub fn from_name(name: &str) -> Result<Self> {
        let tz: Tz = name
            .parse()
            .map_err(|_| KioskoError::Config(format!("unknown timezone '{name}'")))?;
        Ok(Self { tz })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Current wall-clock time in the configured zone, whole seconds.
    pub fn now(&self) -> NaiveDateTime {
        whole_second(Utc::now().with_timezone(&self.tz).naive_local())
    }
}

/// Drop sub-second precision so allocator and store always agree.
pub fn whole_second(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(0).unwrap_or(dt)
}
