use chrono::DateTime;
use chrono::FixedOffset;
use chrono::Local;

/// Source of the current instant for nodes that have no timestamp of their
/// own.
pub trait Clock {
	fn now(&self) -> DateTime<FixedOffset>;
}

/// The local wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<FixedOffset> {
		Local::now().fixed_offset()
	}
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
	fn now(&self) -> DateTime<FixedOffset> {
		self.0
	}
}
