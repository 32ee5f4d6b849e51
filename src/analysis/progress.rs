// ProgressReporter - bounded, monotonic progress for one analysis call

/// Highest value reported while the call is in flight
pub const IN_FLIGHT_CAP: u8 = 90;
/// Increment per progress tick
pub const TICK_STEP: u8 = 10;

/// Wraps a progress callback and enforces:
/// - 0 first, then non-decreasing values
/// - at most 90 until the call completes
/// - exactly one 100, after which nothing is emitted
pub struct ProgressReporter<'a> {
    sink: &'a mut (dyn FnMut(u8) + Send),
    last: Option<u8>,
    completed: bool,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a mut (dyn FnMut(u8) + Send)) -> Self {
        Self {
            sink,
            last: None,
            completed: false,
        }
    }

    /// Emit the initial 0
    pub fn begin(&mut self) {
        if self.last.is_none() && !self.completed {
            self.last = Some(0);
            (self.sink)(0);
        }
    }

    /// Step forward by one tick, staying under the in-flight cap
    pub fn advance(&mut self) {
        let current = self.last.unwrap_or(0);
        self.report(current.saturating_add(TICK_STEP).min(IN_FLIGHT_CAP));
    }

    /// Report an in-flight value. Lower values than the last one are ignored.
    pub fn report(&mut self, value: u8) {
        if self.completed {
            return;
        }
        self.begin();
        let value = value.min(IN_FLIGHT_CAP);
        if self.last.is_some_and(|last| value <= last) {
            return;
        }
        self.last = Some(value);
        (self.sink)(value);
    }

    /// Emit the terminal 100, once
    pub fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.begin();
        self.completed = true;
        self.last = Some(100);
        (self.sink)(100);
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic_and_capped() {
        let mut seen = Vec::new();
        let mut sink = |v: u8| seen.push(v);
        {
            let mut reporter = ProgressReporter::new(&mut sink);
            reporter.begin();
            for _ in 0..12 {
                reporter.advance();
            }
            reporter.report(40);
            reporter.complete();
            reporter.complete();
            reporter.advance();
        }
        assert_eq!(seen, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn test_complete_without_ticks() {
        let mut seen = Vec::new();
        let mut sink = |v: u8| seen.push(v);
        ProgressReporter::new(&mut sink).complete();
        assert_eq!(seen, vec![0, 100]);
    }
}
