/// Exponential pause between consecutive accept failures.
///
/// Accept errors such as descriptor exhaustion tend to repeat immediately;
/// without a pause the accept loop would spin. The delay doubles after each
/// failure, capped at `max_delay`, and `reset()` is called on the next
/// successful accept.
use std::time::Duration;

pub struct Backoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: u32,
    current_delay: Duration,
    /// Accept failures in a row, shown in the accept-error log line.
    pub attempt: u32,
}

impl Backoff {
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: u32) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier,
            current_delay: initial_delay,
            attempt: 0,
        }
    }

    /// Schedule used by the listener: 10ms, 20ms, 40ms ... never above 1s.
    pub fn for_accept_errors() -> Self {
        Self::new(Duration::from_millis(10), Duration::from_secs(1), 2)
    }

    /// Records one more failed accept and returns how long the listener
    /// should sleep before calling `accept` again.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay;
        self.attempt += 1;
        self.current_delay = (self.current_delay * self.multiplier).min(self.max_delay);
        delay
    }

    /// An accept succeeded: the next failure starts over at the shortest pause.
    pub fn reset(&mut self) {
        self.current_delay = self.initial_delay;
        self.attempt = 0;
    }
}
