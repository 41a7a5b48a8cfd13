use std::time::{Duration, Instant};

/// Progress is held below this value until the job's terminal write
pub const MAX_RUNNING_PROGRESS: u8 = 99;

/// Rate and monotonicity gate for the progress a job exposes to observers
///
/// Every observation publishes `max(last, min(candidate, 99))` and blocks the
/// calling thread until at least `min_tick` has passed since the previous one.
pub struct ProgressThrottle<F>
where
    F: FnMut(u8),
{
    last_value: u8,
    last_tick: Instant,
    min_tick: Duration,
    publish: F,
}

impl<F> ProgressThrottle<F>
where
    F: FnMut(u8),
{
    pub fn new(initial: u8, min_tick: Duration, publish: F) -> ProgressThrottle<F> {
        ProgressThrottle {
            last_value: initial.min(MAX_RUNNING_PROGRESS),
            last_tick: Instant::now(),
            min_tick,
            publish,
        }
    }

    pub fn observe(&mut self, candidate: u8) {
        let value = candidate.min(MAX_RUNNING_PROGRESS).max(self.last_value);

        let elapsed = self.last_tick.elapsed();
        if elapsed < self.min_tick {
            std::thread::sleep(self.min_tick - elapsed);
        }

        (self.publish)(value);
        self.last_value = value;
        self.last_tick = Instant::now();
    }

    pub fn last_value(&self) -> u8 {
        self.last_value
    }
}
