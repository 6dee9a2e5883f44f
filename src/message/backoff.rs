use std::{iter::Take, time::Duration};

/// Provides a mechanism for attempting to complete an operation and
/// retrying the operation, with a backoff, if it fails.
///
/// This iterator provides an infinite stream of back off durations, where
/// the duration increases by an exponential factor up to some maximum delay.
/// Upon reaching the maximum delay, that value will be returned from then
/// on. Use [Iterator::take] to bound the number of attempts.
///
/// The transport only retries while establishing connections; once the ball
/// is moving, a failed operation ends the run.
pub struct ExponentialBackoff {
    curr: Duration,
    max: Duration,
    factor: u32,
}

impl ExponentialBackoff {
    pub fn new(start: Duration, max: Duration, factor: u32) -> ExponentialBackoff {
        ExponentialBackoff {
            curr: start,
            max,
            factor,
        }
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let this = self.curr;
        let new_next = self.curr * self.factor;

        self.curr = if new_next > self.max {
            self.max
        } else {
            new_next
        };

        Some(this)
    }
}

/// The Retry trait provides a protocol for retrying a function returning a
/// [Result] until either it succeeds or the [Iterator] of delays completes.
pub trait Retry: Iterator<Item = Duration> + Sized {
    /// Retry the given function until it returns [Ok]. After every failed
    /// attempt but the last, `sleep` is called with the error and the delay
    /// to wait before the next attempt; this is the place to log. If the
    /// iterator finishes without a successful execution of `f` then the last
    /// [Err] is returned. `None` is returned only if the iterator was empty.
    fn retry<F, S, T, E>(self, mut f: F, sleep: S) -> Option<Result<T, E>>
    where
        F: FnMut() -> Result<T, E>,
        S: Fn(&E, Duration),
    {
        let mut last_err = None;
        let mut iter = self.peekable();

        while let Some(delay) = iter.next() {
            match f() {
                Ok(v) => return Some(Ok(v)),
                Err(e) => {
                    if iter.peek().is_some() {
                        sleep(&e, delay);
                    }
                    last_err = Some(Err(e));
                }
            }
        }
        last_err
    }
}

impl Retry for ExponentialBackoff {}

impl Retry for Take<ExponentialBackoff> {}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use std::cell::Cell;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn delays_grow_then_saturate() {
        let delays: Vec<_> = ExponentialBackoff::new(ms(10), ms(50), 2).take(5).collect();
        assert_eq!(delays, vec![ms(10), ms(20), ms(40), ms(50), ms(50)]);
    }

    #[test]
    fn retry_stops_at_first_success() {
        let calls = Cell::new(0);
        let slept = Cell::new(0);
        let result = ExponentialBackoff::new(ms(0), ms(0), 2).take(5).retry(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err("nope")
                } else {
                    Ok(calls.get())
                }
            },
            |_, _| slept.set(slept.get() + 1),
        );
        assert_eq!(result, Some(Ok(3)));
        assert_eq!(slept.get(), 2);
    }

    #[test]
    fn retry_returns_last_error_without_sleeping_after_it() {
        let slept = Cell::new(0);
        let result: Option<Result<(), usize>> = ExponentialBackoff::new(ms(0), ms(0), 2)
            .take(3)
            .retry(|| Err(slept.get()), |_, _| slept.set(slept.get() + 1));
        assert_eq!(result, Some(Err(2)));
        assert_eq!(slept.get(), 2);
    }
}
