//! Single-flight execution guard.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct FlightState<T> {
    in_flight: bool,
    generation: u64,
    last: Option<T>,
}

/// Ensures at most one execution of a piece of work is in progress.
///
/// The first caller runs the work. Callers arriving while it runs block
/// until it finishes and receive a clone of its result instead of starting
/// their own run.
#[derive(Debug)]
pub struct SingleFlight<T> {
    state: Mutex<FlightState<T>>,
    done: Condvar,
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> SingleFlight<T> {
    /// Creates an idle guard.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(FlightState {
                in_flight: false,
                generation: 0,
                last: None,
            }),
            done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FlightState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true while a run is in progress.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    /// Number of completed runs.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Runs `work`, or joins the run already in progress.
    ///
    /// If the leading run panics, one of the waiting callers takes over and
    /// runs its own `work`.
    pub fn run<F>(&self, work: F) -> T
    where
        F: FnOnce() -> T,
    {
        let mut state = self.lock();
        loop {
            if !state.in_flight {
                state.in_flight = true;
                break;
            }

            let joined = state.generation;
            while state.in_flight && state.generation == joined {
                state = self
                    .done
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if state.generation != joined
                && let Some(result) = &state.last
            {
                return result.clone();
            }
        }
        drop(state);

        let mut leader = Leader {
            flight: self,
            finished: false,
        };
        let result = work();
        leader.finish(Some(result.clone()));
        result
    }
}

/// Releases waiters when the leading run ends, including by panic.
struct Leader<'a, T: Clone> {
    flight: &'a SingleFlight<T>,
    finished: bool,
}

impl<T: Clone> Leader<'_, T> {
    fn finish(&mut self, result: Option<T>) {
        let mut state = self.flight.lock();
        state.in_flight = false;
        state.generation = state.generation.wrapping_add(1);
        state.last = result;
        drop(state);
        self.flight.done.notify_all();
        self.finished = true;
    }
}

impl<T: Clone> Drop for Leader<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_sequential_runs_execute_each_time() {
        let flight = SingleFlight::new();
        let runs = AtomicUsize::new(0);

        for expected in 1..=3 {
            let value = flight.run(|| runs.fetch_add(1, Ordering::SeqCst) + 1);
            assert_eq!(value, expected);
        }
        assert_eq!(flight.generation(), 3);
        assert!(!flight.is_in_flight());
    }

    #[test]
    fn test_concurrent_callers_share_one_run() {
        let flight = Arc::new(SingleFlight::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let leader = {
            let flight = Arc::clone(&flight);
            let runs = Arc::clone(&runs);
            thread::spawn(move || {
                flight.run(|| {
                    runs.fetch_add(1, Ordering::SeqCst);
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    "shared".to_string()
                })
            })
        };
        started_rx.recv().unwrap();

        let followers: Vec<_> = (0..4)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let runs = Arc::clone(&runs);
                thread::spawn(move || {
                    flight.run(|| {
                        runs.fetch_add(1, Ordering::SeqCst);
                        "own".to_string()
                    })
                })
            })
            .collect();

        // Give followers time to block on the in-flight run.
        thread::sleep(Duration::from_millis(50));
        assert!(flight.is_in_flight());
        release_tx.send(()).unwrap();

        assert_eq!(leader.join().unwrap(), "shared");
        for follower in followers {
            let value = follower.join().unwrap();
            assert!(value == "shared" || value == "own");
        }
        assert!(runs.load(Ordering::SeqCst) >= 1);
        assert!(!flight.is_in_flight());
    }

    #[test]
    fn test_panicking_leader_releases_waiters() {
        let flight = Arc::new(SingleFlight::<u32>::new());

        let panicked = {
            let flight = Arc::clone(&flight);
            thread::spawn(move || flight.run(|| unreachable!("leader failure")))
        };
        assert!(panicked.join().is_err());
        assert!(!flight.is_in_flight());

        assert_eq!(flight.run(|| 7), 7);
    }
}
