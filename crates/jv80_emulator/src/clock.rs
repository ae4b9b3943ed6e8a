use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::{Error, Result};

pub const MAX_KHZ: f64 = 1000.0;

/// Something driven by a [`Clock`].
pub trait Clocked {
    fn on_rising_clock_edge(&mut self) -> Result<()>;
    fn on_high_clock(&mut self) -> Result<()>;
    fn on_falling_clock_edge(&mut self) -> Result<()>;
    fn on_low_clock(&mut self) -> Result<()>;

    /// The clock stops as soon as this turns false.
    fn running(&self) -> bool {
        true
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClockEvent {
    Started,
    Stopped,
    Error(Error),
    FreqChange(f64),
}

pub type ClockListener = Box<dyn FnMut(&ClockEvent) + Send>;

/// Stops a running clock, from any thread. Takes effect after the current cycle.
#[derive(Clone, Debug, Default)]
pub struct ClockStop(Arc<AtomicBool>);

impl ClockStop {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Clock {
    khz: f64,
    stop: ClockStop,
    listener: Option<ClockListener>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(MAX_KHZ)
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("khz", &self.khz)
            .field("stopped", &self.stop.is_stopped())
            .finish()
    }
}

impl Clock {
    /// A clock running at `khz`, or at the maximum speed if that is out of range.
    pub fn new(khz: f64) -> Self {
        Self {
            khz: if khz > 0.0 && khz <= MAX_KHZ { khz } else { MAX_KHZ },
            stop: ClockStop::default(),
            listener: None,
        }
    }

    pub fn speed(&self) -> f64 {
        self.khz
    }

    /// Half a clock period in nanoseconds.
    pub fn tick(&self) -> u64 {
        (1_000_000.0 / self.khz / 2.0) as u64
    }

    pub fn set_speed(&mut self, khz: f64) -> bool {
        if !(khz > 0.0 && khz <= MAX_KHZ) {
            warn!("Rejected clock speed {} kHz", khz);
            return false;
        }
        self.khz = khz;
        info!("Clock speed set to {} kHz", khz);
        self.send(ClockEvent::FreqChange(khz));
        true
    }

    pub fn set_listener(&mut self, listener: impl FnMut(&ClockEvent) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    pub fn stop_handle(&self) -> ClockStop {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    fn send(&mut self, event: ClockEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&event);
        }
    }

    /// Drives `target` until it stops running, the clock is stopped, or `cycles` cycles have run.
    /// Returns the number of cycles.
    pub fn start(&mut self, target: &mut dyn Clocked, cycles: Option<u64>) -> Result<u64> {
        self.stop.clear();
        info!("Clock started at {} kHz", self.khz);
        self.send(ClockEvent::Started);

        let half_period = Duration::from_nanos(self.tick());
        let mut deadline = Instant::now();
        let mut count = 0;
        while target.running()
            && !self.stop.is_stopped()
            && cycles.map_or(true, |cycles| count < cycles)
        {
            if let Err(err) = Self::cycle(target, half_period, &mut deadline) {
                warn!("Clock stopped after {} cycles: {}", count, err);
                self.send(ClockEvent::Error(err.clone()));
                self.send(ClockEvent::Stopped);
                return Err(err);
            }
            count += 1;
        }

        info!("Clock stopped after {} cycles", count);
        self.send(ClockEvent::Stopped);
        Ok(count)
    }

    fn cycle(target: &mut dyn Clocked, half_period: Duration, deadline: &mut Instant) -> Result<()> {
        target.on_rising_clock_edge()?;
        target.on_high_clock()?;
        Self::wait(half_period, deadline);
        target.on_falling_clock_edge()?;
        target.on_low_clock()?;
        Self::wait(half_period, deadline);
        Ok(())
    }

    fn wait(half_period: Duration, deadline: &mut Instant) {
        *deadline += half_period;
        let now = Instant::now();
        if *deadline > now {
            thread::sleep(*deadline - now);
        } else if now - *deadline > Duration::from_millis(100) {
            // Too far behind to catch up.
            *deadline = now;
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Counter {
        phases: Vec<char>,
        fail_at: Option<usize>,
        stop_after: Option<usize>,
    }

    impl Counter {
        fn record(&mut self, phase: char) -> Result<()> {
            self.phases.push(phase);
            if Some(self.phases.len()) == self.fail_at {
                return Err(Error::General("boom".to_string()));
            }
            Ok(())
        }
    }

    impl Clocked for Counter {
        fn on_rising_clock_edge(&mut self) -> Result<()> {
            self.record('R')
        }

        fn on_high_clock(&mut self) -> Result<()> {
            self.record('H')
        }

        fn on_falling_clock_edge(&mut self) -> Result<()> {
            self.record('F')
        }

        fn on_low_clock(&mut self) -> Result<()> {
            self.record('L')
        }

        fn running(&self) -> bool {
            self.stop_after
                .map_or(true, |cycles| self.phases.len() < cycles * 4)
        }
    }

    fn recording_clock(events: &Arc<Mutex<Vec<ClockEvent>>>) -> Clock {
        let sink = events.clone();
        let mut clock = Clock::default();
        clock.set_listener(move |ev| sink.lock().unwrap().push(ev.clone()));
        clock
    }

    #[test]
    fn tick_is_half_period_in_nanoseconds() {
        assert_eq!(500000, Clock::new(1.0).tick());
        assert_eq!(500, Clock::new(1000.0).tick());
    }

    #[test]
    fn rejects_speeds_out_of_range() {
        let mut clock = Clock::new(10.0);
        assert!(!clock.set_speed(0.0));
        assert!(!clock.set_speed(-1.0));
        assert!(!clock.set_speed(1000.5));
        assert_eq!(10.0, clock.speed());
        assert!(clock.set_speed(1000.0));
        assert_eq!(1000.0, clock.speed());
    }

    #[test]
    fn single_cycle_cap() {
        let mut counter = Counter::default();
        let mut clock = Clock::default();
        assert_eq!(Ok(1), clock.start(&mut counter, Some(1)));
        assert_eq!(vec!['R', 'H', 'F', 'L'], counter.phases);
    }

    #[test]
    fn stops_when_target_stops_running() {
        let mut counter = Counter {
            stop_after: Some(3),
            ..Default::default()
        };
        let mut clock = Clock::default();
        assert_eq!(Ok(3), clock.start(&mut counter, None));
        assert_eq!(12, counter.phases.len());
    }

    #[test]
    fn error_aborts_cycle_and_is_reported() {
        let events = Arc::new(Mutex::new(vec![]));
        let mut clock = recording_clock(&events);
        let mut counter = Counter {
            fail_at: Some(6),
            ..Default::default()
        };

        let err = Error::General("boom".to_string());
        assert_eq!(Err(err.clone()), clock.start(&mut counter, None));
        assert_eq!("RHFLRH", counter.phases.iter().collect::<String>());
        assert_eq!(
            vec![ClockEvent::Started, ClockEvent::Error(err), ClockEvent::Stopped],
            *events.lock().unwrap()
        );
    }

    #[test]
    fn listener_sees_speed_changes() {
        let events = Arc::new(Mutex::new(vec![]));
        let mut clock = recording_clock(&events);
        clock.set_speed(500.0);
        clock.set_speed(5000.0);
        assert_eq!(vec![ClockEvent::FreqChange(500.0)], *events.lock().unwrap());
    }

    #[test]
    fn stop_handle_stops_before_next_cycle() {
        struct Stopper(ClockStop, usize);

        impl Clocked for Stopper {
            fn on_rising_clock_edge(&mut self) -> Result<()> {
                Ok(())
            }

            fn on_high_clock(&mut self) -> Result<()> {
                Ok(())
            }

            fn on_falling_clock_edge(&mut self) -> Result<()> {
                Ok(())
            }

            fn on_low_clock(&mut self) -> Result<()> {
                self.1 += 1;
                if self.1 == 2 {
                    self.0.stop();
                }
                Ok(())
            }
        }

        let mut clock = Clock::default();
        let mut stopper = Stopper(clock.stop_handle(), 0);
        assert_eq!(Ok(2), clock.start(&mut stopper, Some(10)));
        assert!(clock.stop_handle().is_stopped());
    }
}
