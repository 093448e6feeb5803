use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct InnerTimer {
    start: Option<Instant>,
    elapsed: Duration,
    subtimers: SubTimersMap,
}

impl InnerTimer {
    fn reset(&mut self) {
        self.start = None;
        self.elapsed = Duration::ZERO;
        self.subtimers.clear();
    }

    fn start(&mut self) {
        self.start = Some(Instant::now());
    }

    fn stop(&mut self) {
        self.elapsed += self.start.unwrap().elapsed();
        self.start = None;
    }

    fn suspend(&mut self) {
        //save current elapsed and suspend
        //subtimers if this timer appears active
        if let Some(instant) = self.start {
            self.elapsed += instant.elapsed();
            self.subtimers.suspend();
        }
    }

    fn resume(&mut self) {
        //resume if this timer appears active.
        //just refresh start time to now.
        if self.start.is_some() {
            self.start = Some(Instant::now());
            self.subtimers.resume();
        }
    }
}

// Keys are owned strings so that per-block timers ("schur.block_<i>") can
// be created dynamically and harvested after a calibration run.
#[derive(Debug, Default)]
struct SubTimersMap(BTreeMap<String, InnerTimer>);

impl Deref for SubTimersMap {
    type Target = BTreeMap<String, InnerTimer>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl DerefMut for SubTimersMap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl SubTimersMap {
    fn reset_subtimer(&mut self, key: &str) {
        let t = self.entry(key.to_string()).or_default();
        t.reset();
    }

    fn start_subtimer(&mut self, key: &str) {
        let t = self.0.entry(key.to_string()).or_default();
        t.start();
    }

    //this function suspends every timer in the
    //collection.   Used for notimeit!
    fn suspend(&mut self) {
        for t in self.values_mut() {
            t.suspend();
        }
    }

    fn resume(&mut self) {
        for t in self.values_mut() {
            t.resume();
        }
    }

    fn total_time(&self) -> Duration {
        self.values()
            .fold(Duration::ZERO, |acc, t| acc + t.elapsed)
    }

    fn elapsed_of(&self, path: &[&str]) -> Option<Duration> {
        let (head, rest) = path.split_first()?;
        let t = self.get(*head)?;
        if rest.is_empty() {
            Some(t.elapsed)
        } else {
            t.subtimers.elapsed_of(rest)
        }
    }

    fn collect_with_prefix<'a>(&'a self, prefix: &str, out: &mut Vec<(&'a str, Duration)>) {
        for (key, val) in self.iter() {
            if key.starts_with(prefix) {
                out.push((key, val.elapsed));
            }
            val.subtimers.collect_with_prefix(prefix, out);
        }
    }

    fn print(&self, depth: u8) {
        for (key, val) in self.iter() {
            let tabs = format!("{: <1$}", "", 4 * depth as usize);
            println!("{}{:} : {:?}", tabs, *key, val.elapsed);
            val.subtimers.print(depth + 1);
        }
    }
}

/// Hierarchical wall-clock timers.
///
/// The calibration pass relies on per-block subtimer keys being queryable
/// after a run; see [`Timers::elapsed_with_prefix`].
#[derive(Default, Debug)]
pub struct Timers {
    stack: Vec<String>,
    subtimers: SubTimersMap,
}

impl Timers {
    fn mut_active_timer(&mut self) -> Option<&mut InnerTimer> {
        if self.stack.is_empty() {
            return None;
        }

        //first one gets special treatment since self is not
        //an InnerTimer and a common trait would be overkill
        let key = &self.stack[0];
        let mut active_timer = self.subtimers.get_mut(key).unwrap();

        for key in self.stack.iter().skip(1) {
            active_timer = active_timer.subtimers.get_mut(key).unwrap();
        }
        Some(active_timer)
    }

    pub fn reset_timer(&mut self, key: &str) {
        self.subtimers.reset_subtimer(key);
    }

    /// Start a timer with name `key` as the current timer.
    pub fn start_as_current(&mut self, key: &str) {
        let active_timer = self.mut_active_timer();

        if let Some(active) = active_timer {
            // child of current active timer
            active.subtimers.start_subtimer(key);
        } else {
            // nothing active, create one at root
            self.subtimers.start_subtimer(key);
        }

        //append to timer call stack
        self.stack.push(key.to_string());
    }

    /// Stop the current timer.  There should always be one active when
    /// this function is reached.
    pub fn stop_current(&mut self) {
        let active_timer = self.mut_active_timer();
        active_timer.unwrap().stop();

        //remove from timer call stack
        self.stack.pop();
    }

    //Suspend every timer in the collection.   Used for notimeit!
    pub fn suspend(&mut self) {
        self.subtimers.suspend();
    }

    //Resume every timer in the collection.   Used for notimeit!
    pub fn resume(&mut self) {
        self.subtimers.resume();
    }

    pub fn total_time(&self) -> Duration {
        self.subtimers.total_time()
    }

    /// Elapsed time of the subtimer at `path`, e.g.
    /// `&["solve", "iteration", "schur.block_3"]`.
    pub fn elapsed_of(&self, path: &[&str]) -> Option<Duration> {
        self.subtimers.elapsed_of(path)
    }

    /// All subtimers anywhere in the tree whose key starts with `prefix`,
    /// with their elapsed times.
    pub fn elapsed_with_prefix(&self, prefix: &str) -> Vec<(&str, Duration)> {
        let mut out = Vec::new();
        self.subtimers.collect_with_prefix(prefix, &mut out);
        out
    }

    pub fn print(&self) {
        self.subtimers.print(0);
    }
}

macro_rules! timeit {
    ($timer:ident => $key:expr; $($tt:tt)+) => {

        $timer.start_as_current($key);
        $(
            $tt
        )+
        $timer.stop_current();
    }
}
pub(crate) use timeit;

macro_rules! notimeit {
    ($timer:ident; $($tt:tt)+) => {

        $timer.suspend();
        $(
            $tt
        )+
        $timer.resume();
    }
}
pub(crate) use notimeit;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_timers_and_prefix_query() {
        let mut t = Timers::default();
        t.start_as_current("solve");
        t.start_as_current("schur.block_0");
        std::thread::sleep(Duration::from_millis(2));
        t.stop_current();
        t.start_as_current("schur.block_1");
        t.stop_current();
        t.stop_current();

        let blocks = t.elapsed_with_prefix("schur.block_");
        assert_eq!(blocks.len(), 2);
        assert!(t.elapsed_of(&["solve", "schur.block_0"]).unwrap() >= Duration::from_millis(2));
        assert!(t.total_time() >= Duration::from_millis(2));
    }
}
