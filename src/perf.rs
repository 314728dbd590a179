//! Performance measurement utilities.

use std::time::{Duration, Instant};

/// Formats a duration as HH:MM:SS.d (tenths of a second).
#[must_use]
pub fn format_elapsed(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let tenths = d.subsec_millis() / 100;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{tenths}")
}

/// Peak resident set size of this process, if the platform reports it.
#[must_use]
pub fn peak_memory_bytes() -> Option<u64> {
    #[cfg(any(target_os = "macos", target_os = "linux"))]
    {
        // ru_maxrss is bytes on macOS and KiB on Linux
        const MAXRSS_UNIT: u64 = if cfg!(target_os = "macos") { 1 } else { 1024 };

        let mut usage = std::mem::MaybeUninit::<libc::rusage>::uninit();
        // SAFETY: the pointer comes from a live MaybeUninit of the right type.
        if unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) } != 0 {
            return None;
        }
        // SAFETY: getrusage returned 0, so it filled in the struct.
        let usage = unsafe { usage.assume_init() };
        u64::try_from(usage.ru_maxrss).ok().map(|rss| rss * MAXRSS_UNIT)
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Formats a byte count with binary units (B, KB, MB, GB).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Measures throughput of one unit of work, such as a chromosome.
#[derive(Debug, Clone, Copy)]
pub struct Benchmark {
    start: Instant,
}

impl Benchmark {
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// `"<count> <unit> in HH:MM:SS.d (<rate> <unit>/s)"`
    #[must_use]
    pub fn summary(&self, count: usize, unit: &str) -> String {
        summarize(count, unit, self.elapsed())
    }
}

fn summarize(count: usize, unit: &str, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 { count as f64 / secs } else { 0.0 };
    format!(
        "{count} {unit} in {} ({rate:.0} {unit}/s)",
        format_elapsed(elapsed)
    )
}
