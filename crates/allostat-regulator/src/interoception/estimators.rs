//! Built-in estimators for variables without a registered sensor

use allostat_common::clamp01;

/// Smoothing weight kept from the previous load estimate
const LOAD_SMOOTHING: f64 = 0.8;

/// Estimate computational load from sampling jitter
///
/// A host that falls behind its sensing cadence is busy; the relative
/// difference between the expected and the actual interval is blended into
/// the previous estimate.
pub fn load_from_jitter(previous: f64, expected_interval_ms: u64, actual_interval_ms: i64) -> f64 {
    if expected_interval_ms == 0 || actual_interval_ms < 0 {
        return previous;
    }
    let expected = expected_interval_ms as f64;
    let jitter = ((actual_interval_ms as f64 - expected).abs() / expected).min(1.0);
    clamp01(LOAD_SMOOTHING * previous + (1.0 - LOAD_SMOOTHING) * jitter)
}

/// Memory pressure of the budget this process runs under
///
/// Inside a memory-limited cgroup (v2) this is `memory.current / memory.max`,
/// the container's used-over-allowed ratio. Without a limit it falls back to
/// host-wide `1 - MemAvailable / MemTotal`.
#[cfg(target_os = "linux")]
pub fn memory_pressure() -> anyhow::Result<f64> {
    let current = std::fs::read_to_string("/sys/fs/cgroup/memory.current");
    let max = std::fs::read_to_string("/sys/fs/cgroup/memory.max");
    if let (Ok(current), Ok(max)) = (current, max) {
        if let Some(pressure) = parse_cgroup_memory(&current, &max) {
            return Ok(pressure);
        }
    }

    let meminfo = std::fs::read_to_string("/proc/meminfo")?;
    parse_meminfo(&meminfo)
}

#[cfg(not(target_os = "linux"))]
pub fn memory_pressure() -> anyhow::Result<f64> {
    anyhow::bail!("memory pressure estimation not supported on this platform")
}

/// Used-over-limit ratio from cgroup v2 `memory.current` and `memory.max`
///
/// `None` when the cgroup is unlimited (`max`) or either file is malformed.
pub fn parse_cgroup_memory(current: &str, max: &str) -> Option<f64> {
    let limit: f64 = max.trim().parse().ok()?;
    let used: f64 = current.trim().parse().ok()?;
    (limit > 0.0).then(|| clamp01(used / limit))
}

/// Parse the `MemTotal` and `MemAvailable` lines of a meminfo document
pub fn parse_meminfo(meminfo: &str) -> anyhow::Result<f64> {
    let mut total: Option<f64> = None;
    let mut available: Option<f64> = None;

    for line in meminfo.lines() {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("MemTotal:"), Some(kb)) => total = kb.parse().ok(),
            (Some("MemAvailable:"), Some(kb)) => available = kb.parse().ok(),
            _ => {}
        }
    }

    match (total, available) {
        (Some(total), Some(available)) if total > 0.0 => Ok(clamp01(1.0 - available / total)),
        _ => anyhow::bail!("meminfo missing MemTotal/MemAvailable"),
    }
}
