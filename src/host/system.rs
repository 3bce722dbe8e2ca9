//! Process and system resource facts.
//!
//! Linux reads come from `/proc` and the cgroup hierarchy; other Unix systems
//! fall back to libc calls. Anything that cannot be read is left out.

use std::fs;

use tracing::trace;

use crate::diagnostics::{fields, FieldValue, RawFacts};

/// cgroup v1 reports "no limit" as a page-aligned `i64::MAX`.
const CGROUP_V1_UNLIMITED: u64 = 1 << 60;

/// Memory limit applied to this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLimit {
    Bytes(u64),
    Unlimited,
}

/// Resource usage sampled at handler entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemFacts {
    /// 1 minute load average.
    pub load_average: Option<f64>,
    /// Resident set size.
    pub memory_usage_bytes: Option<u64>,
    /// Peak resident set size.
    pub memory_peak_bytes: Option<u64>,
    pub memory_limit: Option<MemoryLimit>,
    pub cpu_count: usize,
}

impl SystemFacts {
    /// Sample the current process and system.
    pub fn read() -> Self {
        let facts = Self {
            load_average: load_average(),
            memory_usage_bytes: memory_usage_bytes(),
            memory_peak_bytes: memory_peak_bytes(),
            memory_limit: memory_limit(),
            cpu_count: num_cpus::get(),
        };
        trace!(?facts, "system facts sampled");
        facts
    }

    /// Add the sampled values to `facts`. Missing readings are skipped.
    pub fn apply(&self, facts: &mut RawFacts) {
        facts.insert(fields::LOAD_AVERAGE, self.load_average);
        facts.insert(fields::MEMORY_USAGE_BYTES, self.memory_usage_bytes);
        facts.insert(fields::MEMORY_PEAK_BYTES, self.memory_peak_bytes);
        facts.insert(
            fields::MEMORY_LIMIT,
            match self.memory_limit {
                Some(MemoryLimit::Bytes(bytes)) => FieldValue::from(bytes),
                Some(MemoryLimit::Unlimited) => FieldValue::from("unlimited"),
                None => FieldValue::Unknown,
            },
        );
        facts.insert(fields::CPU_COUNT, self.cpu_count);
    }
}

/// 1 minute load average.
pub fn load_average() -> Option<f64> {
    let mut loads = [0f64; 3];
    // SAFETY: the buffer holds three doubles and we ask for one.
    let n = unsafe { libc::getloadavg(loads.as_mut_ptr(), 1) };
    if n >= 1 {
        return Some(loads[0]);
    }

    fs::read_to_string("/proc/loadavg")
        .ok()
        .and_then(|content| parse_loadavg(&content))
}

/// Parse the first field of `/proc/loadavg`.
fn parse_loadavg(content: &str) -> Option<f64> {
    content.split_whitespace().next()?.parse().ok()
}

/// Resident set size of this process.
pub fn memory_usage_bytes() -> Option<u64> {
    let from_statm = fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|content| parse_statm(&content, page_size()?));

    // Without /proc the best remaining figure is the high-water mark.
    from_statm.or_else(memory_peak_bytes)
}

/// Parse the resident pages column of `/proc/self/statm`.
fn parse_statm(content: &str, page_size: u64) -> Option<u64> {
    let pages: u64 = content.split_whitespace().nth(1)?.parse().ok()?;
    pages.checked_mul(page_size)
}

fn page_size() -> Option<u64> {
    // SAFETY: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    u64::try_from(size).ok().filter(|&s| s > 0)
}

/// Peak resident set size of this process.
pub fn memory_peak_bytes() -> Option<u64> {
    // SAFETY: rusage is plain data; getrusage fills it on success.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }

    let max_rss = u64::try_from(usage.ru_maxrss).ok()?;
    // ru_maxrss is in bytes on macOS and kilobytes elsewhere.
    if cfg!(target_os = "macos") {
        Some(max_rss)
    } else {
        max_rss.checked_mul(1024)
    }
}

/// Memory limit from cgroups (v2 first, then v1).
pub fn memory_limit() -> Option<MemoryLimit> {
    if let Ok(content) = fs::read_to_string("/sys/fs/cgroup/memory.max") {
        return parse_cgroup_limit(&content);
    }
    fs::read_to_string("/sys/fs/cgroup/memory/memory.limit_in_bytes")
        .ok()
        .and_then(|content| parse_cgroup_limit(&content))
}

/// Parse a cgroup memory limit: bytes or "max".
fn parse_cgroup_limit(content: &str) -> Option<MemoryLimit> {
    let trimmed = content.trim();
    if trimmed == "max" {
        return Some(MemoryLimit::Unlimited);
    }
    let bytes: u64 = trimmed.parse().ok()?;
    if bytes >= CGROUP_V1_UNLIMITED {
        Some(MemoryLimit::Unlimited)
    } else {
        Some(MemoryLimit::Bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loadavg() {
        assert_eq!(parse_loadavg("0.52 0.58 0.59 2/1234 56789\n"), Some(0.52));
        assert_eq!(parse_loadavg(""), None);
        assert_eq!(parse_loadavg("n/a"), None);
    }

    #[test]
    fn test_parse_statm() {
        assert_eq!(parse_statm("5000 1200 300 10 0 900 0\n", 4096), Some(1200 * 4096));
        assert_eq!(parse_statm("5000", 4096), None);
    }

    #[test]
    fn test_parse_cgroup_limit() {
        assert_eq!(parse_cgroup_limit("max\n"), Some(MemoryLimit::Unlimited));
        assert_eq!(
            parse_cgroup_limit("536870912\n"),
            Some(MemoryLimit::Bytes(536_870_912))
        );
        assert_eq!(
            parse_cgroup_limit("9223372036854771712"),
            Some(MemoryLimit::Unlimited)
        );
        assert_eq!(parse_cgroup_limit("garbage"), None);
    }

    #[test]
    fn test_apply_skips_missing_readings() {
        let system = SystemFacts {
            load_average: Some(0.25),
            memory_usage_bytes: None,
            memory_peak_bytes: Some(4096),
            memory_limit: Some(MemoryLimit::Unlimited),
            cpu_count: 4,
        };
        let mut facts = RawFacts::new();
        system.apply(&mut facts);

        assert_eq!(facts.get(fields::LOAD_AVERAGE), Some(&FieldValue::Float(0.25)));
        assert_eq!(facts.get(fields::MEMORY_PEAK_BYTES), Some(&FieldValue::Integer(4096)));
        assert_eq!(
            facts.get(fields::MEMORY_LIMIT),
            Some(&FieldValue::Text("unlimited".to_string()))
        );
        assert_eq!(facts.get(fields::CPU_COUNT), Some(&FieldValue::Integer(4)));
        assert!(facts
            .get(fields::MEMORY_USAGE_BYTES)
            .map_or(true, FieldValue::is_unknown));
    }

    #[test]
    fn test_read_reports_cpus() {
        let system = SystemFacts::read();
        assert!(system.cpu_count >= 1);
        if let Some(peak) = system.memory_peak_bytes {
            assert!(peak > 0);
        }
    }
}
