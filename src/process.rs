//! Process resource snapshot for the metrics endpoint
//!
//! Reads `/proc/self` on Linux. Other platforms report zeros.

use serde::Serialize;

/// Kernel clock ticks per second assumed for `/proc/self/stat`
const USER_HZ: u64 = 100;

/// Memory usage in megabytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    /// Anonymous resident memory
    pub heap_used: f64,
    /// Data segment size
    pub heap_total: f64,
    /// File-backed resident memory
    pub external: f64,
    /// Resident set size
    pub rss: f64,
}

/// CPU time consumed, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpuUsage {
    /// User mode
    pub user: u64,
    /// Kernel mode
    pub system: u64,
}

/// Memory usage of this process
#[must_use]
pub fn memory_usage() -> MemoryUsage {
    std::fs::read_to_string("/proc/self/status")
        .map(|s| parse_status(&s))
        .unwrap_or_default()
}

/// CPU time used by this process
#[must_use]
pub fn cpu_usage() -> CpuUsage {
    std::fs::read_to_string("/proc/self/stat")
        .ok()
        .and_then(|s| parse_stat(&s))
        .unwrap_or_default()
}

/// Parse the `Vm*` / `Rss*` lines of `/proc/<pid>/status`
fn parse_status(status: &str) -> MemoryUsage {
    let mut usage = MemoryUsage::default();
    for line in status.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(kb) = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
        else {
            continue;
        };
        let mb = kb_to_mb(kb);
        match key {
            "VmRSS" => usage.rss = mb,
            "VmData" => usage.heap_total = mb,
            "RssAnon" => usage.heap_used = mb,
            "RssFile" => usage.external = mb,
            _ => {}
        }
    }
    usage
}

/// Parse `utime` and `stime` from `/proc/<pid>/stat`
fn parse_stat(stat: &str) -> Option<CpuUsage> {
    // comm may contain spaces; fields resume after the closing paren
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // rest starts at field 3 (state); utime is 14, stime is 15
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(CpuUsage {
        user: utime * 1000 / USER_HZ,
        system: stime * 1000 / USER_HZ,
    })
}

#[allow(clippy::cast_precision_loss)]
fn kb_to_mb(kb: u64) -> f64 {
    (kb as f64 / 1024.0 * 100.0).round() / 100.0
}
