//! Kubernetes resource quantity parsing
//!
//! Only what capacity summaries need: CPU to millicores and memory to MiB.

const MIB: f64 = 1024.0 * 1024.0;

/// Split a quantity into its numeric part and unit suffix
fn split(raw: &str) -> Option<(f64, &str)> {
    let raw = raw.trim();
    let idx = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(raw.len());
    let (number, suffix) = raw.split_at(idx);
    let value: f64 = number.parse().ok()?;
    Some((value, suffix))
}

/// Parse a CPU quantity (`"4"`, `"1.5"`, `"250m"`, `"100000n"`) into millicores
pub fn cpu_millicores(raw: &str) -> Option<i64> {
    let (value, suffix) = split(raw)?;
    let millis = match suffix {
        "" => value * 1000.0,
        "m" => value,
        "u" => value / 1000.0,
        "n" => value / 1_000_000.0,
        "k" => value * 1_000_000.0,
        _ => return None,
    };
    Some(millis.round() as i64)
}

/// Parse a memory quantity (`"16Gi"`, `"32768Ki"`, `"1G"`, `"1048576"`) into MiB
pub fn memory_mib(raw: &str) -> Option<i64> {
    let (value, suffix) = split(raw)?;
    let bytes = value * multiplier(suffix)?;
    Some((bytes / MIB).round() as i64)
}

fn multiplier(suffix: &str) -> Option<f64> {
    let m = match suffix {
        "" => 1.0,
        "Ki" => 1024.0,
        "Mi" => 1024f64.powi(2),
        "Gi" => 1024f64.powi(3),
        "Ti" => 1024f64.powi(4),
        "Pi" => 1024f64.powi(5),
        "Ei" => 1024f64.powi(6),
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "m" => 1e-3,
        _ => return None,
    };
    Some(m)
}
