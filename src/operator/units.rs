//! Conversions between runtime-native quantities and the size/CPU tokens users type.

/// Placeholder for a value that is unset or could not be read.
pub const NOT_AVAILABLE: &str = "N/A";

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;
const NANOS_PER_CPU: f64 = 1_000_000_000.0;

/// Byte count to a memory token: `10G`, `512m`, `500B`, or `N/A` for zero.
pub fn format_memory(bytes: i64) -> String {
    if bytes <= 0 {
        return NOT_AVAILABLE.to_string();
    }
    let b = bytes as f64;
    if b >= GIB {
        format!("{:.0}G", b / GIB)
    } else if b >= MIB {
        format!("{:.0}m", b / MIB)
    } else {
        format!("{}B", bytes)
    }
}

/// Nano-CPUs to fractional cores with one decimal, or `N/A` for zero.
pub fn format_cpu(nano_cpus: i64) -> String {
    if nano_cpus <= 0 {
        return NOT_AVAILABLE.to_string();
    }
    format!("{:.1}", nano_cpus as f64 / NANOS_PER_CPU)
}

/// Parses a size token the way the runtime CLI does (`512m`, `1.5g`, `10GiB`,
/// `2048`), using binary multipliers.
pub fn parse_size(token: &str) -> Result<i64, String> {
    let token = token.trim();
    let split = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(token.len());
    let (number, suffix) = token.split_at(split);

    if number.is_empty() {
        return Err("expected a number followed by an optional unit (b, k, m, g, t, p)".to_string());
    }
    let value: f64 = number
        .parse()
        .map_err(|_| format!("'{}' is not a number", number))?;

    let suffix = suffix.strip_prefix(' ').unwrap_or(suffix).to_ascii_lowercase();
    let mut chars = suffix.chars().peekable();
    let multiplier = match chars.peek() {
        Some('k') => KIB,
        Some('m') => MIB,
        Some('g') => GIB,
        Some('t') => GIB * KIB,
        Some('p') => GIB * MIB,
        _ => 1.0,
    };
    if multiplier > 1.0 {
        chars.next();
    }
    if chars.peek() == Some(&'i') {
        chars.next();
    }
    if chars.peek() == Some(&'b') {
        chars.next();
    }
    if chars.next().is_some() {
        return Err(format!("unknown unit '{}'", suffix));
    }

    let bytes = value * multiplier;
    if !bytes.is_finite() || bytes >= i64::MAX as f64 {
        return Err("value is too large".to_string());
    }
    if bytes < 1.0 {
        return Err("must be greater than zero".to_string());
    }
    Ok(bytes as i64)
}

/// Parses a fractional core count (`0.5`, `2`) into nano-CPUs.
pub fn parse_cpu(token: &str) -> Result<i64, String> {
    let value: f64 = token
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of CPUs", token.trim()))?;

    if !value.is_finite() || value <= 0.0 {
        return Err("must be a positive number of CPUs".to_string());
    }
    let nanos = (value * NANOS_PER_CPU).round();
    if nanos < 1.0 || nanos >= i64::MAX as f64 {
        return Err("out of range".to_string());
    }
    Ok(nanos as i64)
}

/// Human size with binary units, as shown in usage tables: `12.50MiB`.
pub fn format_binary(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

    if (bytes as f64) < KIB {
        return format!("{}B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < KIB {
            break;
        }
        value /= KIB;
        unit = next;
    }
    format!("{:.2}{}", value, unit)
}

pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_memory() {
        assert_eq!(format_memory(0), "N/A");
        assert_eq!(format_memory(-1), "N/A");
        assert_eq!(format_memory(536_870_912), "512m");
        assert_eq!(format_memory(10_737_418_240), "10G");
        assert_eq!(format_memory(1_073_741_824), "1G");
        assert_eq!(format_memory(500), "500B");
    }

    #[test]
    fn test_format_cpu() {
        assert_eq!(format_cpu(0), "N/A");
        assert_eq!(format_cpu(500_000_000), "0.5");
        assert_eq!(format_cpu(2_000_000_000), "2.0");
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("512m"), Ok(536_870_912));
        assert_eq!(parse_size("512M"), Ok(536_870_912));
        assert_eq!(parse_size("1G"), Ok(1_073_741_824));
        assert_eq!(parse_size("1gib"), Ok(1_073_741_824));
        assert_eq!(parse_size("1.5g"), Ok(1_610_612_736));
        assert_eq!(parse_size("10 GB"), Ok(10_737_418_240));
        assert_eq!(parse_size("2048"), Ok(2048));
        assert_eq!(parse_size("500B"), Ok(500));
        assert_eq!(parse_size("4k"), Ok(4096));
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("lots").is_err());
        assert!(parse_size("12x").is_err());
        assert!(parse_size("1.2.3m").is_err());
        assert!(parse_size("0m").is_err());
        assert!(parse_size("N/A").is_err());
    }

    #[test]
    fn test_formatted_memory_parses_back() {
        for bytes in [536_870_912_i64, 10_737_418_240, 500] {
            assert_eq!(parse_size(&format_memory(bytes)), Ok(bytes));
        }
    }

    #[test]
    fn test_parse_cpu() {
        assert_eq!(parse_cpu("0.5"), Ok(500_000_000));
        assert_eq!(parse_cpu(" 2 "), Ok(2_000_000_000));
        assert!(parse_cpu("0").is_err());
        assert!(parse_cpu("-1").is_err());
        assert!(parse_cpu("half").is_err());
        assert!(parse_cpu("inf").is_err());
    }

    #[test]
    fn test_format_binary() {
        assert_eq!(format_binary(512), "512B");
        assert_eq!(format_binary(13_107_200), "12.50MiB");
        assert_eq!(format_binary(536_870_912), "512.00MiB");
        assert_eq!(format_binary(2_147_483_648), "2.00GiB");
    }
}
