use std::time::Duration;

pub fn format_large_number(n: u64) -> String {
    if n >= 1_000_000_000_000 {
        format!("{:.2}T", n as f64 / 1_000_000_000_000.0)
    } else if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

pub fn format_hashrate(hashrate: f64) -> String {
    if hashrate >= 1_000_000.0 {
        format!("{:.2} MH/s", hashrate / 1_000_000.0)
    } else if hashrate >= 1_000.0 {
        format!("{:.2} KH/s", hashrate / 1_000.0)
    } else {
        format!("{:.0} H/s", hashrate)
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Coin amounts are tiny; show enough decimals to see them move
pub fn format_balance(balance: f64) -> String {
    format!("{:.6}", balance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_large_number() {
        assert_eq!(format_large_number(999), "999");
        assert_eq!(format_large_number(1_500), "1.50K");
        assert_eq!(format_large_number(2_000_000), "2.00M");
        assert_eq!(format_large_number(3_000_000_000), "3.00B");
        assert_eq!(format_large_number(4_000_000_000_000), "4.00T");
    }

    #[test]
    fn test_format_hashrate() {
        assert_eq!(format_hashrate(12.0), "12 H/s");
        assert_eq!(format_hashrate(2_500.0), "2.50 KH/s");
        assert_eq!(format_hashrate(3_000_000.0), "3.00 MH/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(7_260)), "2h 1m");
    }

    #[test]
    fn test_format_balance() {
        assert_eq!(format_balance(0.0005), "0.000500");
    }
}
