//! Display formatting for numbers that come out of headers.

/// Clock rate with a magnitude suffix and three fractional digits.
///
/// The fraction is truncated, not rounded: 3579545 Hz is "3.579 MHz".
pub fn format_clock_rate(hz: u32) -> String {
    match hz {
        0..1_000 => format!("{hz} Hz"),
        1_000..1_000_000 => format!("{}.{:03} kHz", hz / 1_000, hz % 1_000),
        1_000_000..1_000_000_000 => {
            format!("{}.{:03} MHz", hz / 1_000_000, (hz / 1_000) % 1_000)
        }
        _ => format!("{}.{:03} GHz", hz / 1_000_000_000, (hz / 1_000_000) % 1_000),
    }
}

/// `m:ss`, minutes unbounded.
pub fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Packed BCD version word, e.g. 0x0171 -> "1.71".
pub fn format_bcd_version(version: u32) -> String {
    format!("{:x}.{:02x}", version >> 8, version & 0xFF)
}

pub fn format_frequency(hz: u32) -> String {
    format!("{hz} Hz")
}

/// Names of the set bits, lowest bit first, or "(none)".
pub fn format_bitfield(names: &[&str], bits: u32) -> String {
    let set: Vec<&str> = names
        .iter()
        .enumerate()
        .filter(|(i, _)| bits & (1 << i) != 0)
        .map(|(_, n)| *n)
        .collect();
    if set.is_empty() {
        "(none)".to_string()
    } else {
        set.join(", ")
    }
}

/// Sample count at `rate` Hz converted to whole milliseconds.
pub fn samples_to_ms(samples: u32, rate: u32) -> u64 {
    if rate == 0 {
        return 0;
    }
    u64::from(samples) * 1000 / u64::from(rate)
}

pub fn format_samples_as_time(samples: u32, rate: u32) -> String {
    if rate == 0 {
        return format_duration(0);
    }
    format_duration(samples / rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_rate_suffixes() {
        assert_eq!(format_clock_rate(0), "0 Hz");
        assert_eq!(format_clock_rate(500), "500 Hz");
        assert_eq!(format_clock_rate(999), "999 Hz");
        assert_eq!(format_clock_rate(1_000), "1.000 kHz");
        assert_eq!(format_clock_rate(44_100), "44.100 kHz");
        assert_eq!(format_clock_rate(3_579_545), "3.579 MHz");
        assert_eq!(format_clock_rate(7_670_453), "7.670 MHz");
        assert_eq!(format_clock_rate(1_000_000_000), "1.000 GHz");
        assert_eq!(format_clock_rate(u32::MAX), "4.294 GHz");
    }

    #[test]
    fn durations_pad_seconds() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(3600), "60:00");
    }

    #[test]
    fn bcd_versions() {
        assert_eq!(format_bcd_version(0x0171), "1.71");
        assert_eq!(format_bcd_version(0x0150), "1.50");
        assert_eq!(format_bcd_version(0x0101), "1.01");
    }

    #[test]
    fn bitfields_list_set_bits() {
        let names = ["A", "B", "C"];
        assert_eq!(format_bitfield(&names, 0), "(none)");
        assert_eq!(format_bitfield(&names, 0b101), "A, C");
        // bits beyond the names are ignored
        assert_eq!(format_bitfield(&names, 0b1000), "(none)");
    }

    #[test]
    fn sample_conversions() {
        assert_eq!(samples_to_ms(44_100, 44_100), 1000);
        assert_eq!(samples_to_ms(22_050, 44_100), 500);
        assert_eq!(samples_to_ms(10, 0), 0);
        assert_eq!(format_samples_as_time(44_100 * 125, 44_100), "2:05");
    }
}
