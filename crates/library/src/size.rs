//! Human-readable byte sizes.
//!
//! Repeatedly divides by 1024 while the value is at least 1024 and a larger
//! unit exists, then prints at most two decimals with trailing zeros removed.
//! Rounding is half away from zero and done in integer arithmetic, so the
//! output never depends on floating point representation.
//!
//! ```
//! use docshelf_library::{ByteSize, format_size};
//!
//! assert_eq!(format_size(0), "0 B");
//! assert_eq!(format_size(1536), "1.5 KB");
//! assert_eq!(ByteSize(5 * 1024_u64.pow(4)).to_string(), "5 TB");
//! ```

use std::fmt;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// A byte count that displays itself in the largest fitting unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut order = 0;
        let mut divisor: u128 = 1;
        while self.0 as u128 >= divisor * 1024 && order < UNITS.len() - 1 {
            divisor *= 1024;
            order += 1;
        }
        // Hundredths of the unit, rounded half away from zero.
        let hundredths = (self.0 as u128 * 200 + divisor) / (divisor * 2);
        let (whole, fraction) = (hundredths / 100, hundredths % 100);
        match fraction {
            0 => write!(f, "{whole} {}", UNITS[order]),
            f2 if f2 % 10 == 0 => write!(f, "{whole}.{} {}", f2 / 10, UNITS[order]),
            f2 => write!(f, "{whole}.{f2:02} {}", UNITS[order]),
        }
    }
}

/// Format a byte count, e.g. `1536` as `"1.5 KB"`.
pub fn format_size(bytes: u64) -> String {
    ByteSize(bytes).to_string()
}
