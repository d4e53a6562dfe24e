/// Formats a number of bytes into a human-readable string using binary units.
///
/// # Example
///
/// ```
/// use pkgdb_utils::bytes::format_bytes;
///
/// assert_eq!(format_bytes(1024_u64.pow(2), 2), "1.00 MiB");
/// assert_eq!(format_bytes(512, 0), "512 B");
/// ```
pub fn format_bytes(bytes: u64, precision: usize) -> String {
    const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.*} {}", precision, value, UNITS[unit])
}
