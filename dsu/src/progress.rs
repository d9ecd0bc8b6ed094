//! Per-partition progress accounting.

/// Fraction of a partition transferred so far, in `[0, 1]`.
///
/// Returns `0.0` while nothing has been read or when the total is unknown, so an
/// unsized stream reports indeterminate progress instead of instant completion.
pub fn fraction(bytes_read: u64, total_bytes: u64) -> f32 {
    if bytes_read == 0 || total_bytes == 0 {
        return 0.0;
    }
    (bytes_read as f64 / total_bytes as f64).min(1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_inputs() {
        assert_eq!(fraction(0, 0), 0.0);
        assert_eq!(fraction(0, 100), 0.0);
        assert_eq!(fraction(100, 0), 0.0);
    }

    #[test]
    fn test_bounded() {
        assert_eq!(fraction(100, 100), 1.0);
        // Streams may run past a stale declared size.
        assert_eq!(fraction(150, 100), 1.0);
        assert!((fraction(25, 100) - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_monotonic() {
        let total = 10 * 1024 * 1024;
        let mut last = 0.0;
        for read in (0..=total).step_by(8192) {
            let f = fraction(read, total);
            assert!(f >= last);
            assert!((0.0..=1.0).contains(&f));
            last = f;
        }
    }
}
