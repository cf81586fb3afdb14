//! Domain types providing compile-time safety and self-documentation
//!
//! Newtype wrappers keep process IDs, byte counts and megabyte figures from
//! being mixed up in function signatures.

use std::fmt;

/// Process ID
///
/// Represents a process ID in the system (the TGID in kernel terms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

impl From<u32> for Pid {
    fn from(pid: u32) -> Self {
        Pid(pid)
    }
}

impl From<Pid> for u32 {
    fn from(pid: Pid) -> Self {
        pid.0
    }
}

/// Resident memory in bytes, as reported by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Bytes(pub u64);

impl Bytes {
    /// Convert to megabytes (MiB), the unit stored in profile artifacts
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_megabytes(self) -> f64 {
        self.0 as f64 / (1024.0 * 1024.0)
    }
}

impl std::ops::Add for Bytes {
    type Output = Bytes;

    fn add(self, rhs: Bytes) -> Bytes {
        Bytes(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for Bytes {
    fn sum<I: Iterator<Item = Bytes>>(iter: I) -> Bytes {
        iter.fold(Bytes(0), |acc, b| acc + b)
    }
}

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} MiB", self.as_megabytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_display() {
        assert_eq!(Pid(1234).to_string(), "PID:1234");
    }

    #[test]
    fn test_pid_conversion() {
        let pid = Pid::from(1234u32);
        let back: u32 = pid.into();
        assert_eq!(back, 1234);
    }

    #[test]
    fn test_bytes_to_megabytes() {
        assert_eq!(Bytes(1024 * 1024).as_megabytes(), 1.0);
        assert_eq!(Bytes(512 * 1024).as_megabytes(), 0.5);
        assert_eq!(Bytes(0).to_string(), "0.00 MiB");
    }

    #[test]
    fn test_bytes_sum_saturates() {
        let total: Bytes = [Bytes(1), Bytes(2), Bytes(3)].into_iter().sum();
        assert_eq!(total, Bytes(6));
        assert_eq!(Bytes(u64::MAX) + Bytes(1), Bytes(u64::MAX));
    }
}
