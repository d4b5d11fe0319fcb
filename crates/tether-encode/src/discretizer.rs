//! The [`Discretizer`] trait and the equal-width implementation.

use std::fmt;

use tether_core::ConfigError;

/// Maps one continuous scalar to a bin index in `[0, num_bins)`.
///
/// # Contract
///
/// - `bin()` is total: every `f64`, including out-of-range values, NaN,
///   and infinities, maps to a valid bin. Sensor noise never makes
///   encoding fail.
/// - `bin()` is deterministic and `num_bins()` is constant for the
///   lifetime of the instance.
pub trait Discretizer: fmt::Debug + Send + Sync {
    /// Number of bins. Always at least 1.
    fn num_bins(&self) -> usize;

    /// The bin containing `value`.
    fn bin(&self, value: f64) -> usize;
}

/// Splits `[min, max]` into `n` bins of equal width.
///
/// Values below `min` land in bin 0 and values above `max` in bin `n-1`.
/// NaN lands in bin 0.
///
/// A degenerate range (`min == max`) has zero width: every value maps to
/// bin 0 except values strictly greater than `max`, which map to `n-1`.
/// Note the asymmetry: `max` itself maps to bin 0 in the degenerate case
/// but to bin `n-1` when `min < max`.
#[derive(Clone, Debug, PartialEq)]
pub struct EqualWidthDiscretizer {
    min: f64,
    max: f64,
    num_bins: usize,
    bin_width: f64,
}

impl EqualWidthDiscretizer {
    /// Create a discretizer over `[min, max]` with `num_bins` bins.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroBins`] if `num_bins == 0`;
    /// [`ConfigError::InvalidRange`] if either bound is non-finite,
    /// `min > max`, or the bin width of a proper range overflows or
    /// underflows to zero.
    pub fn new(min: f64, max: f64, num_bins: usize) -> Result<Self, ConfigError> {
        if num_bins == 0 {
            return Err(ConfigError::ZeroBins);
        }
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ConfigError::InvalidRange { min, max });
        }
        let bin_width = if max > min {
            (max - min) / num_bins as f64
        } else {
            0.0
        };
        // A proper range needs a representable, non-zero width, otherwise
        // `max` no longer lands in the last bin.
        if max > min && !(bin_width.is_finite() && bin_width > 0.0) {
            return Err(ConfigError::InvalidRange { min, max });
        }
        Ok(Self {
            min,
            max,
            num_bins,
            bin_width,
        })
    }

    /// Lower bound of the range.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper bound of the range.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Width of each bin; zero for a degenerate range.
    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// The half-open value interval `[lo, hi)` covered by `bin`, ignoring
    /// the clamping of out-of-range values. `None` if `bin` is out of range.
    pub fn bin_range(&self, bin: usize) -> Option<(f64, f64)> {
        if bin >= self.num_bins {
            return None;
        }
        let lo = self.min + bin as f64 * self.bin_width;
        Some((lo, lo + self.bin_width))
    }
}

impl Discretizer for EqualWidthDiscretizer {
    fn num_bins(&self) -> usize {
        self.num_bins
    }

    fn bin(&self, value: f64) -> usize {
        let last = self.num_bins - 1;
        if self.bin_width == 0.0 {
            return if value > self.max { last } else { 0 };
        }
        let raw = ((value - self.min) / self.bin_width).floor();
        if raw.is_nan() || raw <= 0.0 {
            0
        } else if raw >= last as f64 {
            last
        } else {
            raw as usize
        }
    }
}
