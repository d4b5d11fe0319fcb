//! Mixed-radix composition of discretizers into a single [`StateId`].

use smallvec::SmallVec;

use tether_core::{ConfigError, EncodeError, Observation, StateId};

use crate::discretizer::Discretizer;

/// Per-dimension bin indices of one state.
///
/// Uses `SmallVec<[usize; 8]>` to avoid heap allocation for the usual
/// low-dimensional sensor vectors.
pub type Bins = SmallVec<[usize; 8]>;

/// Encodes an observation as one integer state id.
///
/// Given discretizers `d_1..d_k` with bin counts `b_1..b_k`, the id of an
/// observation `x` is
///
/// ```text
/// id = Σ bin_i(x_i) * Π_{j<i} b_j
/// ```
///
/// so the first discretizer is the least-significant digit. The encoding
/// is a bijection between the Cartesian product of bins and
/// `[0, number_of_values)`. Discretizer order is part of the contract:
/// anything that decodes ids must use the same order.
#[derive(Debug)]
pub struct StateIdEncoder {
    discretizers: Vec<Box<dyn Discretizer>>,
    /// `strides[i] = Π_{j<i} b_j`.
    strides: Vec<u64>,
    number_of_values: u64,
}

impl StateIdEncoder {
    /// Build an encoder from an ordered list of discretizers.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoDiscretizers`] if the list is empty,
    /// [`ConfigError::ZeroBins`] if a discretizer reports zero bins, and
    /// [`ConfigError::StateSpaceOverflow`] if the product of bin counts
    /// does not fit in a `u64`.
    pub fn new(discretizers: Vec<Box<dyn Discretizer>>) -> Result<Self, ConfigError> {
        if discretizers.is_empty() {
            return Err(ConfigError::NoDiscretizers);
        }
        let mut strides = Vec::with_capacity(discretizers.len());
        let mut radix: u64 = 1;
        for d in &discretizers {
            let bins = d.num_bins();
            if bins == 0 {
                return Err(ConfigError::ZeroBins);
            }
            strides.push(radix);
            radix = u64::try_from(bins)
                .ok()
                .and_then(|b| radix.checked_mul(b))
                .ok_or(ConfigError::StateSpaceOverflow)?;
        }
        Ok(Self {
            discretizers,
            strides,
            number_of_values: radix,
        })
    }

    /// Number of observation dimensions this encoder expects.
    pub fn dimensions(&self) -> usize {
        self.discretizers.len()
    }

    /// Total number of distinct state ids (`Π b_i`).
    pub fn number_of_values(&self) -> u64 {
        self.number_of_values
    }

    /// Encode an observation.
    ///
    /// # Errors
    ///
    /// [`EncodeError::DimensionMismatch`] if the observation length is not
    /// [`dimensions()`](Self::dimensions).
    pub fn encode(&self, observation: &Observation) -> Result<StateId, EncodeError> {
        self.check_dimensions(observation)?;
        let id = self
            .discretizers
            .iter()
            .zip(&self.strides)
            .zip(observation.as_slice())
            .map(|((d, stride), &x)| d.bin(x) as u64 * stride)
            .sum();
        Ok(StateId(id))
    }

    /// The per-dimension bins of an observation, in discretizer order.
    pub fn bins(&self, observation: &Observation) -> Result<Bins, EncodeError> {
        self.check_dimensions(observation)?;
        Ok(self
            .discretizers
            .iter()
            .zip(observation.as_slice())
            .map(|(d, &x)| d.bin(x))
            .collect())
    }

    /// Invert [`encode`](Self::encode): recover the per-dimension bins.
    ///
    /// Returns `None` if `state` is not below
    /// [`number_of_values()`](Self::number_of_values).
    pub fn decode(&self, state: StateId) -> Option<Bins> {
        if state.0 >= self.number_of_values {
            return None;
        }
        let mut rest = state.0;
        let mut bins = Bins::with_capacity(self.discretizers.len());
        for d in &self.discretizers {
            let radix = d.num_bins() as u64;
            bins.push((rest % radix) as usize);
            rest /= radix;
        }
        Some(bins)
    }

    fn check_dimensions(&self, observation: &Observation) -> Result<(), EncodeError> {
        if observation.len() != self.discretizers.len() {
            return Err(EncodeError::DimensionMismatch {
                expected: self.discretizers.len(),
                got: observation.len(),
            });
        }
        Ok(())
    }
}
