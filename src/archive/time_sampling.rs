//! Time sampling
//!
//! Every animated property points at one of the archive's time samplings,
//! which map sample indices to times in seconds.

use crate::error::{Error, Result};

/// Time-per-cycle value that marks acyclic sampling on disk
pub const ACYCLIC_TIME_PER_CYCLE: f64 = f64::MAX / 32.0;

/// Tolerance used when snapping a time onto a sample
const CHRONO_EPSILON: f64 = f64::EPSILON * 32.0;

/// How sample indices map to times
#[derive(Debug, Clone, PartialEq)]
pub enum TimeSampling {
    /// `start_time + index * time_per_cycle`
    Uniform {
        /// Seconds between samples
        time_per_cycle: f64,
        /// Time of sample 0
        start_time: f64,
    },
    /// A repeating pattern of times, shifted by `time_per_cycle` each cycle
    Cyclic {
        /// Length of one cycle in seconds
        time_per_cycle: f64,
        /// Sample times within the first cycle
        times: Vec<f64>,
    },
    /// One explicit time per sample
    Acyclic {
        /// Sample times
        times: Vec<f64>,
    },
}

impl TimeSampling {
    /// The default sampling at index 0 of every archive: one sample per second from 0
    pub fn identity() -> Self {
        TimeSampling::Uniform {
            time_per_cycle: 1.0,
            start_time: 0.0,
        }
    }

    /// Uniform sampling at `fps` frames per second starting at `start_time`
    pub fn uniform_fps(fps: f64, start_time: f64) -> Self {
        TimeSampling::Uniform {
            time_per_cycle: 1.0 / fps,
            start_time,
        }
    }

    /// Time of the sample at `index`
    pub fn sample_time(&self, index: usize) -> f64 {
        match self {
            TimeSampling::Uniform {
                time_per_cycle,
                start_time,
            } => start_time + index as f64 * time_per_cycle,
            TimeSampling::Cyclic {
                time_per_cycle,
                times,
            } => {
                if times.is_empty() {
                    return 0.0;
                }
                let cycle = index / times.len();
                times[index % times.len()] + cycle as f64 * time_per_cycle
            }
            TimeSampling::Acyclic { times } => times
                .get(index)
                .or(times.last())
                .copied()
                .unwrap_or(0.0),
        }
    }

    /// Largest sample index whose time is at or before `time`
    ///
    /// Times before the first sample map to index 0 and times after the last
    /// map to `num_samples - 1`. Returns the index and its time.
    pub fn floor_index(&self, time: f64, num_samples: usize) -> (usize, f64) {
        if num_samples == 0 {
            return (0, self.sample_time(0));
        }

        let last = num_samples - 1;
        let min_time = self.sample_time(0);
        if time <= min_time {
            return (0, min_time);
        }
        let max_time = self.sample_time(last);
        if time >= max_time {
            return (last, max_time);
        }

        let index = match self {
            TimeSampling::Uniform {
                time_per_cycle,
                start_time,
            } => {
                let mut index = (((time - start_time) / time_per_cycle).floor() as usize).min(last);
                // Snap up when float error leaves us one sample short
                if index < last && (self.sample_time(index + 1) - time).abs() <= CHRONO_EPSILON {
                    index += 1;
                }
                index
            }
            TimeSampling::Cyclic { .. } | TimeSampling::Acyclic { .. } => {
                let (mut lo, mut hi) = (0usize, num_samples);
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    if self.sample_time(mid) <= time + CHRONO_EPSILON {
                        lo = mid + 1;
                    } else {
                        hi = mid;
                    }
                }
                lo.saturating_sub(1)
            }
        };

        (index, self.sample_time(index))
    }

    /// Time per cycle as stored on disk
    fn stored_time_per_cycle(&self) -> f64 {
        match self {
            TimeSampling::Uniform { time_per_cycle, .. }
            | TimeSampling::Cyclic { time_per_cycle, .. } => *time_per_cycle,
            TimeSampling::Acyclic { .. } => ACYCLIC_TIME_PER_CYCLE,
        }
    }

    /// Sample times as stored on disk
    fn stored_times(&self) -> Vec<f64> {
        match self {
            TimeSampling::Uniform { start_time, .. } => vec![*start_time],
            TimeSampling::Cyclic { times, .. } | TimeSampling::Acyclic { times } => times.clone(),
        }
    }
}

impl Default for TimeSampling {
    fn default() -> Self {
        Self::identity()
    }
}

/// Decode the archive's time sampling table
///
/// Each entry is `u32 max_sample, f64 time_per_cycle, u32 count, f64 × count`.
/// Returns the samplings paired with the largest sample count recorded for each.
pub(crate) fn read_time_samplings(buf: &[u8]) -> Result<Vec<(TimeSampling, u32)>> {
    let mut samplings = Vec::new();
    let mut pos = 0usize;

    while pos < buf.len() {
        let fixed = buf
            .get(pos..pos + 16)
            .ok_or_else(|| Error::InvalidArchive("time sampling entry truncated".to_string()))?;
        let max_sample = u32::from_le_bytes([fixed[0], fixed[1], fixed[2], fixed[3]]);
        let time_per_cycle = f64::from_le_bytes(fixed[4..12].try_into().unwrap_or([0; 8]));
        let count = u32::from_le_bytes([fixed[12], fixed[13], fixed[14], fixed[15]]) as usize;
        pos += 16;

        if count == 0 {
            return Err(Error::InvalidArchive(
                "time sampling with no sample times".to_string(),
            ));
        }
        let times_bytes = count
            .checked_mul(8)
            .and_then(|len| buf.get(pos..pos + len))
            .ok_or_else(|| Error::InvalidArchive("time sampling times truncated".to_string()))?;
        let times: Vec<f64> = times_bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect();
        pos += count * 8;

        let sampling = if time_per_cycle == ACYCLIC_TIME_PER_CYCLE {
            TimeSampling::Acyclic { times }
        } else if count == 1 {
            TimeSampling::Uniform {
                time_per_cycle,
                start_time: times[0],
            }
        } else {
            TimeSampling::Cyclic {
                time_per_cycle,
                times,
            }
        };
        samplings.push((sampling, max_sample));
    }

    Ok(samplings)
}

/// Encode a time sampling table in the layout [`read_time_samplings`] expects
pub(crate) fn write_time_samplings(samplings: &[(TimeSampling, u32)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (sampling, max_sample) in samplings {
        let times = sampling.stored_times();
        buf.extend_from_slice(&max_sample.to_le_bytes());
        buf.extend_from_slice(&sampling.stored_time_per_cycle().to_le_bytes());
        buf.extend_from_slice(&(times.len() as u32).to_le_bytes());
        for time in times {
            buf.extend_from_slice(&time.to_le_bytes());
        }
    }
    buf
}
