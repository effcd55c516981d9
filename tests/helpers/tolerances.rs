//! Tolerance constants for voice transformation tests.

/// Floating point rounding through FFT and overlap-add.
pub const DSP_EPSILON: f32 = 1e-4;

/// Identity reconstruction bound, relative error in dB.
pub const IDENTITY_ERROR_DB: f32 = -60.0;

/// Relative F0 error accepted after a pitch shift.
pub const F0_TOLERANCE: f32 = 0.01;

/// Boundary discontinuity ratio of a click-free signal.
pub const SMOOTH_BOUNDARY_RATIO: f32 = 1.5;

/// Silence threshold (~-80dB).
pub const SILENCE_THRESHOLD: f32 = 0.0001;
