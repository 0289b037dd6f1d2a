/// Default number of magnetometer samples collected before fitting
pub const MAG_SAMPLES: usize = 3000;

/// Default cap on the number of sphere fit refinement iterations
pub const MAG_MAX_ITERATIONS: u32 = 1000;

/// Default squared step length at which the sphere fit stops early.
/// Zero means the full iteration budget is spent unless a step is exactly zero.
pub const MAG_CONVERGENCE_DELTA: f32 = 0.0;

/// Largest accepted relative deviation between a live field magnitude and the fitted radius
pub const MAG_MAX_DEVIATION: f32 = 0.3;

/// A calibration whose offset components and radius multiply to less than
/// this is considered to never have been calibrated.
pub const MAG_UNCALIBRATED_EPS: f32 = 1e-8;

/// Length of a parameter identifier in bytes, matching MAVLink `param_id`
pub const PARAM_IDENT_LEN: usize = 16;
