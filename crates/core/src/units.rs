//! Vacuum constants in SI units (CODATA 2018).

/// Vacuum permittivity ε0 in F/m.
pub const EPSILON_0: f64 = 8.854_187_812_8e-12;

/// Vacuum permeability μ0 in H/m.
pub const MU_0: f64 = 1.256_637_062_12e-6;
