//! Mass constants and m/z conversions.

/// Mass of a proton in Da.
pub const PROTON: f64 = 1.007_276;

/// Monoisotopic mass of water in Da.
pub const H2O: f64 = 18.010_565;

/// Mass difference between 13C and 12C in Da.
pub const C13_SHIFT: f64 = 1.003_35;

/// Difference `a - b`, in Da when `mode_is_da`, otherwise in ppm relative to `b`.
pub fn mass_diff(a: f64, b: f64, mode_is_da: bool) -> f64 {
    if mode_is_da {
        a - b
    } else {
        (a - b) / b * 1e6
    }
}

/// Neutral mass of an ion observed at `mz` with the given charge.
pub fn neutral_mass(mz: f64, charge: u32) -> f64 {
    let z = charge.max(1) as f64;
    (mz - PROTON) * z
}

/// m/z of a neutral mass carrying `charge` protons.
pub fn mz_from_mass(mass: f64, charge: u32) -> f64 {
    let z = charge.max(1) as f64;
    mass / z + PROTON
}
