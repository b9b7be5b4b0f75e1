//! Angular geometry utilities.
//!
//! Detector coordinates are (pseudorapidity, azimuth) = (eta, phi), with phi
//! in [-π, π]. Every phi difference in the crate goes through [`delta_phi`] so
//! the ±π seam is handled identically everywhere: a raw difference ≥ π wraps
//! down by 2π, one < -π wraps up by 2π. A naive subtraction near the seam
//! reports ~2π for two nearly-identical directions and silently breaks track
//! matching.

use std::f64::consts::PI;

/// Wrap a raw phi difference into [-π, π).
///
/// Assumes both input angles were already in [-π, π], so a single correction
/// suffices.
#[inline]
pub fn wrap_delta_phi(dphi: f64) -> f64 {
    if dphi >= PI {
        dphi - 2.0 * PI
    } else if dphi < -PI {
        dphi + 2.0 * PI
    } else {
        dphi
    }
}

/// Wrapped azimuthal difference `phi1 - phi2`.
#[inline]
pub fn delta_phi(phi1: f64, phi2: f64) -> f64 {
    wrap_delta_phi(phi1 - phi2)
}

/// Angular distance ΔR = sqrt(Δeta² + Δphi²) with wrapped Δphi.
#[inline]
pub fn delta_r(eta1: f64, phi1: f64, eta2: f64, phi2: f64) -> f64 {
    let deta = eta1 - eta2;
    let dphi = delta_phi(phi1, phi2);
    (deta * deta + dphi * dphi).sqrt()
}
