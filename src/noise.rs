//! Hash-based 3D value noise used by the analytic flow kinds.

use glam::Vec3;

#[inline]
fn hash(n: f32) -> f32 {
    let s = n.sin() * 43_758.547;
    s - s.floor()
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Smooth value noise in `[-1, 1]`.
///
/// Lattice values come from a sine hash of the integer cell, blended with a
/// smoothstep fade. Deterministic for a given input.
pub fn value_noise(p: Vec3) -> f32 {
    let i = p.floor();
    let f = p - i;
    let f = f * f * (Vec3::splat(3.0) - 2.0 * f);

    let n = i.x + i.y * 57.0 + i.z * 113.0;

    let k0 = lerp(hash(n), hash(n + 1.0), f.x);
    let k1 = lerp(hash(n + 57.0), hash(n + 58.0), f.x);
    let k2 = lerp(hash(n + 113.0), hash(n + 114.0), f.x);
    let k3 = lerp(hash(n + 170.0), hash(n + 171.0), f.x);

    let k4 = lerp(k0, k1, f.y);
    let k5 = lerp(k2, k3, f.y);

    lerp(k4, k5, f.z) * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_in_range() {
        for i in 0..500 {
            let t = i as f32 * 0.37;
            let v = value_noise(Vec3::new(t, t * 0.5 - 3.0, 11.0 - t));
            assert!((-1.0..=1.0).contains(&v), "noise out of range: {}", v);
        }
    }

    #[test]
    fn test_noise_deterministic() {
        let p = Vec3::new(1.25, -7.5, 3.0);
        assert_eq!(value_noise(p), value_noise(p));
    }

    #[test]
    fn test_noise_continuous() {
        let p = Vec3::new(4.3, 2.1, -0.7);
        let a = value_noise(p);
        let b = value_noise(p + Vec3::splat(1e-4));
        assert!((a - b).abs() < 1e-2);
    }
}
