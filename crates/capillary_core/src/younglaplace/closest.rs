use super::YoungLaplaceShape;
use crate::autodiff::Jet;
use crate::error::{ErrorKind, ShapeError};
use crate::traits::Scalar;
use log::warn;

impl YoungLaplaceShape {
    /// Arclength of the profile point closest to `(r, z)`.
    ///
    /// Newton iteration on the squared distance, started from the inverse
    /// height of `z` (or the apex for `z <= 0`) on the side given by the sign
    /// of `r`. If the iteration does not settle within the configured budget,
    /// the best iterate seen is returned.
    pub fn closest(&mut self, r: f64, z: f64) -> Result<f64, ShapeError> {
        if !(r.is_finite() && z.is_finite()) {
            return Err(ShapeError::NonFinitePoint { r, z });
        }
        let max = self.settings.max_arclength;
        let tolerance = self.settings.closest_tolerance;

        let mut s = if z > 0.0 {
            match self.z_inv(z) {
                Ok(s) => s,
                Err(err) if err.kind() == ErrorKind::Domain => max,
                Err(err) => return Err(err),
            }
        } else {
            0.0
        };
        if r < 0.0 {
            s = -s;
        }

        let mut best = (s, f64::INFINITY);
        for _ in 0..self.settings.max_closest_iterations {
            let [shape_r, shape_z] = self.shape(Jet::<3>::variable(s))?;
            let e_r = r - shape_r;
            let e_z = z - shape_z;
            let e2 = e_r * e_r + e_z * e_z;
            if e2.value() < best.1 {
                best = (s, e2.value());
            }

            let delta = e2.derivative(1) / e2.derivative(2).abs();
            if !delta.is_finite() {
                break;
            }
            let next = (s - delta).clamp(-max, max);
            if (next - s).abs() < tolerance {
                return Ok(next);
            }
            s = next;
        }

        warn!(
            "closest point to ({r}, {z}) did not converge; using s = {} (squared distance {})",
            best.0, best.1
        );
        Ok(best.0)
    }

    /// [`closest`](Self::closest) for each `(r, z)` pair.
    pub fn closest_many(&mut self, points: &[(f64, f64)]) -> Result<Vec<f64>, ShapeError> {
        points.iter().map(|&(r, z)| self.closest(r, z)).collect()
    }
}
