//! Append-only dense-output splines.
//!
//! Both splines grow one breakpoint at a time as an integrator advances and
//! can be evaluated anywhere inside the covered range, with either `f64` or a
//! [`Jet`](crate::autodiff::Jet) query so derivatives propagate through the
//! interpolating polynomial.

use crate::error::ShapeError;
use crate::traits::Scalar;
use nalgebra::SVector;

/// A knot of a [`HermiteQuinticSpline`]: value, velocity and acceleration at `t`.
#[derive(Debug, Clone, PartialEq)]
struct Breakpoint<const N: usize> {
    t: f64,
    value: SVector<f64, N>,
    velocity: SVector<f64, N>,
    acceleration: SVector<f64, N>,
}

/// C² piecewise quintic through breakpoints that match value, first and
/// second derivative at both ends of every segment.
#[derive(Debug, Clone, Default)]
pub struct HermiteQuinticSpline<const N: usize> {
    breaks: Vec<Breakpoint<N>>,
}

impl<const N: usize> HermiteQuinticSpline<N> {
    pub fn new() -> Self {
        Self { breaks: Vec::new() }
    }

    /// Appends a breakpoint. `t` must be strictly greater than every
    /// breakpoint already stored.
    pub fn push_back(
        &mut self,
        t: f64,
        value: [f64; N],
        velocity: [f64; N],
        acceleration: [f64; N],
    ) {
        self.breaks.push(Breakpoint {
            t,
            value: SVector::from(value),
            velocity: SVector::from(velocity),
            acceleration: SVector::from(acceleration),
        });
    }

    pub fn len(&self) -> usize {
        self.breaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breaks.is_empty()
    }

    /// `(first, last)` breakpoint times.
    pub fn domain(&self) -> Option<(f64, f64)> {
        Some((self.breaks.first()?.t, self.breaks.last()?.t))
    }

    pub fn evaluate<T: Scalar>(&self, t: T) -> Result<[T; N], ShapeError> {
        let tv = t.value();
        check_domain(tv, self.domain())?;

        if let [only] = self.breaks.as_slice() {
            let eps = t - only.t;
            return Ok(std::array::from_fn(|j| {
                eps * only.velocity[j] + eps * eps * (0.5 * only.acceleration[j])
                    + only.value[j]
            }));
        }

        let i = segment_index(tv, self.breaks.len(), |k| self.breaks[k].t);
        let b0 = &self.breaks[i - 1];
        let b1 = &self.breaks[i];
        let dt = b1.t - b0.t;

        let x = (t - b0.t) / dt;
        let x2 = x * x;
        let x3 = x2 * x;

        Ok(std::array::from_fn(|j| {
            (T::one() - x3 * ((x * 6.0 - 15.0) * x + 10.0)) * b0.value[j]
                + x * (x2 * ((x * -3.0 + 8.0) * x - 6.0) + 1.0) * (dt * b0.velocity[j])
                + x2 * (x * (x * (-x + 3.0) - 3.0) + 1.0) * (0.5 * dt * dt * b0.acceleration[j])
                + x3 * ((x * (x - 2.0) + 1.0) * (0.5 * dt * dt * b1.acceleration[j])
                    + (x * (x * -3.0 + 7.0) - 4.0) * (dt * b1.velocity[j])
                    + (x * (x * 6.0 - 15.0) + 10.0) * b1.value[j])
        }))
    }
}

/// Piecewise-linear interpolant with cached segment slopes.
#[derive(Debug, Clone, Default)]
pub struct LinearSpline {
    t_breaks: Vec<f64>,
    y_breaks: Vec<f64>,
    slopes: Vec<f64>,
}

impl LinearSpline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, t: f64, y: f64) {
        if let (Some(&t0), Some(&y0)) = (self.t_breaks.last(), self.y_breaks.last()) {
            self.slopes.push((y - y0) / (t - t0));
        }
        self.t_breaks.push(t);
        self.y_breaks.push(y);
    }

    pub fn len(&self) -> usize {
        self.t_breaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t_breaks.is_empty()
    }

    pub fn domain(&self) -> Option<(f64, f64)> {
        Some((*self.t_breaks.first()?, *self.t_breaks.last()?))
    }

    pub fn evaluate<T: Scalar>(&self, t: T) -> Result<T, ShapeError> {
        let tv = t.value();
        check_domain(tv, self.domain())?;

        if self.t_breaks.len() == 1 {
            // Zero slope keeps the query's derivative structure.
            return Ok(t * 0.0 + self.y_breaks[0]);
        }

        let i = segment_index(tv, self.t_breaks.len(), |k| self.t_breaks[k]);
        Ok((t - self.t_breaks[i - 1]) * self.slopes[i - 1] + self.y_breaks[i - 1])
    }
}

fn check_domain(t: f64, domain: Option<(f64, f64)>) -> Result<(), ShapeError> {
    let (lower, upper) = domain.ok_or(ShapeError::EmptySpline)?;
    if !(t >= lower && t <= upper) {
        return Err(ShapeError::OutsideInterpolation { t, lower, upper });
    }
    Ok(())
}

/// Index `i` of the segment `(t[i-1], t[i]]` holding `t`; the last breakpoint
/// itself maps to the final segment. Requires at least two breakpoints and `t`
/// inside the domain.
fn segment_index(t: f64, len: usize, t_at: impl Fn(usize) -> f64) -> usize {
    if t == t_at(len - 1) {
        return len - 1;
    }
    // First breakpoint strictly greater than t.
    let (mut lo, mut hi) = (0usize, len);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if t_at(mid) <= t {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}
