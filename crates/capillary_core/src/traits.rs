use crate::error::ShapeError;
use num_traits::{One, Zero};
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A trait for types that splines and shape models can be evaluated with.
/// Implemented for plain `f64` and for the forward-mode [`Jet`](crate::autodiff::Jet),
/// so the same evaluation code yields values or values plus arclength derivatives.
pub trait Scalar:
    Copy
    + Debug
    + Zero
    + One
    + Neg<Output = Self>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
    + 'static
{
    /// The plain value, with any derivative information dropped.
    fn value(&self) -> f64;
}

impl Scalar for f64 {
    fn value(&self) -> f64 {
        *self
    }
}

/// Represents a first-order system `dx/dt = f(t, x)`.
///
/// Unlike a pure vector field, evaluation may mutate the system (the shape
/// equations extend cached trajectories while being sampled) and may fail.
pub trait DynamicalSystem {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// x: current state
    /// out: buffer to write dx/dt
    fn apply(&mut self, t: f64, x: &[f64], out: &mut [f64]) -> Result<(), ShapeError>;
}

/// A second-order system `d²y/ds² = f(s, y, dy/ds)`.
pub trait SecondOrderSystem {
    /// Number of positional components (half of the first-order dimension).
    fn order_dimension(&self) -> usize;

    fn accelerations(
        &mut self,
        s: f64,
        y: &[f64],
        dy_ds: &[f64],
        out: &mut [f64],
    ) -> Result<(), ShapeError>;
}

/// Views a [`SecondOrderSystem`] as a first-order one over the state `[y, dy/ds]`.
pub struct SecondOrder<'a, S: ?Sized>(pub &'a mut S);

impl<S: SecondOrderSystem + ?Sized> DynamicalSystem for SecondOrder<'_, S> {
    fn dimension(&self) -> usize {
        2 * self.0.order_dimension()
    }

    fn apply(&mut self, t: f64, x: &[f64], out: &mut [f64]) -> Result<(), ShapeError> {
        let n = self.0.order_dimension();
        let (y, dy_ds) = x.split_at(n);
        let (out_dy_ds, out_d2y_ds2) = out.split_at_mut(n);
        out_dy_ds.copy_from_slice(dy_ds);
        self.0.accelerations(t, y, dy_ds, out_d2y_ds2)
    }
}
