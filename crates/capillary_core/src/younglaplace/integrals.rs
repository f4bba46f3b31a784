use super::profile::ProfileCache;
use super::YoungLaplaceShape;
use crate::autodiff::Jet;
use crate::error::ShapeError;
use crate::solvers::AdaptiveIntegrator;
use crate::traits::{DynamicalSystem, Scalar};
use log::debug;
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantity {
    /// `dV/ds = π r² dz/ds`
    Volume,
    /// `dA/ds = 2π r`
    SurfaceArea,
}

/// Integrand of a solid-of-revolution quantity along the profile.
struct Integrand<'a> {
    quantity: Quantity,
    profile: &'a mut ProfileCache,
}

impl DynamicalSystem for Integrand<'_> {
    fn dimension(&self) -> usize {
        1
    }

    fn apply(&mut self, s: f64, _x: &[f64], out: &mut [f64]) -> Result<(), ShapeError> {
        out[0] = match self.quantity {
            Quantity::Volume => {
                let [r, z] = self.profile.sample(Jet::<2>::variable(s))?;
                PI * r.value() * r.value() * z.derivative(1)
            }
            Quantity::SurfaceArea => {
                let [r, _] = self.profile.sample(s)?;
                2.0 * PI * r
            }
        };
        Ok(())
    }
}

impl YoungLaplaceShape {
    /// Volume enclosed between the apex and arclength `s`, rotating the
    /// profile about the z axis. Even in `s`.
    pub fn volume(&mut self, s: f64) -> Result<f64, ShapeError> {
        self.integrate(Quantity::Volume, s)
    }

    /// Area of the surface of revolution between the apex and arclength `s`.
    /// Even in `s`.
    pub fn surface_area(&mut self, s: f64) -> Result<f64, ShapeError> {
        self.integrate(Quantity::SurfaceArea, s)
    }

    fn integrate(&mut self, quantity: Quantity, s: f64) -> Result<f64, ShapeError> {
        self.check_domain(s)?;
        let s = s.abs();

        let mut integrator = AdaptiveIntegrator::new(0.0, &[0.0], self.settings.integrator())?;
        if s > 0.0 {
            let mut integrand = Integrand {
                quantity,
                profile: &mut self.profile,
            };
            integrator.evolve(&mut integrand, s)?;
        }

        let total = integrator.state()[0];
        debug!("{quantity:?} up to s = {s}: {total}");
        Ok(total)
    }
}
