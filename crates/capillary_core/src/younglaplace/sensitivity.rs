use super::profile::{ProfileCache, ProfileEquations, TINY};
use super::{ShapeSettings, YoungLaplaceShape};
use crate::autodiff::Jet;
use crate::error::ShapeError;
use crate::interpolate::HermiteQuinticSpline;
use crate::solvers::AdaptiveIntegrator;
use crate::traits::{Scalar, SecondOrder, SecondOrderSystem};
use log::trace;

/// Variational equations of the profile with respect to the Bond number, in
/// the state `[∂r/∂Bo, ∂z/∂Bo]`. The profile enters as forcing and is sampled
/// from (and extended through) the borrowed cache.
struct SensitivityEquations<'a> {
    profile: &'a mut ProfileCache,
}

impl SecondOrderSystem for SensitivityEquations<'_> {
    fn order_dimension(&self) -> usize {
        2
    }

    fn accelerations(
        &mut self,
        s: f64,
        y: &[f64],
        dy_ds: &[f64],
        out: &mut [f64],
    ) -> Result<(), ShapeError> {
        let bond = self.profile.bond();
        let [r, z] = self.profile.sample(Jet::<2>::variable(s))?;
        let (dr_ds, dz_ds) = (r.derivative(1), z.derivative(1));
        let (r, z) = (r.value(), z.value());

        let (dr_dbond, dz_dbond) = (y[0], y[1]);
        let (d2r_dbond_ds, d2z_dbond_ds) = (dy_ds[0], dy_ds[1]);

        let dphi_ds = ProfileEquations { bond }.curvature_rate(r, z, dz_ds);
        let d2phi_dbond_ds = -z - dz_dbond * bond - d2z_dbond_ds / (r + TINY)
            + dr_dbond * dz_ds / (r * r + TINY);

        out[0] = -d2z_dbond_ds * dphi_ds - dz_ds * d2phi_dbond_ds;
        out[1] = d2r_dbond_ds * dphi_ds + dr_ds * d2phi_dbond_ds;
        Ok(())
    }
}

/// Dense `∂(r, z)/∂Bo` for `s >= 0` and its integrator.
#[derive(Debug)]
pub(super) struct SensitivityCache {
    initial_horizon: f64,
    dense: HermiteQuinticSpline<2>,
    integrator: AdaptiveIntegrator,
}

impl SensitivityCache {
    pub(super) fn new(settings: &ShapeSettings) -> Result<Self, ShapeError> {
        let integrator = AdaptiveIntegrator::new(0.0, &[0.0; 4], settings.integrator())?;
        let mut dense = HermiteQuinticSpline::new();
        dense.push_back(0.0, [0.0; 2], [0.0; 2], [0.0; 2]);

        Ok(Self {
            initial_horizon: settings.initial_horizon,
            dense,
            integrator,
        })
    }

    pub(super) fn frontier(&self) -> f64 {
        self.integrator.time()
    }

    fn step(&mut self, profile: &mut ProfileCache) -> Result<(), ShapeError> {
        let t = self.integrator.time();
        let tout = if self.integrator.is_fresh() {
            t + self.initial_horizon
        } else {
            f64::INFINITY
        };

        let mut equations = SensitivityEquations { profile };
        self.integrator.step(&mut SecondOrder(&mut equations), tout)?;

        let s = self.integrator.time();
        let state = self.integrator.state();
        let value = [state[0], state[1]];
        let velocity = [state[2], state[3]];
        let mut acceleration = [0.0; 2];
        equations.accelerations(s, &value, &velocity, &mut acceleration)?;
        self.dense.push_back(s, value, velocity, acceleration);

        trace!(
            "sensitivity step to s = {s}: dr/dBo = {}, dz/dBo = {}",
            value[0],
            value[1]
        );
        Ok(())
    }

    fn extend_to(&mut self, profile: &mut ProfileCache, target: f64) -> Result<(), ShapeError> {
        while self.frontier() < target {
            self.step(profile)?;
        }
        Ok(())
    }

    pub(super) fn duplicate(&self) -> Self {
        let mut integrator = self
            .integrator
            .restarted(self.integrator.time(), self.integrator.state());
        integrator.set_proposed_step(self.integrator.proposed_step());

        Self {
            initial_horizon: self.initial_horizon,
            dense: self.dense.clone(),
            integrator,
        }
    }

    pub(super) fn reset_from(&mut self, source: &Self) {
        self.initial_horizon = source.initial_horizon;
        self.dense.clone_from(&source.dense);
        self.integrator
            .reinit(source.integrator.time(), source.integrator.state());
        self.integrator
            .set_proposed_step(source.integrator.proposed_step());
    }
}

impl YoungLaplaceShape {
    /// `[∂r/∂Bo, ∂z/∂Bo]` at arclength `s`, with the same mirroring as
    /// [`shape`](Self::shape) for negative `s`.
    pub fn dbond<T: Scalar>(&mut self, s: T) -> Result<[T; 2], ShapeError> {
        self.check_domain(s.value())?;
        self.sensitivity
            .extend_to(&mut self.profile, s.value().abs())?;
        self.dbond_cached(s)
    }

    /// [`dbond`](Self::dbond) over a batch, checked up front.
    pub fn dbond_many(&mut self, s: &[f64]) -> Result<Vec<[f64; 2]>, ShapeError> {
        let furthest = self.furthest(s)?;
        self.sensitivity.extend_to(&mut self.profile, furthest)?;
        s.iter().map(|&si| self.dbond_cached(si)).collect()
    }

    /// Arclength up to which the sensitivity is cached.
    pub fn sensitivity_frontier(&self) -> f64 {
        self.sensitivity.frontier()
    }

    fn dbond_cached<T: Scalar>(&self, s: T) -> Result<[T; 2], ShapeError> {
        let negative = s.value() < 0.0;
        let s_abs = if negative { -s } else { s };
        let mut d = self.sensitivity.dense.evaluate(s_abs)?;
        if negative {
            d[0] = -d[0];
        }
        Ok(d)
    }
}
