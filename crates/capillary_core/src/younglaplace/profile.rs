use super::height::InverseHeight;
use super::{ShapeSettings, YoungLaplaceShape};
use crate::error::ShapeError;
use crate::interpolate::HermiteQuinticSpline;
use crate::solvers::{AdaptiveIntegrator, RootFn, StepOutcome};
use crate::traits::{Scalar, SecondOrder, SecondOrderSystem};
use log::{debug, trace};

/// Smallest positive subnormal. Added to numerator and denominator of
/// `(dz/ds) / r` so the apex limit evaluates to exactly 1.
pub(super) const TINY: f64 = 5e-324;

/// Apex conditions: `r = z = 0`, `dr/ds = 1`, `dz/ds = 0`.
const APEX: [f64; 4] = [0.0, 0.0, 1.0, 0.0];

/// Event for the first maximum of `z`.
fn vertical_slope(state: &[f64]) -> f64 {
    state[3]
}

/// `r'' = -z' φ'`, `z'' = r' φ'` with `φ' = 2 - Bo z - z' / r`.
#[derive(Debug, Clone, Copy)]
pub(super) struct ProfileEquations {
    pub bond: f64,
}

impl ProfileEquations {
    pub(super) fn curvature_rate(&self, r: f64, z: f64, dz_ds: f64) -> f64 {
        2.0 - self.bond * z - (dz_ds + TINY) / (r + TINY)
    }

    fn accelerations_at(&self, y: &[f64], dy_ds: &[f64]) -> [f64; 2] {
        let dphi_ds = self.curvature_rate(y[0], y[1], dy_ds[1]);
        [-dy_ds[1] * dphi_ds, dy_ds[0] * dphi_ds]
    }
}

impl SecondOrderSystem for ProfileEquations {
    fn order_dimension(&self) -> usize {
        2
    }

    fn accelerations(
        &mut self,
        _s: f64,
        y: &[f64],
        dy_ds: &[f64],
        out: &mut [f64],
    ) -> Result<(), ShapeError> {
        out.copy_from_slice(&self.accelerations_at(y, dy_ds));
        Ok(())
    }
}

/// Dense profile for `s >= 0`, the inverse-height lookup fed by it, and the
/// integrator that extends both.
#[derive(Debug)]
pub(super) struct ProfileCache {
    equations: ProfileEquations,
    initial_horizon: f64,
    dense: HermiteQuinticSpline<2>,
    pub(super) height: InverseHeight,
    max_height_found: bool,
    integrator: AdaptiveIntegrator,
}

impl ProfileCache {
    pub(super) fn new(bond: f64, settings: &ShapeSettings) -> Result<Self, ShapeError> {
        let equations = ProfileEquations { bond };
        let mut integrator = AdaptiveIntegrator::new(0.0, &APEX, settings.integrator())?;
        integrator.set_root(Some(vertical_slope));

        let mut dense = HermiteQuinticSpline::new();
        let acceleration = equations.accelerations_at(&APEX[..2], &APEX[2..]);
        dense.push_back(0.0, [APEX[0], APEX[1]], [APEX[2], APEX[3]], acceleration);

        Ok(Self {
            equations,
            initial_horizon: settings.initial_horizon,
            dense,
            height: InverseHeight::new(),
            max_height_found: false,
            integrator,
        })
    }

    pub(super) fn bond(&self) -> f64 {
        self.equations.bond
    }

    pub(super) fn frontier(&self) -> f64 {
        self.integrator.time()
    }

    pub(super) fn max_height_found(&self) -> bool {
        self.max_height_found
    }

    /// One accepted integrator step, recorded as a new breakpoint.
    pub(super) fn step(&mut self) -> Result<(), ShapeError> {
        let t = self.integrator.time();
        let tout = if self.integrator.is_fresh() {
            t + self.initial_horizon
        } else {
            f64::INFINITY
        };

        let outcome = self
            .integrator
            .step(&mut SecondOrder(&mut self.equations), tout)?;

        let s = self.integrator.time();
        let state = self.integrator.state();
        let value = [state[0], state[1]];
        let velocity = [state[2], state[3]];
        let acceleration = self.equations.accelerations_at(&value, &velocity);
        self.dense.push_back(s, value, velocity, acceleration);

        if !self.max_height_found {
            self.height.record(value[1], s);
            if outcome == StepOutcome::Root {
                self.max_height_found = true;
                self.integrator.set_root(None);
                debug!(
                    "maximum height z = {} reached at s = {s} (Bond number {})",
                    value[1], self.equations.bond
                );
            }
        }

        trace!(
            "profile step to s = {s}: r = {}, z = {}",
            value[0],
            value[1]
        );
        Ok(())
    }

    /// Steps until the cached range covers `target`. No-op for NaN.
    pub(super) fn extend_to(&mut self, target: f64) -> Result<(), ShapeError> {
        while self.frontier() < target {
            self.step()?;
        }
        Ok(())
    }

    /// Profile at `s >= 0`, extending as far as needed without an upper
    /// bound. Callers enforce the public arclength domain.
    pub(super) fn sample<T: Scalar>(&mut self, s: T) -> Result<[T; 2], ShapeError> {
        self.extend_to(s.value())?;
        self.dense.evaluate(s)
    }

    /// Independent copy: cached breakpoints are shared by value and a new
    /// integrator continues from the last of them.
    pub(super) fn duplicate(&self) -> Self {
        let mut integrator = self
            .integrator
            .restarted(self.integrator.time(), self.integrator.state());
        integrator.set_proposed_step(self.integrator.proposed_step());
        integrator.set_root(self.event_root());

        Self {
            equations: self.equations,
            initial_horizon: self.initial_horizon,
            dense: self.dense.clone(),
            height: self.height.clone(),
            max_height_found: self.max_height_found,
            integrator,
        }
    }

    /// Overwrites this cache with `source`'s, reusing allocations.
    pub(super) fn reset_from(&mut self, source: &Self) {
        self.equations = source.equations;
        self.initial_horizon = source.initial_horizon;
        self.dense.clone_from(&source.dense);
        self.height.clone_from(&source.height);
        self.max_height_found = source.max_height_found;
        self.integrator
            .reinit(source.integrator.time(), source.integrator.state());
        self.integrator
            .set_proposed_step(source.integrator.proposed_step());
        self.integrator.set_root(source.event_root());
    }

    fn event_root(&self) -> Option<RootFn> {
        if self.max_height_found {
            None
        } else {
            Some(vertical_slope)
        }
    }
}

impl YoungLaplaceShape {
    /// `[r, z]` at arclength `s`. Negative `s` mirrors the profile:
    /// `r(-s) = -r(s)` and `z(-s) = z(s)`.
    pub fn shape<T: Scalar>(&mut self, s: T) -> Result<[T; 2], ShapeError> {
        self.check_domain(s.value())?;
        self.profile.extend_to(s.value().abs())?;
        self.shape_cached(s)
    }

    /// [`shape`](Self::shape) over a batch. All arclengths are checked
    /// before any integration happens.
    pub fn shape_many(&mut self, s: &[f64]) -> Result<Vec<[f64; 2]>, ShapeError> {
        let furthest = self.furthest(s)?;
        self.profile.extend_to(furthest)?;
        s.iter().map(|&si| self.shape_cached(si)).collect()
    }

    /// Arclength up to which the profile is cached.
    pub fn frontier(&self) -> f64 {
        self.profile.frontier()
    }

    /// Whether integration has passed the first maximum of `z`.
    pub fn max_height_found(&self) -> bool {
        self.profile.max_height_found()
    }

    /// The first maximum of `z`, once integration has reached it.
    pub fn max_height(&self) -> Option<f64> {
        if !self.profile.max_height_found() {
            return None;
        }
        self.profile.height.upper()
    }

    /// Largest `|s|` in a checked batch.
    pub(super) fn furthest(&self, s: &[f64]) -> Result<f64, ShapeError> {
        s.iter().try_fold(0.0f64, |acc, &si| {
            self.check_domain(si)?;
            Ok(acc.max(si.abs()))
        })
    }

    fn shape_cached<T: Scalar>(&self, s: T) -> Result<[T; 2], ShapeError> {
        let negative = s.value() < 0.0;
        let s_abs = if negative { -s } else { s };
        let mut rz = self.profile.dense.evaluate(s_abs)?;
        if negative {
            rz[0] = -rz[0];
        }
        Ok(rz)
    }
}
