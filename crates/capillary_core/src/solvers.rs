use crate::error::ShapeError;
use crate::traits::DynamicalSystem;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

// Tsitouras 5(4) tableau.
const C2: f64 = 0.161;
const C3: f64 = 0.327;
const C4: f64 = 0.9;
const C5: f64 = 0.9800255409045097;

const A21: f64 = 0.161;

const A31: f64 = -0.008480655492356989;
const A32: f64 = 0.335480655492357;

const A41: f64 = 2.897153057105493;
const A42: f64 = -6.359448489975075;
const A43: f64 = 4.3622954328695815;

const A51: f64 = 5.325864828439257;
const A52: f64 = -11.748883564062828;
const A53: f64 = 7.4955393428898365;
const A54: f64 = -0.09249506636175525;

const A61: f64 = 5.86145544294642;
const A62: f64 = -12.92096931784711;
const A63: f64 = 8.159367898576159;
const A64: f64 = -0.071584973281401;
const A65: f64 = -0.028269050394068383;

// 5th order weights (FSAL: identical to the seventh stage row).
const B1: f64 = 0.09646076681806523;
const B2: f64 = 0.01;
const B3: f64 = 0.4798896504144996;
const B4: f64 = 1.379008574103742;
const B5: f64 = -3.290069515436081;
const B6: f64 = 2.324710524099774;

// Difference between the 5th and embedded 4th order weights.
const E1: f64 = -0.00178001105222577714;
const E2: f64 = -0.0008164344596567469;
const E3: f64 = 0.007880878010261995;
const E4: f64 = -0.1447110071732629;
const E5: f64 = 0.5823571654525552;
const E6: f64 = -0.45808210592918697;
const E7: f64 = 0.015151515151515152;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;
const MAX_ROOT_ITER: usize = 64;

/// Scalar event function of the state; a sign change across a step is a root.
pub type RootFn = fn(&[f64]) -> f64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IntegratorSettings {
    pub rtol: f64,
    pub atol: f64,
    /// Trial length of the first step after (re)initialisation.
    pub initial_step: f64,
    /// Consecutive rejected attempts tolerated within one step.
    pub max_rejections: usize,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-10,
            initial_step: 0.1,
            max_rejections: 64,
        }
    }
}

impl IntegratorSettings {
    pub fn validate(&self) -> Result<(), ShapeError> {
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            return Err(ShapeError::InvalidSettings(format!(
                "rtol must be positive and finite, got {}",
                self.rtol
            )));
        }
        if !(self.atol.is_finite() && self.atol >= 0.0) {
            return Err(ShapeError::InvalidSettings(format!(
                "atol must be non-negative and finite, got {}",
                self.atol
            )));
        }
        if !(self.initial_step.is_finite() && self.initial_step > 0.0) {
            return Err(ShapeError::InvalidSettings(format!(
                "initial_step must be positive and finite, got {}",
                self.initial_step
            )));
        }
        if self.max_rejections == 0 {
            return Err(ShapeError::InvalidSettings(
                "max_rejections must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a single accepted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced,
    /// The step was shortened to end on a sign change of the armed root function.
    Root,
}

/// Stage buffers for one Tsit5 attempt.
#[derive(Debug, Clone)]
struct Tsit5 {
    k1: DVector<f64>,
    k2: DVector<f64>,
    k3: DVector<f64>,
    k4: DVector<f64>,
    k5: DVector<f64>,
    k6: DVector<f64>,
    k7: DVector<f64>,
    tmp: DVector<f64>,
}

impl Tsit5 {
    fn new(dim: usize) -> Self {
        Self {
            k1: DVector::zeros(dim),
            k2: DVector::zeros(dim),
            k3: DVector::zeros(dim),
            k4: DVector::zeros(dim),
            k5: DVector::zeros(dim),
            k6: DVector::zeros(dim),
            k7: DVector::zeros(dim),
            tmp: DVector::zeros(dim),
        }
    }

    /// Takes one step of size `dt` from `(t0, state)` into `out`.
    /// When `err` is given, it receives the embedded local error estimate.
    fn attempt(
        &mut self,
        system: &mut impl DynamicalSystem,
        t0: f64,
        state: &DVector<f64>,
        dt: f64,
        out: &mut DVector<f64>,
        err: Option<&mut DVector<f64>>,
    ) -> Result<(), ShapeError> {
        let n = state.len();

        // k1
        system.apply(t0, state.as_slice(), self.k1.as_mut_slice())?;

        // k2
        for i in 0..n {
            self.tmp[i] = state[i] + dt * (A21 * self.k1[i]);
        }
        system.apply(t0 + C2 * dt, self.tmp.as_slice(), self.k2.as_mut_slice())?;

        // k3
        for i in 0..n {
            self.tmp[i] = state[i] + dt * (A31 * self.k1[i] + A32 * self.k2[i]);
        }
        system.apply(t0 + C3 * dt, self.tmp.as_slice(), self.k3.as_mut_slice())?;

        // k4
        for i in 0..n {
            self.tmp[i] = state[i] + dt * (A41 * self.k1[i] + A42 * self.k2[i] + A43 * self.k3[i]);
        }
        system.apply(t0 + C4 * dt, self.tmp.as_slice(), self.k4.as_mut_slice())?;

        // k5
        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (A51 * self.k1[i] + A52 * self.k2[i] + A53 * self.k3[i] + A54 * self.k4[i]);
        }
        system.apply(t0 + C5 * dt, self.tmp.as_slice(), self.k5.as_mut_slice())?;

        // k6
        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (A61 * self.k1[i]
                    + A62 * self.k2[i]
                    + A63 * self.k3[i]
                    + A64 * self.k4[i]
                    + A65 * self.k5[i]);
        }
        system.apply(t0 + dt, self.tmp.as_slice(), self.k6.as_mut_slice())?;

        for i in 0..n {
            out[i] = state[i]
                + dt * (B1 * self.k1[i]
                    + B2 * self.k2[i]
                    + B3 * self.k3[i]
                    + B4 * self.k4[i]
                    + B5 * self.k5[i]
                    + B6 * self.k6[i]);
        }

        if let Some(err) = err {
            // k7 = f(t0 + dt, y_new)
            system.apply(t0 + dt, out.as_slice(), self.k7.as_mut_slice())?;
            for i in 0..n {
                err[i] = dt
                    * (E1 * self.k1[i]
                        + E2 * self.k2[i]
                        + E3 * self.k3[i]
                        + E4 * self.k4[i]
                        + E5 * self.k5[i]
                        + E6 * self.k6[i]
                        + E7 * self.k7[i]);
            }
        }

        Ok(())
    }
}

/// Adaptive Tsit5 integrator that advances one accepted step at a time,
/// with optional detection of sign changes of a root function.
#[derive(Debug)]
pub struct AdaptiveIntegrator {
    settings: IntegratorSettings,
    t: f64,
    state: DVector<f64>,
    step_size: Option<f64>,
    root: Option<RootFn>,
    stepper: Tsit5,
    candidate: DVector<f64>,
    error: DVector<f64>,
}

impl AdaptiveIntegrator {
    pub fn new(t0: f64, y0: &[f64], settings: IntegratorSettings) -> Result<Self, ShapeError> {
        settings.validate()?;
        if y0.is_empty() {
            return Err(ShapeError::InvalidSettings(
                "initial state must have positive dimension".to_string(),
            ));
        }
        let dim = y0.len();
        Ok(Self {
            settings,
            t: t0,
            state: DVector::from_column_slice(y0),
            step_size: None,
            root: None,
            stepper: Tsit5::new(dim),
            candidate: DVector::zeros(dim),
            error: DVector::zeros(dim),
        })
    }

    /// Restarts from fresh initial conditions, reusing all buffers.
    /// The armed root function is kept.
    pub fn reinit(&mut self, t0: f64, y0: &[f64]) {
        self.t = t0;
        self.state.copy_from_slice(y0);
        self.step_size = None;
    }

    /// A new integrator with the same settings and root function but none of
    /// this one's step history, started from `(t0, y0)`.
    pub fn restarted(&self, t0: f64, y0: &[f64]) -> Self {
        let dim = self.state.len();
        Self {
            settings: self.settings,
            t: t0,
            state: DVector::from_column_slice(y0),
            step_size: None,
            root: self.root,
            stepper: Tsit5::new(dim),
            candidate: DVector::zeros(dim),
            error: DVector::zeros(dim),
        }
    }

    /// Length the controller will try for the next step; `None` while fresh.
    pub fn proposed_step(&self) -> Option<f64> {
        self.step_size
    }

    /// Seeds the step-size controller, e.g. to continue where another
    /// integrator over the same system left off.
    pub fn set_proposed_step(&mut self, h: Option<f64>) {
        self.step_size = h;
    }

    pub fn set_root(&mut self, root: Option<RootFn>) {
        self.root = root;
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn state(&self) -> &[f64] {
        self.state.as_slice()
    }

    /// True until the first step after construction or [`reinit`](Self::reinit).
    pub fn is_fresh(&self) -> bool {
        self.step_size.is_none()
    }

    /// Advances by exactly one accepted adaptive step. A finite `tout` bounds
    /// the step; pass `f64::INFINITY` to let the controller choose freely.
    pub fn step(
        &mut self,
        system: &mut impl DynamicalSystem,
        tout: f64,
    ) -> Result<StepOutcome, ShapeError> {
        if system.dimension() != self.state.len() {
            return Err(ShapeError::Integration(format!(
                "system dimension {} does not match integrator state dimension {}",
                system.dimension(),
                self.state.len()
            )));
        }

        let remaining = tout - self.t;
        if tout.is_finite() && remaining <= 0.0 {
            return Err(ShapeError::Integration(format!(
                "requested output time {} is not ahead of current time {}",
                tout, self.t
            )));
        }

        let mut h = self.step_size.unwrap_or(self.settings.initial_step);
        if tout.is_finite() {
            h = h.min(remaining);
        }

        let mut rejections = 0usize;
        let factor = loop {
            let min_step = 16.0 * f64::EPSILON * self.t.abs().max(1.0);
            if h < min_step {
                return Err(ShapeError::Integration(format!(
                    "step size {h:e} underflowed at t = {}",
                    self.t
                )));
            }

            self.stepper.attempt(
                system,
                self.t,
                &self.state,
                h,
                &mut self.candidate,
                Some(&mut self.error),
            )?;

            let err_norm = self.error_norm();
            if err_norm <= 1.0 {
                break if err_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                };
            }

            rejections += 1;
            if rejections >= self.settings.max_rejections {
                return Err(ShapeError::Integration(format!(
                    "step rejected {} times at t = {} (error norm {err_norm:e})",
                    rejections, self.t
                )));
            }
            h *= if err_norm.is_finite() {
                (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, 1.0)
            } else {
                MIN_FACTOR
            };
        };

        if self.candidate.iter().any(|v| !v.is_finite()) {
            return Err(ShapeError::Integration(format!(
                "non-finite state after step from t = {}",
                self.t
            )));
        }

        let mut outcome = StepOutcome::Advanced;
        if let Some(root) = self.root {
            let g0 = root(self.state.as_slice());
            let g1 = root(self.candidate.as_slice());
            if g0 != 0.0 && (g1 == 0.0 || (g0 < 0.0) != (g1 < 0.0)) {
                if g1 != 0.0 {
                    h = self.locate_root(system, root, h, g0, g1)?;
                }
                outcome = StepOutcome::Root;
            }
        }

        self.step_size = Some(h * factor);
        self.t = if tout.is_finite() && h >= remaining {
            tout
        } else {
            self.t + h
        };
        std::mem::swap(&mut self.state, &mut self.candidate);

        Ok(outcome)
    }

    /// Steps until exactly `tstop`.
    pub fn evolve(
        &mut self,
        system: &mut impl DynamicalSystem,
        tstop: f64,
    ) -> Result<(), ShapeError> {
        while self.t < tstop {
            self.step(system, tstop)?;
        }
        Ok(())
    }

    /// Illinois regula falsi on the step length within `(0, h)`. Every trial
    /// is a full step from the accepted start state, so the returned length
    /// leaves `candidate` holding the integrated state at the crossing.
    fn locate_root(
        &mut self,
        system: &mut impl DynamicalSystem,
        root: RootFn,
        h: f64,
        g0: f64,
        g1: f64,
    ) -> Result<f64, ShapeError> {
        let (mut a, mut ga) = (0.0, g0);
        let (mut b, mut gb) = (h, g1);
        let tol = 4.0 * f64::EPSILON * (self.t.abs() + h).max(1.0);
        let mut side = 0i8;
        let mut c = b;

        for _ in 0..MAX_ROOT_ITER {
            c = (a * gb - b * ga) / (gb - ga);
            if !(c > a && c < b) {
                c = 0.5 * (a + b);
            }

            self.stepper
                .attempt(system, self.t, &self.state, c, &mut self.candidate, None)?;
            let gc = root(self.candidate.as_slice());

            if gc == 0.0 {
                return Ok(c);
            }
            if (gc < 0.0) == (gb < 0.0) {
                b = c;
                gb = gc;
                if side == -1 {
                    ga *= 0.5;
                }
                side = -1;
            } else {
                a = c;
                ga = gc;
                if side == 1 {
                    gb *= 0.5;
                }
                side = 1;
            }

            if b - a <= tol {
                break;
            }
        }

        // Land on the side past the crossing so the sign change is preserved.
        if c != b {
            self.stepper
                .attempt(system, self.t, &self.state, b, &mut self.candidate, None)?;
        }
        Ok(b)
    }

    fn error_norm(&self) -> f64 {
        let n = self.state.len();
        let mut sum = 0.0;
        for i in 0..n {
            let scale = self.settings.atol
                + self.settings.rtol * self.state[i].abs().max(self.candidate[i].abs());
            let ratio = self.error[i] / scale;
            sum += ratio * ratio;
        }
        (sum / n as f64).sqrt()
    }
}
