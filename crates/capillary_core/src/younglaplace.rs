//! Axisymmetric Young-Laplace drop profile, cached as it is integrated.
//!
//! [`YoungLaplaceShape`] evaluates the profile `(r(s), z(s))` of a drop with a
//! given Bond number at arbitrary arclengths `s`. The governing equations are
//! integrated lazily from the apex: a query beyond the cached range advances
//! the integrator one adaptive step at a time, and every accepted step is
//! stored as a breakpoint of a C² quintic spline, so later queries anywhere
//! inside the range are plain spline evaluations. The shape sensitivity to the
//! Bond number, an inverse-height lookup, closest-point projection and
//! volume/surface-area integrals are built on the same cache.

mod closest;
mod height;
mod integrals;
mod profile;
mod sensitivity;

use crate::error::ShapeError;
use crate::solvers::IntegratorSettings;
use log::debug;
use profile::ProfileCache;
use sensitivity::SensitivityCache;
use serde::{Deserialize, Serialize};

/// Tunable constants of a [`YoungLaplaceShape`], fixed for its lifetime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShapeSettings {
    pub rtol: f64,
    pub atol: f64,
    /// Hard bound on `|s|`; queries beyond it are domain errors.
    pub max_arclength: f64,
    /// Length scale handed to the integrator for its first step.
    pub initial_horizon: f64,
    pub closest_tolerance: f64,
    pub max_closest_iterations: usize,
}

impl Default for ShapeSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-10,
            max_arclength: 100.0,
            initial_horizon: 0.1,
            closest_tolerance: 1e-6,
            max_closest_iterations: 10,
        }
    }
}

impl ShapeSettings {
    pub fn validate(&self) -> Result<(), ShapeError> {
        self.integrator().validate()?;
        if !(self.max_arclength.is_finite() && self.max_arclength > 0.0) {
            return Err(ShapeError::InvalidSettings(format!(
                "max_arclength must be positive and finite, got {}",
                self.max_arclength
            )));
        }
        if !(self.closest_tolerance > 0.0) {
            return Err(ShapeError::InvalidSettings(format!(
                "closest_tolerance must be positive, got {}",
                self.closest_tolerance
            )));
        }
        if self.max_closest_iterations == 0 {
            return Err(ShapeError::InvalidSettings(
                "max_closest_iterations must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn integrator(&self) -> IntegratorSettings {
        IntegratorSettings {
            rtol: self.rtol,
            atol: self.atol,
            initial_step: self.initial_horizon,
            ..IntegratorSettings::default()
        }
    }
}

/// Drop profile for one Bond number.
///
/// All queries take `&mut self`: they may extend the internal caches. A single
/// instance must not be shared between threads without external locking;
/// distinct instances are independent.
#[derive(Debug)]
pub struct YoungLaplaceShape {
    bond: f64,
    settings: ShapeSettings,
    profile: ProfileCache,
    sensitivity: SensitivityCache,
}

impl YoungLaplaceShape {
    pub fn new(bond: f64) -> Result<Self, ShapeError> {
        Self::with_settings(bond, ShapeSettings::default())
    }

    pub fn with_settings(bond: f64, settings: ShapeSettings) -> Result<Self, ShapeError> {
        if !bond.is_finite() {
            return Err(ShapeError::InvalidSettings(format!(
                "Bond number must be finite, got {bond}"
            )));
        }
        settings.validate()?;

        let profile = ProfileCache::new(bond, &settings)?;
        let sensitivity = SensitivityCache::new(&settings)?;
        debug!("created Young-Laplace shape with Bond number {bond} ({settings:?})");

        Ok(Self {
            bond,
            settings,
            profile,
            sensitivity,
        })
    }

    pub fn bond(&self) -> f64 {
        self.bond
    }

    pub fn settings(&self) -> &ShapeSettings {
        &self.settings
    }

    fn check_domain(&self, s: f64) -> Result<(), ShapeError> {
        let max = self.settings.max_arclength;
        if !(s.abs() <= max) {
            return Err(ShapeError::OutsideArclength { s, max });
        }
        Ok(())
    }
}

/// Copies share all cached work. Each copy gets its own integrators,
/// restarted from the cache frontier, so copies never alias solver state.
impl Clone for YoungLaplaceShape {
    fn clone(&self) -> Self {
        Self {
            bond: self.bond,
            settings: self.settings,
            profile: self.profile.duplicate(),
            sensitivity: self.sensitivity.duplicate(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.settings != source.settings {
            *self = source.clone();
            return;
        }
        self.bond = source.bond;
        self.profile.reset_from(&source.profile);
        self.sensitivity.reset_from(&source.sensitivity);
    }
}

#[cfg(test)]
mod tests {
    use super::{ShapeSettings, YoungLaplaceShape};
    use crate::autodiff::Jet;
    use crate::error::{ErrorKind, ShapeError};
    use crate::traits::Scalar;

    const BOND: f64 = 0.21;

    fn assert_rel(actual: f64, expected: f64, rel: f64) {
        let scale = expected.abs().max(1e-300);
        assert!(
            (actual - expected).abs() <= rel * scale,
            "expected {expected}, got {actual} (relative tolerance {rel})"
        );
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T, ShapeError>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn shape_matches_reference_profile() {
        let mut shape = YoungLaplaceShape::new(BOND).unwrap();

        let s = [-0.2, -0.1, 0.1, 0.2, 0.4, 0.8, 1.6, 3.2];
        let r = [
            -1.98671000e-1,
            -9.98334690e-2,
            9.98334690e-2,
            1.98671000e-1,
            3.89470759e-1,
            7.18911827e-1,
            1.03671685e+0,
            3.53242294e-1,
        ];
        let z = [
            1.99230742e-2,
            4.99518094e-3,
            4.99518094e-3,
            1.99230742e-2,
            7.87805625e-2,
            3.01185635e-1,
            1.01682486e+0,
            2.40649189e+0,
        ];

        for i in 0..s.len() {
            let [ri, zi] = shape.shape(s[i]).unwrap();
            assert_rel(ri, r[i], 1e-3);
            assert_rel(zi, z[i], 1e-3);
        }

        assert_eq!(shape.shape(0.0).unwrap(), [0.0, 0.0]);
    }

    #[test]
    fn apex_derivatives_follow_initial_conditions() {
        let mut shape = YoungLaplaceShape::new(BOND).unwrap();
        let [r, z] = shape.shape(Jet::<3>::variable(0.0)).unwrap();
        assert_eq!(r.value(), 0.0);
        assert_eq!(z.value(), 0.0);
        assert!((r.derivative(1) - 1.0).abs() < 1e-12);
        assert!(z.derivative(1).abs() < 1e-12);
        assert!((z.derivative(2) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn shape_is_odd_in_r_and_even_in_z() {
        let mut shape = YoungLaplaceShape::new(BOND).unwrap();
        for s in [0.05, 0.3, 1.7, 4.2] {
            let [rp, zp] = shape.shape(s).unwrap();
            let [rn, zn] = shape.shape(-s).unwrap();
            assert_eq!(rn, -rp);
            assert_eq!(zn, zp);
        }

        // Derivatives flip consistently: r is odd, so dr/ds is even.
        let [rp, _] = shape.shape(Jet::<2>::variable(0.3)).unwrap();
        let [rn, zn] = shape.shape(Jet::<2>::variable(-0.3)).unwrap();
        assert!((rn.derivative(1) - rp.derivative(1)).abs() < 1e-12);
        assert!(zn.derivative(1) < 0.0);
    }

    #[test]
    fn repeated_queries_do_not_advance_frontier() {
        let mut shape = YoungLaplaceShape::new(BOND).unwrap();
        let first = shape.shape(1.3).unwrap();
        let frontier = shape.frontier();
        assert!(frontier >= 1.3);

        let second = shape.shape(1.3).unwrap();
        let inner = shape.shape(0.7).unwrap();
        assert_eq!(first, second);
        assert!(inner[0] > 0.0);
        assert_eq!(shape.frontier(), frontier);

        let d1 = shape.dbond(1.3).unwrap();
        let sens_frontier = shape.sensitivity_frontier();
        let d2 = shape.dbond(1.3).unwrap();
        assert_eq!(d1, d2);
        assert_eq!(shape.sensitivity_frontier(), sens_frontier);
    }

    #[test]
    fn arclength_bound_is_inclusive() {
        let settings = ShapeSettings {
            max_arclength: 5.0,
            ..ShapeSettings::default()
        };
        let mut shape = YoungLaplaceShape::with_settings(BOND, settings).unwrap();

        assert!(shape.shape(5.0).is_ok());
        assert!(shape.shape(-5.0).is_ok());

        let err = shape.shape(5.0 + 1e-9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Domain);
        assert_eq!(
            err,
            ShapeError::OutsideArclength {
                s: 5.0 + 1e-9,
                max: 5.0
            }
        );
        assert_err_contains(shape.shape(-6.0), "outside of the solution domain [-5, 5]");
        assert!(shape.shape(f64::NAN).is_err());
        assert!(shape.dbond(5.5).is_err());
        assert!(shape.volume(5.5).is_err());
    }

    #[test]
    fn default_arclength_bound_is_reachable() {
        let mut shape = YoungLaplaceShape::new(BOND).unwrap();
        assert!(shape.shape(100.0).is_ok());
        assert!(shape.frontier() >= 100.0);
        assert_eq!(shape.shape(100.0 + 1e-9).unwrap_err().kind(), ErrorKind::Domain);
    }

    #[test]
    fn batch_evaluation_matches_single_queries() {
        let mut batch = YoungLaplaceShape::new(BOND).unwrap();
        let mut single = batch.clone();

        let s = [1.6, -0.2, 0.0, 3.2, 0.4];
        let many = batch.shape_many(&s).unwrap();
        assert_eq!(many.len(), s.len());
        for (value, si) in many.iter().zip(s) {
            let expected = single.shape(si).unwrap();
            assert!((value[0] - expected[0]).abs() < 1e-7);
            assert!((value[1] - expected[1]).abs() < 1e-7);
        }

        let d = batch.dbond_many(&[0.5, -0.5]).unwrap();
        assert_eq!(d[1][0], -d[0][0]);
        assert_eq!(d[1][1], d[0][1]);

        let err = batch.shape_many(&[0.1, 101.0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Domain);
    }

    #[test]
    fn clone_after_partial_evaluation_reuses_cache() {
        let mut shape1 = YoungLaplaceShape::new(0.123).unwrap();
        shape1.shape(0.5).unwrap();
        shape1.dbond(0.3).unwrap();

        let mut shape2 = shape1.clone();
        assert_eq!(shape2.frontier(), shape1.frontier());
        assert_eq!(shape2.sensitivity_frontier(), shape1.sensitivity_frontier());

        for i in 0..10 {
            let s = i as f64 / 10.0;
            assert_eq!(shape1.shape(s).unwrap(), shape2.shape(s).unwrap());
            assert_eq!(shape1.dbond(s).unwrap(), shape2.dbond(s).unwrap());
        }
        assert_eq!(shape1.frontier(), shape2.frontier());
    }

    #[test]
    fn clone_from_replaces_cache_and_parameter() {
        let mut shape1 = YoungLaplaceShape::new(0.123).unwrap();
        let mut shape2 = YoungLaplaceShape::new(0.456).unwrap();
        shape1.shape(0.5).unwrap();
        shape2.shape(0.5).unwrap();

        shape1.clone_from(&shape2);
        assert_eq!(shape1.bond(), 0.456);

        for i in 0..10 {
            let s = i as f64 / 10.0;
            assert_eq!(shape1.shape(s).unwrap(), shape2.shape(s).unwrap());
        }
    }

    #[test]
    fn clone_from_adopts_source_settings() {
        let loose = ShapeSettings {
            rtol: 1e-6,
            ..ShapeSettings::default()
        };
        let mut target = YoungLaplaceShape::with_settings(0.123, loose).unwrap();
        let mut source = YoungLaplaceShape::new(0.456).unwrap();
        target.shape(2.0).unwrap();
        source.shape(0.5).unwrap();
        source.dbond(0.5).unwrap();

        target.clone_from(&source);
        assert_eq!(target.settings(), source.settings());
        assert_eq!(target.bond(), 0.456);
        assert_eq!(target.frontier(), source.frontier());
        assert_eq!(target.sensitivity_frontier(), source.sensitivity_frontier());
        assert!(!target.max_height_found());

        for i in 0..30 {
            let s = i as f64 / 10.0;
            assert_eq!(target.shape(s).unwrap(), source.shape(s).unwrap());
            assert_eq!(target.dbond(s).unwrap(), source.dbond(s).unwrap());
        }
        assert_eq!(target.z_inv(1.0).unwrap(), source.z_inv(1.0).unwrap());
        assert_eq!(target.z_inv(20.0).unwrap_err(), source.z_inv(20.0).unwrap_err());
        assert_eq!(target.max_height(), source.max_height());
    }

    #[test]
    fn clone_keeps_event_latch() {
        let mut shape = YoungLaplaceShape::new(BOND).unwrap();
        assert!(!shape.max_height_found());
        shape.shape(20.0).unwrap();
        assert!(shape.max_height_found());

        let mut copy = shape.clone();
        assert!(copy.max_height_found());
        assert_eq!(copy.max_height(), shape.max_height());
        assert_eq!(copy.shape(30.0).unwrap(), shape.shape(30.0).unwrap());
    }

    #[test]
    fn invalid_settings_and_bond_are_rejected() {
        let settings = ShapeSettings {
            max_arclength: 0.0,
            ..ShapeSettings::default()
        };
        let err = YoungLaplaceShape::with_settings(BOND, settings).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integration);
        assert!(!err.is_recoverable());

        let settings = ShapeSettings {
            atol: f64::NAN,
            ..ShapeSettings::default()
        };
        assert_err_contains(YoungLaplaceShape::with_settings(BOND, settings), "atol");
        assert_err_contains(YoungLaplaceShape::new(f64::INFINITY), "Bond number");
    }

    #[test]
    fn settings_fill_missing_fields_with_defaults() {
        let settings: ShapeSettings =
            serde_json::from_str(r#"{ "max_arclength": 12.5 }"#).unwrap();
        assert_eq!(settings.max_arclength, 12.5);
        assert_eq!(settings.rtol, ShapeSettings::default().rtol);
        assert_eq!(
            settings.max_closest_iterations,
            ShapeSettings::default().max_closest_iterations
        );
    }
}
