use super::YoungLaplaceShape;
use crate::error::ShapeError;
use crate::interpolate::LinearSpline;
use crate::traits::Scalar;

/// Piecewise-linear `s(z)` over the rising part of the profile, where `z` is
/// strictly increasing in `s`. Recording stops once the maximum height latches.
#[derive(Debug, Clone)]
pub(super) struct InverseHeight {
    lookup: LinearSpline,
}

impl InverseHeight {
    pub(super) fn new() -> Self {
        let mut lookup = LinearSpline::new();
        lookup.push_back(0.0, 0.0);
        Self { lookup }
    }

    pub(super) fn record(&mut self, z: f64, s: f64) {
        self.lookup.push_back(z, s);
    }

    pub(super) fn lower(&self) -> f64 {
        self.lookup.domain().map_or(0.0, |(lower, _)| lower)
    }

    /// Highest `z` recorded so far.
    pub(super) fn upper(&self) -> Option<f64> {
        self.lookup.domain().map(|(_, upper)| upper)
    }
}

impl YoungLaplaceShape {
    /// Arclength at which the profile first reaches height `z`.
    ///
    /// Defined on `[0, z_max]`, with `z_max` the first maximum of `z`. The
    /// profile is integrated until it rises past `z`, reaches its maximum, or
    /// hits the arclength bound.
    pub fn z_inv<T: Scalar>(&mut self, z: T) -> Result<T, ShapeError> {
        let target = z.value();
        let max = self.settings.max_arclength;

        while !self.profile.max_height_found()
            && self.profile.height.upper().is_some_and(|upper| upper < target)
            && self.profile.frontier() < max
        {
            self.profile.step()?;
        }

        let height = &self.profile.height;
        let lower = height.lower();
        let reached = height.upper().unwrap_or(lower);
        if !(target >= lower && target <= reached) {
            return Err(ShapeError::OutsideHeight {
                z: target,
                lower,
                upper: self.profile.max_height_found().then_some(reached),
            });
        }

        height.lookup.evaluate(z)
    }
}

#[cfg(test)]
mod tests {
    use crate::autodiff::Jet;
    use crate::error::{ErrorKind, ShapeError};
    use crate::traits::Scalar;
    use crate::younglaplace::{ShapeSettings, YoungLaplaceShape};

    #[test]
    fn inverse_height_matches_reference() {
        let mut shape = YoungLaplaceShape::new(0.21).unwrap();

        let s = [0.0, 0.1, 0.2, 0.4, 0.8, 1.6, 3.2];
        let z = [
            0.00000000e+0,
            4.99518094e-3,
            1.99230742e-2,
            7.87805625e-2,
            3.01185635e-1,
            1.01682486e+0,
            2.40649189e+0,
        ];

        for i in 0..z.len() {
            let si = shape.z_inv(z[i]).unwrap();
            let tol = 5e-2 * s[i];
            assert!(
                (si - s[i]).abs() <= tol,
                "z_inv({}) = {si}, expected {}",
                z[i],
                s[i]
            );
        }
    }

    #[test]
    fn inverse_height_inverts_shape() {
        let mut shape = YoungLaplaceShape::new(0.21).unwrap();
        for s in [0.3, 1.1, 2.7] {
            let [_, z] = shape.shape(s).unwrap();
            let back = shape.z_inv(z).unwrap();
            assert!((back - s).abs() < 5e-2 * s, "z_inv(z({s})) = {back}");
        }
    }

    #[test]
    fn heights_outside_rising_profile_are_rejected() {
        let mut shape = YoungLaplaceShape::new(0.21).unwrap();

        let err = shape.z_inv(-1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Domain);

        let err = shape.z_inv(100000.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Domain);
        assert!(shape.max_height_found());
        let max_height = shape.max_height().unwrap();
        assert!(max_height > 10.0 && max_height < 11.0);
        assert_eq!(
            err,
            ShapeError::OutsideHeight {
                z: 100000.0,
                lower: 0.0,
                upper: Some(max_height)
            }
        );

        // The maximum itself is still inside the domain.
        assert!(shape.z_inv(max_height).is_ok());
    }

    #[test]
    fn unresolved_upper_bound_is_reported_open() {
        let settings = ShapeSettings {
            max_arclength: 2.0,
            ..ShapeSettings::default()
        };
        let mut shape = YoungLaplaceShape::with_settings(0.21, settings).unwrap();
        let err = shape.z_inv(50.0).unwrap_err();
        assert!(!shape.max_height_found());
        assert!(format!("{err}").ends_with(", ?]"));
    }

    #[test]
    fn inverse_height_propagates_derivatives() {
        let mut shape = YoungLaplaceShape::new(0.21).unwrap();
        let s = shape.z_inv(Jet::<2>::variable(1.0)).unwrap();
        let [_, z] = shape.shape(Jet::<2>::variable(s.value())).unwrap();
        // ds/dz of the lookup approximates 1 / (dz/ds) of the profile.
        let slope = s.derivative(1) * z.derivative(1);
        assert!((slope - 1.0).abs() < 5e-2, "ds/dz * dz/ds = {slope}");
    }
}
