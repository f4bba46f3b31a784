pub mod autodiff;
pub mod error;
pub mod interpolate;
pub mod solvers;
pub mod traits;
/// The `capillary_core` crate models the axisymmetric Young-Laplace profile of
/// a pendant or sessile drop for drop shape analysis.
///
/// Key components:
/// - **Young-Laplace**: `YoungLaplaceShape`, a lazily integrated and cached profile with
///   Bond-number sensitivity, inverse height, closest-point projection, volume and area.
/// - **Solvers**: Adaptive Tsit5 integrator advancing one step at a time, with root events.
/// - **Interpolate**: Append-only quintic Hermite and linear splines for dense output.
/// - **Autodiff**: `Jet<N>` truncated Taylor series, so queries can carry arclength derivatives.
pub mod younglaplace;

pub use autodiff::Jet;
pub use error::{ErrorKind, ShapeError};
pub use younglaplace::{ShapeSettings, YoungLaplaceShape};
