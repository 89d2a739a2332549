//! Bruggeman effective-medium approximation for two-phase mixtures.
//!
//! For constituents with dielectric functions $\epsilon_a = N_a^2$ and
//! $\epsilon_b = N_b^2$ and volume fraction $f_a$ of phase $a$, the
//! symmetric Bruggeman condition has the closed-form root
//!
//! $$\epsilon = \tfrac{1}{4}\left(X + \sqrt{8\epsilon_a\epsilon_b + X^2}\right),
//! \quad X = -\epsilon_a + 2\epsilon_b + 3f_a(\epsilon_a - \epsilon_b)$$
//!
//! and the effective index is $N = \sqrt{\epsilon}$. Both square roots take
//! the principal branch. Indices follow $N = n - ik$.
//!
//! [`bruggeman`] and [`bruggeman_array`] accept any input, including
//! fractions outside $[0, 1]$; [`bruggeman_checked`] validates first.

use filmstack_core::compile::broadcast_shape;
use ndarray::{ArrayD, IxDyn, Zip};
use num_complex::Complex64;
use thiserror::Error;

/// Errors from the validated mixer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmaError {
    #[error("Volume fraction {0} is outside [0, 1]")]
    FractionOutOfRange(f64),

    #[error("Refractive index of phase {phase} is not finite: {value}")]
    NonFinite { phase: char, value: Complex64 },

    #[error("Input shapes {shapes:?} cannot be broadcast together")]
    Shape { shapes: Vec<Vec<usize>> },
}

/// Effective refractive index of a mixture of `na` (fraction `fa`) and `nb`.
pub fn bruggeman(na: Complex64, nb: Complex64, fa: f64) -> Complex64 {
    let ea = na * na;
    let eb = nb * nb;
    let x = -ea + 2.0 * eb + 3.0 * fa * (ea - eb);
    let e = 0.25 * (x + (8.0 * ea * eb + x * x).sqrt());
    e.sqrt()
}

/// [`bruggeman`] with the fraction and both indices validated.
pub fn bruggeman_checked(na: Complex64, nb: Complex64, fa: f64) -> Result<Complex64, EmaError> {
    if !(0.0..=1.0).contains(&fa) {
        return Err(EmaError::FractionOutOfRange(fa));
    }
    for (phase, value) in [('a', na), ('b', nb)] {
        if !value.is_finite() {
            return Err(EmaError::NonFinite { phase, value });
        }
    }
    Ok(bruggeman(na, nb, fa))
}

/// Elementwise [`bruggeman`] over arrays broadcast against each other
/// (trailing axes aligned, length-1 axes stretched).
pub fn bruggeman_array(
    na: &ArrayD<Complex64>,
    nb: &ArrayD<Complex64>,
    fa: &ArrayD<f64>,
) -> Result<ArrayD<Complex64>, EmaError> {
    let shapes = [na.shape(), nb.shape(), fa.shape()];
    let shape_error = || EmaError::Shape {
        shapes: shapes.iter().map(|s| s.to_vec()).collect(),
    };
    let shape = broadcast_shape(&shapes).ok_or_else(shape_error)?;
    let dim = IxDyn(&shape);

    let na = na.broadcast(dim.clone()).ok_or_else(shape_error)?;
    let nb = nb.broadcast(dim.clone()).ok_or_else(shape_error)?;
    let fa = fa.broadcast(dim).ok_or_else(shape_error)?;

    Ok(Zip::from(&na)
        .and(&nb)
        .and(&fa)
        .map_collect(|&a, &b, &f| bruggeman(a, b, f)))
}
