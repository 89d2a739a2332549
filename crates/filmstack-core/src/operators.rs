//! Interface and propagation operators at normal incidence.
//!
//! Both operators are written once against the [`Operand`] trait and
//! instantiated for [`Expr`] (stack assembly) and [`Complex64`] (direct numeric
//! evaluation), so the symbolic and numeric paths share a single definition.
//!
//! # Conventions
//! - Refractive indices follow $N = n - ik$.
//! - Interface between media $p$ and $c$:
//!   $t = 2N_p(N_p + N_c)$, $r = (N_p - N_c)/(N_p + N_c)$,
//!   $\mathbf{I} = \frac{1}{t}\begin{pmatrix}1 & r\\ r & 1\end{pmatrix}$.
//! - Propagation through a layer of thickness $d$:
//!   $\beta = 2\pi d N / \lambda$,
//!   $\mathbf{P} = \operatorname{diag}(e^{i\beta}, e^{-i\beta})$.

use std::f64::consts::PI;
use std::ops::{Add, Mul, Neg, Sub};

use num_complex::Complex64;
use thiserror::Error;

use crate::expr::Expr;
use crate::types::{Layer, Matrix2, Symbol};

/// Numeric-domain failures. These are raised instead of letting Inf/NaN
/// propagate into a sweep.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Division by zero at {site}{}", describe_element(.element))]
    DivisionByZero {
        site: String,
        /// Flat broadcast index, when raised during array evaluation.
        element: Option<usize>,
    },

    #[error("Non-finite value at {site}{}", describe_element(.element))]
    NonFinite { site: String, element: Option<usize> },
}

fn describe_element(element: &Option<usize>) -> String {
    element
        .map(|i| format!(" (element {i})"))
        .unwrap_or_default()
}

impl DomainError {
    /// The operator that failed, e.g. `interface 1|2`.
    pub fn site(&self) -> &str {
        match self {
            DomainError::DivisionByZero { site, .. } | DomainError::NonFinite { site, .. } => site,
        }
    }

    pub fn element(&self) -> Option<usize> {
        match self {
            DomainError::DivisionByZero { element, .. } | DomainError::NonFinite { element, .. } => {
                *element
            }
        }
    }

    /// Attach the flat broadcast index at which the failure occurred.
    pub fn at_element(self, index: usize) -> Self {
        match self {
            DomainError::DivisionByZero { site, .. } => DomainError::DivisionByZero {
                site,
                element: Some(index),
            },
            DomainError::NonFinite { site, .. } => DomainError::NonFinite {
                site,
                element: Some(index),
            },
        }
    }
}

/// Site reported when a product or sum of operator entries overflows.
pub(crate) const PRODUCT_SITE: &str = "scattering product";

/// Pass `value` through, or report it as non-finite at `site`.
pub(crate) fn finite(value: Complex64, site: &str) -> Result<Complex64, DomainError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DomainError::NonFinite {
            site: site.to_string(),
            element: None,
        })
    }
}

/// Arithmetic needed by the operators. Implemented for symbolic and numeric
/// scalars.
pub trait Operand:
    Clone + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Neg<Output = Self>
{
    fn constant(value: Complex64) -> Self;

    /// Division that reports a zero denominator as a [`DomainError`].
    fn divide(self, denominator: Self, site: &str) -> Result<Self, DomainError>;

    /// Complex exponential that reports overflow as a [`DomainError`].
    fn exponential(self, site: &str) -> Result<Self, DomainError>;
}

impl Operand for Complex64 {
    fn constant(value: Complex64) -> Self {
        value
    }

    fn divide(self, denominator: Self, site: &str) -> Result<Self, DomainError> {
        if denominator.re == 0.0 && denominator.im == 0.0 {
            return Err(DomainError::DivisionByZero {
                site: site.to_string(),
                element: None,
            });
        }
        finite(self / denominator, site)
    }

    fn exponential(self, site: &str) -> Result<Self, DomainError> {
        finite(self.exp(), site)
    }
}

impl Operand for Expr {
    fn constant(value: Complex64) -> Self {
        Expr::constant(value)
    }

    fn divide(self, denominator: Self, site: &str) -> Result<Self, DomainError> {
        self.checked_div(denominator, site)
    }

    fn exponential(self, site: &str) -> Result<Self, DomainError> {
        self.exp(site)
    }
}

pub(crate) fn interface_site(previous: usize, current: usize) -> String {
    format!("interface {previous}|{current}")
}

pub(crate) fn propagation_site(layer: usize) -> String {
    format!("propagation in layer {layer}")
}

/// Boundary matrix between media of index `n_prev` (above) and `n_curr`
/// (below).
pub fn interface_matrix<T: Operand>(
    n_prev: T,
    n_curr: T,
    site: &str,
) -> Result<Matrix2<T>, DomainError> {
    let sum = n_prev.clone() + n_curr.clone();
    let r = (n_prev.clone() - n_curr).divide(sum.clone(), site)?;
    let t = T::constant(Complex64::new(2.0, 0.0)) * n_prev * sum;
    let scale = T::constant(Complex64::new(1.0, 0.0)).divide(t, site)?;
    let off_diagonal = scale.clone() * r;
    Ok(Matrix2::new(
        scale.clone(),
        off_diagonal.clone(),
        off_diagonal,
        scale,
    ))
}

/// Diagonal phase matrix for one pass through a layer.
///
/// `wavelength` must be non-zero.
pub fn propagation_matrix<T: Operand>(
    thickness: T,
    refractive_index: T,
    wavelength: T,
    site: &str,
) -> Result<Matrix2<T>, DomainError> {
    let beta = (T::constant(Complex64::new(2.0 * PI, 0.0)) * thickness * refractive_index)
        .divide(wavelength, site)?;
    let i_beta = T::constant(Complex64::i()) * beta;
    let forward = i_beta.clone().exponential(site)?;
    let backward = (-i_beta).exponential(site)?;
    let zero = T::constant(Complex64::new(0.0, 0.0));
    Ok(Matrix2::new(forward, zero.clone(), zero, backward))
}

/// Interface matrix over the two layers' index placeholders.
pub fn symbolic_interface(previous: &Layer, current: &Layer) -> Result<Matrix2<Expr>, DomainError> {
    interface_matrix(
        Expr::symbol(previous.symbols().refractive_index),
        Expr::symbol(current.symbols().refractive_index),
        &interface_site(previous.index, current.index),
    )
}

/// Propagation matrix over the layer's placeholders and the shared `wl`.
pub fn symbolic_propagation(layer: &Layer) -> Result<Matrix2<Expr>, DomainError> {
    let symbols = layer.symbols();
    propagation_matrix(
        Expr::symbol(symbols.thickness),
        Expr::symbol(symbols.refractive_index),
        Expr::symbol(Symbol::WAVELENGTH),
        &propagation_site(layer.index),
    )
}

/// Interface matrix evaluated from the layers' stored indices.
pub fn numeric_interface(
    previous: &Layer,
    current: &Layer,
) -> Result<Matrix2<Complex64>, DomainError> {
    interface_matrix(
        previous.refractive_index,
        current.refractive_index,
        &interface_site(previous.index, current.index),
    )
}

/// Propagation matrix evaluated from the layer's stored values.
pub fn numeric_propagation(
    layer: &Layer,
    wavelength_nm: f64,
) -> Result<Matrix2<Complex64>, DomainError> {
    propagation_matrix(
        Complex64::new(layer.thickness, 0.0),
        layer.refractive_index,
        Complex64::new(wavelength_nm, 0.0),
        &propagation_site(layer.index),
    )
}
