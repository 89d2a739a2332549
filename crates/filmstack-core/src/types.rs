//! Core types shared across the filmstack pipeline.
//!
//! This module defines the fundamental data structures used throughout the
//! assembly pipeline: layers, the symbolic placeholders each layer owns, and
//! the 2×2 matrix container shared by the symbolic and numeric paths.

use std::fmt;
use std::ops::{Add, Mul};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Stack position reserved for the semi-infinite incident medium.
pub const AMBIENT_INDEX: usize = 0;

/// The quantity a [`Symbol`] stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Vacuum wavelength (nm), shared by the whole stack.
    Wavelength,
    /// Complex refractive index $N = n - ik$ of one layer.
    RefractiveIndex,
    /// Physical thickness (nm) of one layer.
    Thickness,
}

/// A named placeholder in a symbolic expression.
///
/// Identity is the `(role, layer)` pair: two layers can only share a
/// placeholder if they share a stack index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    pub role: Role,
    /// Owning layer, `None` for the stack-wide wavelength.
    pub layer: Option<usize>,
}

impl Symbol {
    /// The wavelength placeholder `wl`.
    pub const WAVELENGTH: Symbol = Symbol {
        role: Role::Wavelength,
        layer: None,
    };

    /// Thickness placeholder `d{layer}`.
    pub fn thickness(layer: usize) -> Self {
        Self {
            role: Role::Thickness,
            layer: Some(layer),
        }
    }

    /// Refractive-index placeholder `ri{layer}`.
    pub fn refractive_index(layer: usize) -> Self {
        Self {
            role: Role::RefractiveIndex,
            layer: Some(layer),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.role, self.layer) {
            (Role::Wavelength, _) => write!(f, "wl"),
            (Role::RefractiveIndex, Some(i)) => write!(f, "ri{i}"),
            (Role::Thickness, Some(i)) => write!(f, "d{i}"),
            (Role::RefractiveIndex, None) => write!(f, "ri"),
            (Role::Thickness, None) => write!(f, "d"),
        }
    }
}

/// The pair of placeholders owned by one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSymbols {
    pub thickness: Symbol,
    pub refractive_index: Symbol,
}

/// One physical layer of the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Position in the stack. 0 is the ambient medium; user layers count
    /// up from 1, top to bottom.
    pub index: usize,
    /// Thickness in nanometres.
    pub thickness: f64,
    /// Complex refractive index $N = n - ik$ (absorption is a negative
    /// imaginary part).
    pub refractive_index: Complex64,
}

impl Layer {
    /// Create a layer with explicit values.
    pub fn new(index: usize, thickness: f64, refractive_index: Complex64) -> Self {
        Self {
            index,
            thickness,
            refractive_index,
        }
    }

    /// Create a layer with zero thickness and zero index. Useful when the
    /// stack is only needed symbolically and the values are supplied later.
    pub fn with_index(index: usize) -> Self {
        Self::new(index, 0.0, Complex64::new(0.0, 0.0))
    }

    /// The semi-infinite incident medium (air): index 0, $N = 1$, $d = 0$.
    pub fn ambient() -> Self {
        Self::new(AMBIENT_INDEX, 0.0, Complex64::new(1.0, 0.0))
    }

    /// Whether this layer occupies the reserved ambient position.
    pub fn is_ambient(&self) -> bool {
        self.index == AMBIENT_INDEX
    }

    /// The placeholders that stand in for this layer's values while the
    /// scattering matrix is assembled.
    pub fn symbols(&self) -> LayerSymbols {
        LayerSymbols {
            thickness: Symbol::thickness(self.index),
            refractive_index: Symbol::refractive_index(self.index),
        }
    }
}

/// A 2×2 matrix in row-major entry naming.
///
/// Generic so the same composition code serves symbolic ([`crate::expr::Expr`])
/// and numeric ([`Complex64`]) matrices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix2<T> {
    pub m11: T,
    pub m12: T,
    pub m21: T,
    pub m22: T,
}

impl<T> Matrix2<T> {
    pub fn new(m11: T, m12: T, m21: T, m22: T) -> Self {
        Self { m11, m12, m21, m22 }
    }

    /// Entries in the order S11, S12, S21, S22.
    pub fn entries(&self) -> [&T; 4] {
        [&self.m11, &self.m12, &self.m21, &self.m22]
    }

    /// Apply `f` to every entry.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Matrix2<U> {
        Matrix2 {
            m11: f(self.m11),
            m12: f(self.m12),
            m21: f(self.m21),
            m22: f(self.m22),
        }
    }
}

impl<T> Matrix2<T>
where
    T: Clone + Add<Output = T> + Mul<Output = T>,
{
    /// Matrix product `self · rhs`. Order matters: the stack is composed
    /// left to right from the incident medium to the substrate.
    pub fn matmul(&self, rhs: &Self) -> Self {
        Self {
            m11: self.m11.clone() * rhs.m11.clone() + self.m12.clone() * rhs.m21.clone(),
            m12: self.m11.clone() * rhs.m12.clone() + self.m12.clone() * rhs.m22.clone(),
            m21: self.m21.clone() * rhs.m11.clone() + self.m22.clone() * rhs.m21.clone(),
            m22: self.m21.clone() * rhs.m12.clone() + self.m22.clone() * rhs.m22.clone(),
        }
    }
}

impl Matrix2<Complex64> {
    pub fn identity() -> Self {
        let one = Complex64::new(1.0, 0.0);
        let zero = Complex64::new(0.0, 0.0);
        Self::new(one, zero, zero, one)
    }

    /// Multiply every entry by `factor`.
    pub fn scale(self, factor: Complex64) -> Self {
        self.map(|v| v * factor)
    }

    /// Largest entrywise distance to `other`, for tolerance checks.
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        self.entries()
            .iter()
            .zip(other.entries().iter())
            .map(|(a, b)| (**a - **b).norm())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_names_follow_layer_index() {
        assert_eq!(Symbol::WAVELENGTH.to_string(), "wl");
        assert_eq!(Symbol::thickness(3).to_string(), "d3");
        assert_eq!(Symbol::refractive_index(0).to_string(), "ri0");
    }

    #[test]
    fn test_layer_symbols_are_distinct_across_layers() {
        let a = Layer::with_index(1).symbols();
        let b = Layer::with_index(2).symbols();
        assert_ne!(a.thickness, b.thickness);
        assert_ne!(a.refractive_index, b.refractive_index);
        assert_ne!(a.thickness, a.refractive_index);
    }

    #[test]
    fn test_ambient_layer_is_unit_index() {
        let air = Layer::ambient();
        assert!(air.is_ambient());
        assert_eq!(air.refractive_index, Complex64::new(1.0, 0.0));
        assert_eq!(air.thickness, 0.0);
    }

    #[test]
    fn test_layer_serialises_with_complex_index() {
        let layer = Layer::new(2, 110.0, Complex64::new(2.05, -0.3));
        let json = serde_json::to_string(&layer).unwrap();
        let back: Layer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, layer);
    }

    #[test]
    fn test_matmul_is_not_commutative() {
        let a = Matrix2::new(
            Complex64::new(1.0, 0.0),
            Complex64::new(2.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(1.0, 0.0),
        );
        let b = Matrix2::new(
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(3.0, 0.0),
            Complex64::new(1.0, 0.0),
        );
        let ab = a.matmul(&b);
        let ba = b.matmul(&a);
        assert_eq!(ab.m11, Complex64::new(7.0, 0.0));
        assert_eq!(ba.m11, Complex64::new(1.0, 0.0));
        assert!(ab.max_abs_diff(&ba) > 1.0);
    }

    #[test]
    fn test_identity_is_neutral() {
        let m = Matrix2::new(
            Complex64::new(0.5, -0.1),
            Complex64::new(0.2, 0.0),
            Complex64::new(-0.3, 0.4),
            Complex64::new(1.5, 0.0),
        );
        assert_eq!(m.matmul(&Matrix2::identity()), m);
        assert_eq!(Matrix2::identity().matmul(&m), m);
    }
}
