//! Material property provider trait.
//!
//! All refractive-index sources implement [`MaterialProvider`], which returns
//! the wavelength-dependent complex refractive index in the absorbing-negative
//! convention $N = n - ik$ used by the stack assembler.

use std::sync::Arc;

use ndarray::Array1;
use num_complex::Complex64;
use thiserror::Error;

/// Errors from material providers.
#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("Wavelength {wavelength_nm} nm is outside the data range [{min}, {max}] nm")]
    OutOfRange {
        wavelength_nm: f64,
        min: f64,
        max: f64,
    },

    #[error("Material not found: {0}")]
    NotFound(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Provides wavelength-dependent refractive indices.
pub trait MaterialProvider: Send + Sync {
    /// Human-readable name of this material.
    fn name(&self) -> &str;

    /// Wavelength range over which the material is defined (nm). Unbounded
    /// models report `(0.0, f64::INFINITY)`.
    fn wavelength_range(&self) -> (f64, f64);

    /// Complex refractive index $N = n - ik$ at a given wavelength.
    fn refractive_index(&self, wavelength_nm: f64) -> Result<Complex64, MaterialError>;

    /// Complex dielectric function $\epsilon = N^2$.
    fn dielectric_function(&self, wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        let n = self.refractive_index(wavelength_nm)?;
        Ok(n * n)
    }

    /// Refractive index over a wavelength grid. Fails on the first
    /// wavelength outside [`MaterialProvider::wavelength_range`].
    fn refractive_index_array(
        &self,
        wavelengths_nm: &[f64],
    ) -> Result<Array1<Complex64>, MaterialError> {
        wavelengths_nm
            .iter()
            .map(|&wl| self.refractive_index(wl))
            .collect::<Result<Vec<_>, _>>()
            .map(Array1::from_vec)
    }
}

impl<M: MaterialProvider + ?Sized> MaterialProvider for Arc<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn wavelength_range(&self) -> (f64, f64) {
        (**self).wavelength_range()
    }

    fn refractive_index(&self, wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        (**self).refractive_index(wavelength_nm)
    }
}

/// Reject wavelengths outside `range`.
pub(crate) fn check_range(wavelength_nm: f64, range: (f64, f64)) -> Result<(), MaterialError> {
    let (min, max) = range;
    if wavelength_nm < min || wavelength_nm > max {
        return Err(MaterialError::OutOfRange {
            wavelength_nm,
            min,
            max,
        });
    }
    Ok(())
}

/// Dispersionless material with a fixed index.
#[derive(Debug, Clone)]
pub struct ConstantMaterial {
    name: String,
    index: Complex64,
}

impl ConstantMaterial {
    /// # Arguments
    /// * `name` - Material name.
    /// * `n` - Real part of the index.
    /// * `k` - Extinction coefficient ($k \ge 0$ for absorbing media).
    pub fn new(name: impl Into<String>, n: f64, k: f64) -> Self {
        Self {
            name: name.into(),
            index: Complex64::new(n, -k),
        }
    }

    pub fn air() -> Self {
        Self::new("Air", 1.0, 0.0)
    }

    pub fn water() -> Self {
        Self::new("Water", 1.333, 0.0)
    }
}

impl MaterialProvider for ConstantMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn wavelength_range(&self) -> (f64, f64) {
        (0.0, f64::INFINITY)
    }

    fn refractive_index(&self, wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        check_range(wavelength_nm, self.wavelength_range())?;
        Ok(self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_material_uses_negative_imaginary_part() {
        let m = ConstantMaterial::new("absorber", 2.0, 0.5);
        assert_eq!(m.refractive_index(633.0).unwrap(), Complex64::new(2.0, -0.5));
        let eps = m.dielectric_function(633.0).unwrap();
        assert_eq!(eps, Complex64::new(3.75, -2.0));
    }

    #[test]
    fn test_array_lookup_covers_every_wavelength() {
        let m = Arc::new(ConstantMaterial::water());
        let ns = m.refractive_index_array(&[400.0, 500.0, 600.0]).unwrap();
        assert_eq!(ns.len(), 3);
        assert!(ns.iter().all(|n| *n == Complex64::new(1.333, 0.0)));
    }

    #[test]
    fn test_negative_wavelength_is_out_of_range() {
        let err = ConstantMaterial::air().refractive_index(-1.0).unwrap_err();
        assert!(matches!(err, MaterialError::OutOfRange { .. }));
    }
}
