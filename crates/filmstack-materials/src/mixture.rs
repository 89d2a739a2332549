//! Two-phase mixtures as a material.
//!
//! Wraps two providers and blends their indices at every wavelength with the
//! Bruggeman approximation, so porous or intermixed films can be placed in a
//! stack like any other material.

use std::sync::Arc;

use num_complex::Complex64;

use crate::ema::{bruggeman_checked, EmaError};
use crate::provider::{check_range, MaterialError, MaterialProvider};

/// Bruggeman mixture of `a` (volume fraction `fraction_a`) and `b`.
#[derive(Clone)]
pub struct MixtureMaterial {
    name: String,
    a: Arc<dyn MaterialProvider>,
    b: Arc<dyn MaterialProvider>,
    fraction_a: f64,
}

impl MixtureMaterial {
    /// # Errors
    /// [`MaterialError::DataError`] if `fraction_a` is outside $[0, 1]$.
    pub fn new(
        a: Arc<dyn MaterialProvider>,
        b: Arc<dyn MaterialProvider>,
        fraction_a: f64,
    ) -> Result<Self, MaterialError> {
        if !(0.0..=1.0).contains(&fraction_a) {
            return Err(MaterialError::DataError(
                EmaError::FractionOutOfRange(fraction_a).to_string(),
            ));
        }
        let name = format!(
            "{:.0}% {} + {:.0}% {} (Bruggeman)",
            fraction_a * 100.0,
            a.name(),
            (1.0 - fraction_a) * 100.0,
            b.name()
        );
        Ok(Self {
            name,
            a,
            b,
            fraction_a,
        })
    }

    pub fn fraction_a(&self) -> f64 {
        self.fraction_a
    }
}

impl MaterialProvider for MixtureMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    /// Intersection of both constituents' ranges.
    fn wavelength_range(&self) -> (f64, f64) {
        let (a_min, a_max) = self.a.wavelength_range();
        let (b_min, b_max) = self.b.wavelength_range();
        (a_min.max(b_min), a_max.min(b_max))
    }

    fn refractive_index(&self, wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        check_range(wavelength_nm, self.wavelength_range())?;
        let na = self.a.refractive_index(wavelength_nm)?;
        let nb = self.b.refractive_index(wavelength_nm)?;
        bruggeman_checked(na, nb, self.fraction_a)
            .map_err(|e| MaterialError::DataError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cauchy::CauchyMaterial;
    use crate::ema::bruggeman;
    use crate::provider::ConstantMaterial;
    use crate::tabulated::TabulatedMaterial;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_porous_silica_matches_pointwise_mix() {
        let silica = Arc::new(CauchyMaterial::fused_silica());
        let air = Arc::new(ConstantMaterial::air());
        let porous = MixtureMaterial::new(silica.clone(), air, 0.7).unwrap();

        let n = porous.refractive_index(600.0).unwrap();
        let expected = bruggeman(
            silica.refractive_index(600.0).unwrap(),
            Complex64::new(1.0, 0.0),
            0.7,
        );
        assert_abs_diff_eq!((n - expected).norm(), 0.0, epsilon = 1e-14);
        assert!(porous.name().contains("70%"));
    }

    #[test]
    fn test_range_is_intersection() {
        let m = MixtureMaterial::new(
            Arc::new(TabulatedMaterial::silicon()),
            Arc::new(CauchyMaterial::bk7()),
            0.5,
        )
        .unwrap();
        assert_eq!(m.wavelength_range(), (400.0, 1000.0));
        assert!(m.refractive_index(1500.0).is_err());
    }

    #[test]
    fn test_fraction_is_validated() {
        let air = Arc::new(ConstantMaterial::air());
        assert!(MixtureMaterial::new(air.clone(), air, -0.1).is_err());
    }
}
