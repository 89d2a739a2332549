//! Cauchy dispersion for transparent dielectrics.
//!
//! $n(\lambda) = A + B/\lambda^2 + C/\lambda^4$ with $\lambda$ in nm and
//! $k = 0$. Adequate for glasses and fluorides well away from their
//! absorption edges.

use num_complex::Complex64;

use crate::provider::{check_range, MaterialError, MaterialProvider};

/// Three-term Cauchy model.
#[derive(Debug, Clone)]
pub struct CauchyMaterial {
    name: String,
    a: f64,
    /// nm²
    b: f64,
    /// nm⁴
    c: f64,
    range: (f64, f64),
}

impl CauchyMaterial {
    /// # Arguments
    /// * `name` - Material name.
    /// * `a`, `b`, `c` - Cauchy coefficients with $\lambda$ in nm.
    /// * `range` - Wavelength interval (nm) the fit is valid over.
    pub fn new(name: impl Into<String>, a: f64, b: f64, c: f64, range: (f64, f64)) -> Self {
        Self {
            name: name.into(),
            a,
            b,
            c,
            range,
        }
    }

    /// Fused silica (amorphous SiO₂), visible to near infrared.
    pub fn fused_silica() -> Self {
        Self::new("Fused silica (Cauchy)", 1.4580, 3540.0, 0.0, (300.0, 2000.0))
    }

    /// Schott N-BK7 crown glass.
    pub fn bk7() -> Self {
        Self::new("BK7 (Cauchy)", 1.5046, 4200.0, 0.0, (350.0, 2000.0))
    }

    /// Real index $n(\lambda)$ without a range check.
    pub fn n(&self, wavelength_nm: f64) -> f64 {
        let inv_sq = 1.0 / (wavelength_nm * wavelength_nm);
        self.a + self.b * inv_sq + self.c * inv_sq * inv_sq
    }
}

impl MaterialProvider for CauchyMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn wavelength_range(&self) -> (f64, f64) {
        self.range
    }

    fn refractive_index(&self, wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        check_range(wavelength_nm, self.range)?;
        Ok(Complex64::new(self.n(wavelength_nm), 0.0))
    }
}
