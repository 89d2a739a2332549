//! Tabulated optical constants.
//!
//! Data are $(\lambda, n, k)$ rows with $\lambda$ in nm and $k \ge 0$;
//! $n$ and $k$ are interpolated separately with natural cubic splines and
//! returned as $N = n - ik$. Tables come either embedded (the presets below)
//! or from a CSV file with one `wavelength_nm,n,k` row per line. Blank lines
//! and `#` comments are skipped, and a non-numeric first line is treated as a
//! header.
//!
//! ## Available presets
//!
//! | Identifier | Constructor | Wavelength range |
//! |-----------|-------------|-----------------|
//! | `tio2` | [`TabulatedMaterial::tio2()`] | 300–1000 nm |
//! | `si` | [`TabulatedMaterial::silicon()`] | 400–1000 nm |

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use num_complex::Complex64;

use crate::provider::{check_range, MaterialError, MaterialProvider};
use crate::spline::CubicSpline;

/// Spline-interpolated $(n, k)$ table.
#[derive(Debug, Clone)]
pub struct TabulatedMaterial {
    name: String,
    spline_n: CubicSpline,
    spline_k: CubicSpline,
}

impl TabulatedMaterial {
    /// Construct from `(wavelength_nm, n, k)` rows.
    ///
    /// # Arguments
    /// * `name` - Material name.
    /// * `rows` - At least two rows with strictly increasing wavelengths.
    pub fn new(name: impl Into<String>, rows: &[(f64, f64, f64)]) -> Result<Self, MaterialError> {
        let wavelengths_nm: Vec<f64> = rows.iter().map(|&(wl, _, _)| wl).collect();
        let n: Vec<f64> = rows.iter().map(|&(_, n, _)| n).collect();
        let k: Vec<f64> = rows.iter().map(|&(_, _, k)| k).collect();

        Ok(Self {
            name: name.into(),
            spline_n: CubicSpline::new(wavelengths_nm.clone(), n)?,
            spline_k: CubicSpline::new(wavelengths_nm, k)?,
        })
    }

    /// Parse `wavelength_nm,n,k` rows from a reader.
    pub fn from_reader(name: impl Into<String>, reader: impl BufRead) -> Result<Self, MaterialError> {
        let mut rows = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let content = line.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }

            let fields: Vec<&str> = content
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|f| !f.is_empty())
                .collect();
            let parsed: Result<Vec<f64>, _> = fields.iter().map(|f| f.parse::<f64>()).collect();
            match parsed {
                Ok(values) if values.len() == 3 => rows.push((values[0], values[1], values[2])),
                Ok(values) => {
                    return Err(MaterialError::Parse {
                        line: i + 1,
                        message: format!("expected 3 columns (wavelength_nm, n, k), found {}", values.len()),
                    })
                }
                // Header line
                Err(_) if rows.is_empty() => continue,
                Err(e) => {
                    return Err(MaterialError::Parse {
                        line: i + 1,
                        message: e.to_string(),
                    })
                }
            }
        }

        log::debug!("Read {} table rows", rows.len());
        Self::new(name, &rows)
    }

    /// Load a CSV table; the material is named after the file stem.
    pub fn from_csv_file(path: impl AsRef<Path>) -> Result<Self, MaterialError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file = File::open(path)?;
        Self::from_reader(name, BufReader::new(file))
    }

    /// Rutile TiO₂ (ordinary ray), after Palik, *Handbook of Optical
    /// Constants of Solids* (1985).
    ///
    /// High-index dielectric ($n \approx 2.5$–$2.7$ in the visible) with an
    /// absorption edge near 380 nm.
    pub fn tio2() -> Self {
        let rows: &[(f64, f64, f64)] = &[
            (300.0, 3.340, 0.880),
            (320.0, 2.990, 0.480),
            (340.0, 2.780, 0.220),
            (360.0, 2.680, 0.080),
            (380.0, 2.640, 0.018),
            (400.0, 2.620, 0.003),
            (450.0, 2.591, 0.000),
            (500.0, 2.572, 0.000),
            (550.0, 2.557, 0.000),
            (600.0, 2.547, 0.000),
            (700.0, 2.531, 0.000),
            (800.0, 2.521, 0.000),
            (900.0, 2.513, 0.000),
            (1000.0, 2.507, 0.000),
        ];
        Self::preset("TiO₂ (Palik)", rows)
    }

    /// Crystalline silicon at room temperature, after Green, *Sol. Energy
    /// Mater. Sol. Cells* **92**, 1305 (2008).
    pub fn silicon() -> Self {
        let rows: &[(f64, f64, f64)] = &[
            (400.0, 5.570, 0.387),
            (450.0, 4.670, 0.140),
            (500.0, 4.300, 0.073),
            (550.0, 4.080, 0.041),
            (600.0, 3.940, 0.025),
            (650.0, 3.850, 0.016),
            (700.0, 3.780, 0.011),
            (750.0, 3.730, 0.008),
            (800.0, 3.690, 0.006),
            (900.0, 3.630, 0.002),
            (1000.0, 3.580, 0.001),
        ];
        Self::preset("Si (Green)", rows)
    }

    fn preset(name: &str, rows: &[(f64, f64, f64)]) -> Self {
        Self::new(name, rows).expect("embedded tables are sorted")
    }
}

impl MaterialProvider for TabulatedMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn wavelength_range(&self) -> (f64, f64) {
        self.spline_n.domain()
    }

    fn refractive_index(&self, wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        check_range(wavelength_nm, self.wavelength_range())?;
        let n = self.spline_n.evaluate(wavelength_nm);
        // Overshoot between a lossy and a transparent knot must not create gain.
        let k = self.spline_k.evaluate(wavelength_nm).max(0.0);
        Ok(Complex64::new(n, -k))
    }
}
