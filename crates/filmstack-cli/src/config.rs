//! TOML configuration deserialisation for stack simulation jobs.
//!
//! ```toml
//! [simulation]
//! wavelengths = { range = [400.0, 800.0], points = 201 }
//! parallel = true
//!
//! [[layer]]
//! name = "coating"
//! thickness = 99.6
//! material = { n = 1.38, k = 0.0 }
//!
//! [[layer]]
//! name = "substrate"
//! material = "bk7"
//!
//! [output]
//! directory = "./output"
//! save_json = true
//! ```

use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub simulation: SimulationConfig,
    /// Layers from the ambient side down; the last one is the substrate.
    #[serde(rename = "layer")]
    pub layers: Vec<LayerConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Simulation parameters from TOML.
#[derive(Debug, Deserialize)]
pub struct SimulationConfig {
    pub wavelengths: WavelengthSpec,
    /// Spread the wavelength sweep over the rayon pool. Default: false.
    #[serde(default)]
    pub parallel: bool,
}

/// Wavelength specification: either a range or explicit list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WavelengthSpec {
    Range { range: [f64; 2], points: usize },
    List { values: Vec<f64> },
}

impl WavelengthSpec {
    /// Expand into the wavelength grid (nm).
    pub fn grid(&self) -> Vec<f64> {
        match self {
            WavelengthSpec::Range { range, points } => {
                let [start, end] = *range;
                (0..*points)
                    .map(|i| start + (end - start) * i as f64 / (*points - 1).max(1) as f64)
                    .collect()
            }
            WavelengthSpec::List { values } => values.clone(),
        }
    }
}

/// One layer of the stack.
#[derive(Debug, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    /// Thickness in nm. Ignored for the substrate. Default: 0.
    #[serde(default)]
    pub thickness: f64,
    pub material: MaterialSpec,
}

/// Material specification: a built-in name, a fixed index, a table file or
/// a Bruggeman mixture of two other specifications.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MaterialSpec {
    Named(String),
    Constant {
        n: f64,
        #[serde(default)]
        k: f64,
    },
    Table {
        /// CSV path, relative to the job file.
        table: String,
    },
    Mixture {
        a: Box<MaterialSpec>,
        b: Box<MaterialSpec>,
        fraction_a: f64,
    },
}

impl MaterialSpec {
    /// Short description for file headers.
    pub fn describe(&self) -> String {
        match self {
            MaterialSpec::Named(name) => name.clone(),
            MaterialSpec::Constant { n, k } => format!("n={n}, k={k}"),
            MaterialSpec::Table { table } => format!("table {table}"),
            MaterialSpec::Mixture { a, b, fraction_a } => format!(
                "EMA({} x {}, {} x {})",
                a.describe(),
                fraction_a,
                b.describe(),
                1.0 - fraction_a
            ),
        }
    }
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save the spectrum as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_csv: bool,
    /// Whether to also save the spectrum as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_csv: true,
            save_json: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}

fn default_true() -> bool {
    true
}

/// Parse and check a job from TOML text.
pub fn parse_config(content: &str) -> anyhow::Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;

    if config.layers.is_empty() {
        bail!("Job defines no [[layer]] entries");
    }
    for layer in &config.layers {
        if !(layer.thickness >= 0.0) {
            bail!("Layer '{}': thickness must be non-negative", layer.name);
        }
    }
    let grid = config.simulation.wavelengths.grid();
    if grid.is_empty() {
        bail!("Wavelength grid is empty");
    }
    if let Some(wl) = grid.iter().find(|wl| !(**wl > 0.0)) {
        bail!("Wavelengths must be positive, found {wl}");
    }
    Ok(config)
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Reading {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB: &str = r#"
        [simulation]
        wavelengths = { range = [400.0, 800.0], points = 5 }

        [[layer]]
        name = "porous"
        thickness = 120.0
        material = { a = "tio2", b = { n = 1.0 }, fraction_a = 0.6 }

        [[layer]]
        name = "measured"
        thickness = 40.0
        material = { table = "film.csv" }

        [[layer]]
        name = "substrate"
        material = "bk7"
    "#;

    #[test]
    fn test_parses_every_material_form() {
        let job = parse_config(JOB).unwrap();
        assert_eq!(job.layers.len(), 3);
        assert!(!job.simulation.parallel);
        assert!(matches!(
            &job.layers[0].material,
            MaterialSpec::Mixture { fraction_a, .. } if *fraction_a == 0.6
        ));
        assert!(matches!(&job.layers[1].material, MaterialSpec::Table { table } if table == "film.csv"));
        assert!(matches!(&job.layers[2].material, MaterialSpec::Named(n) if n == "bk7"));
        assert_eq!(job.layers[2].thickness, 0.0);
    }

    #[test]
    fn test_output_defaults() {
        let job = parse_config(JOB).unwrap();
        assert_eq!(job.output.directory, "./output");
        assert!(job.output.save_csv);
        assert!(!job.output.save_json);
    }

    #[test]
    fn test_wavelength_grid() {
        let job = parse_config(JOB).unwrap();
        assert_eq!(job.simulation.wavelengths.grid(), vec![400.0, 500.0, 600.0, 700.0, 800.0]);

        let list = WavelengthSpec::List {
            values: vec![532.0, 633.0],
        };
        assert_eq!(list.grid(), vec![532.0, 633.0]);
    }

    #[test]
    fn test_rejects_empty_stack_and_bad_values() {
        let no_layers = "layer = []\n[simulation]\nwavelengths = { values = [500.0] }\n";
        assert!(parse_config(no_layers).is_err());

        let negative = r#"
            [simulation]
            wavelengths = { values = [500.0] }
            [[layer]]
            name = "x"
            thickness = -1.0
            material = "air"
        "#;
        assert!(parse_config(negative).is_err());

        let zero_wl = r#"
            [simulation]
            wavelengths = { values = [0.0, 500.0] }
            [[layer]]
            name = "x"
            material = "air"
        "#;
        assert!(parse_config(zero_wl).is_err());
    }

    #[test]
    fn test_describe_mixture() {
        let job = parse_config(JOB).unwrap();
        assert_eq!(
            job.layers[0].material.describe(),
            "EMA(tio2 x 0.6, n=1, k=0 x 0.4)"
        );
    }
}
