//! Simulation runner: ties together materials, stack assembly and output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use num_complex::Complex64;
use serde::Serialize;

use filmstack_core::{Layer, ScatteringArrays, ScatteringModel};
use filmstack_materials::catalog;
use filmstack_materials::mixture::MixtureMaterial;
use filmstack_materials::provider::{ConstantMaterial, MaterialProvider};
use filmstack_materials::tabulated::TabulatedMaterial;

use crate::config::{JobConfig, MaterialSpec};

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationOutput {
    pub wavelengths_nm: Vec<f64>,
    pub matrices: ScatteringArrays,
    pub reflectance: Vec<f64>,
}

/// One row of the JSON spectrum.
#[derive(Debug, Serialize)]
pub struct SpectrumPoint {
    pub wavelength_nm: f64,
    pub reflectance: f64,
    pub s11: Complex64,
    pub s12: Complex64,
    pub s21: Complex64,
    pub s22: Complex64,
}

impl SimulationOutput {
    pub fn points(&self) -> Vec<SpectrumPoint> {
        self.wavelengths_nm
            .iter()
            .enumerate()
            .map(|(i, &wavelength_nm)| SpectrumPoint {
                wavelength_nm,
                reflectance: self.reflectance[i],
                s11: self.matrices.s11[[i]],
                s12: self.matrices.s12[[i]],
                s21: self.matrices.s21[[i]],
                s22: self.matrices.s22[[i]],
            })
            .collect()
    }
}

/// Resolve a material specification. Table paths are taken relative to
/// `base_dir`.
pub fn resolve_material(spec: &MaterialSpec, base_dir: &Path) -> Result<Arc<dyn MaterialProvider>> {
    let material: Arc<dyn MaterialProvider> = match spec {
        MaterialSpec::Named(name) => catalog::builtin(name)?,
        MaterialSpec::Constant { n, k } => {
            Arc::new(ConstantMaterial::new(format!("n={n}, k={k}"), *n, *k))
        }
        MaterialSpec::Table { table } => {
            let path = base_dir.join(table);
            Arc::new(
                TabulatedMaterial::from_csv_file(&path)
                    .with_context(|| format!("Loading table {}", path.display()))?,
            )
        }
        MaterialSpec::Mixture { a, b, fraction_a } => Arc::new(MixtureMaterial::new(
            resolve_material(a, base_dir)?,
            resolve_material(b, base_dir)?,
            *fraction_a,
        )?),
    };
    Ok(material)
}

/// Build the stack with layers numbered 1..N.
pub fn build_model(job: &JobConfig) -> Result<ScatteringModel> {
    let layers: Vec<Layer> = job
        .layers
        .iter()
        .enumerate()
        .map(|(i, layer)| Layer::new(i + 1, layer.thickness, Complex64::new(0.0, 0.0)))
        .collect();
    Ok(ScatteringModel::build(&layers)?)
}

/// Run a full wavelength sweep from a parsed job configuration.
pub fn run_simulation(job: &JobConfig, base_dir: &Path) -> Result<SimulationOutput> {
    let wavelengths = job.simulation.wavelengths.grid();
    let model = build_model(job)?;

    let mut params = model.parameters();
    params.wavelength(wavelengths.clone());

    for (i, layer) in job.layers.iter().enumerate() {
        let material = resolve_material(&layer.material, base_dir)
            .with_context(|| format!("Layer '{}'", layer.name))?;
        let indices = material
            .refractive_index_array(&wavelengths)
            .with_context(|| format!("Layer '{}' ({})", layer.name, material.name()))?;
        log::debug!(
            "Resolved layer '{}' to {} over {:?} nm",
            layer.name,
            material.name(),
            material.wavelength_range()
        );
        println!(
            "  Layer {} '{}': {} nm, material={}",
            i + 1,
            layer.name,
            layer.thickness,
            material.name()
        );
        params.refractive_index(i + 1, indices)?;
    }

    println!(
        "Evaluating {} wavelengths ({})",
        wavelengths.len(),
        if job.simulation.parallel { "parallel" } else { "serial" }
    );
    let matrices = if job.simulation.parallel {
        params.evaluate_parallel()?
    } else {
        params.evaluate()?
    };
    let reflectance: Vec<f64> = matrices.reflectance()?.iter().copied().collect();
    log::info!(
        "Evaluated {} wavelengths, peak reflectance {:.6}",
        wavelengths.len(),
        reflectance.iter().copied().fold(0.0, f64::max)
    );

    Ok(SimulationOutput {
        wavelengths_nm: wavelengths,
        matrices,
        reflectance,
    })
}

/// Write the spectrum as CSV with a metadata header.
pub fn write_spectrum_csv<W: Write>(out: &mut W, output: &SimulationOutput, job: &JobConfig) -> Result<()> {
    writeln!(out, "# filmstack: normal-incidence transfer matrix spectrum")?;
    writeln!(out, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    for (i, layer) in job.layers.iter().enumerate() {
        writeln!(
            out,
            "# layer {} '{}': thickness={} nm, material={}",
            i + 1,
            layer.name,
            layer.thickness,
            layer.material.describe()
        )?;
    }
    writeln!(out, "#")?;
    writeln!(
        out,
        "wavelength_nm,reflectance,s11_re,s11_im,s12_re,s12_im,s21_re,s21_im,s22_re,s22_im"
    )?;

    for p in output.points() {
        write!(out, "{:.4},{:.8}", p.wavelength_nm, p.reflectance)?;
        for s in [p.s11, p.s12, p.s21, p.s22] {
            write!(out, ",{:.6e},{:.6e}", s.re, s.im)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("Creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Write the spectrum CSV to `path`.
pub fn save_spectrum_csv(output: &SimulationOutput, path: &Path, job: &JobConfig) -> Result<()> {
    let mut file = create_file(path)?;
    write_spectrum_csv(&mut file, output, job)?;
    file.flush()?;
    println!("Spectrum written to: {}", path.display());
    Ok(())
}

/// Write the spectrum to `path` as a JSON array of points.
pub fn save_spectrum_json(output: &SimulationOutput, path: &Path) -> Result<()> {
    let mut file = create_file(path)?;
    serde_json::to_writer_pretty(&mut file, &output.points())
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    file.flush()?;
    println!("Spectrum (JSON) written to: {}", path.display());
    Ok(())
}
