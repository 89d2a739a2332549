//! Filmstack command-line interface.
//!
//! Run thin-film stack simulations from TOML configuration files:
//! ```sh
//! filmstack-cli run job.toml
//! filmstack-cli validate job.toml
//! filmstack-cli expression --layers 3
//! filmstack-cli ema --a 2.4,0.0 --b 1.0,0.0 --fraction 0.6
//! filmstack-cli materials
//! ```

mod config;
mod runner;

use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::{Parser, Subcommand};
use num_complex::Complex64;

use filmstack_core::{Layer, ScatteringModel};
use filmstack_materials::catalog;
use filmstack_materials::ema::bruggeman_checked;
use filmstack_materials::provider::MaterialProvider;

/// Stacks deeper than this print node counts instead of full expressions.
const MAX_PRINTED_LAYERS: usize = 3;

#[derive(Parser)]
#[command(name = "filmstack-cli")]
#[command(about = "Filmstack: normal-incidence thin-film transfer matrices")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a wavelength sweep from a TOML configuration file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file and assemble the stack without evaluating it.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Print the symbolic scattering matrix and its argument order.
    Expression {
        /// Number of layers below the ambient medium.
        #[arg(short, long, default_value_t = 3)]
        layers: usize,
    },
    /// Mix two refractive indices with the Bruggeman approximation.
    Ema {
        /// Index of phase a as `n,k` (N = n - ik).
        #[arg(long, value_parser = parse_index, allow_hyphen_values = true)]
        a: Complex64,
        /// Index of phase b as `n,k`.
        #[arg(long, value_parser = parse_index, allow_hyphen_values = true)]
        b: Complex64,
        /// Volume fraction of phase a, in [0, 1].
        #[arg(short, long)]
        fraction: f64,
    },
    /// Display information about available materials.
    Materials,
}

/// Parse `n,k` (or a bare `n`) into $N = n - ik$.
fn parse_index(s: &str) -> Result<Complex64, String> {
    let mut parts = s.split(',').map(str::trim);
    let n = parts
        .next()
        .unwrap_or("")
        .parse::<f64>()
        .map_err(|e| format!("invalid n in '{s}': {e}"))?;
    let k = match parts.next() {
        Some(k) => k.parse::<f64>().map_err(|e| format!("invalid k in '{s}': {e}"))?,
        None => 0.0,
    };
    if parts.next().is_some() {
        return Err(format!("expected 'n,k', got '{s}'"));
    }
    Ok(Complex64::new(n, -k))
}

fn format_index(n: Complex64) -> String {
    format!("{:.6} - {:.6}i", n.re, -n.im)
}

fn job_dir(config: &Path) -> &Path {
    config.parent().unwrap_or_else(|| Path::new("."))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("Filmstack Transfer-Matrix Solver");
            println!("================================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_simulation(&job, job_dir(&config))?;

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            if job.output.save_csv {
                runner::save_spectrum_csv(&result, &out_dir.join("spectrum.csv"), &job)?;
            }
            if job.output.save_json {
                runner::save_spectrum_json(&result, &out_dir.join("spectrum.json"))?;
            }

            println!("Simulation complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            for layer in &job.layers {
                runner::resolve_material(&layer.material, job_dir(&config))?;
            }
            let model = runner::build_model(&job)?;
            println!("Configuration is valid: {}", config.display());
            println!(
                "  {} layers, {} wavelengths, {} arguments",
                model.layer_count(),
                job.simulation.wavelengths.grid().len(),
                model.argument_order().len()
            );
            Ok(())
        }
        Commands::Expression { layers } => {
            if layers == 0 {
                bail!("A stack needs at least one layer");
            }
            let stack: Vec<Layer> = (1..=layers).map(Layer::with_index).collect();
            let model = ScatteringModel::build(&stack)?;

            println!("Scattering matrix:");
            let names = ["S11", "S12", "S21", "S22"];
            for (name, entry) in names.iter().zip(model.matrix().entries()) {
                if layers <= MAX_PRINTED_LAYERS {
                    println!("  {name} = {entry}");
                } else {
                    println!("  {name}: {} nodes", entry.node_count());
                }
            }
            let order: Vec<String> = model
                .argument_order()
                .iter()
                .map(|s| s.to_string())
                .collect();
            println!("Argument order: {}", order.join(", "));
            Ok(())
        }
        Commands::Ema { a, b, fraction } => {
            let n = bruggeman_checked(a, b, fraction)?;
            println!("N_a   = {}", format_index(a));
            println!("N_b   = {}", format_index(b));
            println!("f_a   = {fraction}");
            println!("N_eff = {}", format_index(n));
            Ok(())
        }
        Commands::Materials => {
            println!("Available materials:");
            println!();
            for (name, description) in catalog::BUILTIN {
                let material = catalog::builtin(name)?;
                let (lo, hi) = material.wavelength_range();
                let range = if hi.is_finite() {
                    format!("{lo}–{hi} nm")
                } else {
                    "any wavelength".to_string()
                };
                println!("  {name:<14} {description}, {range}");
            }
            println!();
            println!("  Inline forms: {{ n = 1.38, k = 0.0 }}, {{ table = \"file.csv\" }},");
            println!("                {{ a = <material>, b = <material>, fraction_a = 0.5 }}");
            Ok(())
        }
    }
}
