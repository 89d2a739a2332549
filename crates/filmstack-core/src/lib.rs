//! # Filmstack Core
//!
//! Transfer-matrix optics for stacks of thin films at normal incidence. This
//! crate assembles the 2×2 scattering matrix of an arbitrary layer stack as a
//! closed-form expression and lowers it into a numeric evaluator that
//! broadcasts over arrays of wavelength, thickness and refractive index.
//!
//! ## Architecture
//!
//! Assembly is symbolic: [`stack::ScatteringModel::build`] multiplies
//! interface and propagation matrices whose entries are [`expr::Expr`] nodes
//! over per-layer placeholders. The finished matrix is compiled once by
//! [`compile::Program`] and then evaluated as often as needed, serially or on
//! the rayon pool.
//!
//! ## Modules
//!
//! - [`types`]: Layers, placeholders and the 2×2 matrix container.
//! - [`expr`]: Shared expression DAG with constant folding.
//! - [`operators`]: Interface and propagation matrices, domain errors.
//! - [`compile`]: Register-program compiler and broadcasting evaluator.
//! - [`stack`]: Stack assembly, named parameters and reflectance.

pub mod compile;
pub mod expr;
pub mod operators;
pub mod stack;
pub mod types;

pub use compile::{Argument, CompileError, CompiledFunction, EvalError, Program};
pub use expr::Expr;
pub use operators::DomainError;
pub use stack::{Parameters, ScatteringArrays, ScatteringModel, StackError};
pub use types::{Layer, Matrix2, Symbol};
