//! Scattering-matrix assembly for a stack of layers.
//!
//! [`ScatteringModel::build`] prepends the ambient medium to a copy of the
//! caller's layers and composes, left to right,
//!
//! $$\mathbf{S} = \mathbf{I}_{0,1}\,\prod_{i=1}^{N-1}\mathbf{P}_i\,\mathbf{I}_{i,i+1}$$
//!
//! symbolically over the placeholders `wl`, `ri{i}` and `d{i}`. The terminal
//! layer is the semi-infinite substrate and contributes no propagation step.
//! The four entries are then compiled once; every later evaluation only runs
//! the compiled program.

use std::collections::{BTreeMap, HashSet};
use std::iter;
use std::sync::Arc;

use ndarray::ArrayD;
use num_complex::Complex64;
use thiserror::Error;

use crate::compile::{Argument, CompileError, CompiledFunction, EvalError, Program};
use crate::expr::Expr;
use crate::operators::{
    numeric_interface, numeric_propagation, symbolic_interface, symbolic_propagation,
    finite, DomainError, Operand, PRODUCT_SITE,
};
use crate::types::{Layer, Matrix2, Symbol};

/// Errors raised while assembling a stack.
#[derive(Debug, Error)]
pub enum StackError {
    #[error("Stack has no layers")]
    Empty,

    #[error("Layer index 0 is reserved for the ambient medium")]
    ReservedIndex,

    #[error("Layer index {0} appears more than once")]
    DuplicateIndex(usize),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Compose interfaces and propagation steps over a stack that already
/// includes the ambient medium at position 0.
fn compose<T, I, P>(stack: &[Layer], interface: I, propagation: P) -> Result<Matrix2<T>, DomainError>
where
    T: Operand,
    I: Fn(&Layer, &Layer) -> Result<Matrix2<T>, DomainError>,
    P: Fn(&Layer) -> Result<Matrix2<T>, DomainError>,
{
    let mut matrix = interface(&stack[0], &stack[1])?;
    for pair in stack[1..].windows(2) {
        matrix = matrix
            .matmul(&propagation(&pair[0])?)
            .matmul(&interface(&pair[0], &pair[1])?);
    }
    Ok(matrix)
}

/// Positional parameter order: `wl`, then `ri{i}, d{i}` per layer.
fn argument_order(stack: &[Layer]) -> Vec<Symbol> {
    iter::once(Symbol::WAVELENGTH)
        .chain(stack.iter().flat_map(|layer| {
            let symbols = layer.symbols();
            [symbols.refractive_index, symbols.thickness]
        }))
        .collect()
}

/// A compiled thin-film stack.
///
/// Holds the symbolic matrix, one compiled callable per entry and a combined
/// program that produces all four entries in one pass. Cloning shares the
/// compiled programs.
#[derive(Debug, Clone)]
pub struct ScatteringModel {
    stack: Vec<Layer>,
    order: Vec<Symbol>,
    matrix: Matrix2<Expr>,
    entries: Matrix2<CompiledFunction>,
    program: Arc<Program>,
}

impl ScatteringModel {
    /// Assemble and compile the scattering matrix for `layers`, ordered top
    /// (next to the ambient medium) to bottom (substrate).
    ///
    /// The caller's slice is copied, never modified. Layer values are kept
    /// as defaults for [`ScatteringModel::parameters`]; the compiled
    /// callables take every value as an argument.
    pub fn build(layers: &[Layer]) -> Result<Self, StackError> {
        if layers.is_empty() {
            return Err(StackError::Empty);
        }
        let mut seen = HashSet::with_capacity(layers.len());
        for layer in layers {
            if layer.is_ambient() {
                return Err(StackError::ReservedIndex);
            }
            if !seen.insert(layer.index) {
                return Err(StackError::DuplicateIndex(layer.index));
            }
        }

        let mut stack = Vec::with_capacity(layers.len() + 1);
        stack.push(Layer::ambient());
        stack.extend_from_slice(layers);

        let matrix = compose(&stack, symbolic_interface, symbolic_propagation)?;
        let order = argument_order(&stack);

        let entries = Matrix2::new(
            CompiledFunction::compile(&order, &matrix.m11)?,
            CompiledFunction::compile(&order, &matrix.m12)?,
            CompiledFunction::compile(&order, &matrix.m21)?,
            CompiledFunction::compile(&order, &matrix.m22)?,
        );
        let program = Arc::new(Program::compile(&order, &matrix.entries())?);

        let names: Vec<String> = order.iter().map(Symbol::to_string).collect();
        log::info!(
            "Assembled {}-layer stack ({} expression nodes); argument order: {}",
            layers.len(),
            matrix.m11.node_count(),
            names.join(", ")
        );

        Ok(Self {
            stack,
            order,
            matrix,
            entries,
            program,
        })
    }

    /// Build from `(thickness_nm, refractive_index)` pairs, numbering the
    /// layers 1..N top to bottom.
    pub fn from_layers<I>(layers: I) -> Result<Self, StackError>
    where
        I: IntoIterator<Item = (f64, Complex64)>,
    {
        let layers: Vec<Layer> = layers
            .into_iter()
            .enumerate()
            .map(|(i, (thickness, index))| Layer::new(i + 1, thickness, index))
            .collect();
        Self::build(&layers)
    }

    /// The full stack, ambient medium first.
    pub fn layers(&self) -> &[Layer] {
        &self.stack
    }

    /// Number of user layers (the ambient medium excluded).
    pub fn layer_count(&self) -> usize {
        self.stack.len() - 1
    }

    /// The symbolic scattering matrix.
    pub fn matrix(&self) -> &Matrix2<Expr> {
        &self.matrix
    }

    /// Positional argument order shared by every compiled callable.
    pub fn argument_order(&self) -> &[Symbol] {
        &self.order
    }

    pub fn s11(&self) -> &CompiledFunction {
        &self.entries.m11
    }

    pub fn s12(&self) -> &CompiledFunction {
        &self.entries.m12
    }

    pub fn s21(&self) -> &CompiledFunction {
        &self.entries.m21
    }

    pub fn s22(&self) -> &CompiledFunction {
        &self.entries.m22
    }

    /// All four compiled entries.
    pub fn entries(&self) -> &Matrix2<CompiledFunction> {
        &self.entries
    }

    /// Evaluate all four entries over broadcast positional arguments.
    pub fn evaluate(&self, args: &[Argument]) -> Result<ScatteringArrays, EvalError> {
        self.program.evaluate(args).map(ScatteringArrays::from_outputs)
    }

    /// Parallel counterpart of [`ScatteringModel::evaluate`].
    pub fn evaluate_parallel(&self, args: &[Argument]) -> Result<ScatteringArrays, EvalError> {
        self.program
            .evaluate_parallel(args)
            .map(ScatteringArrays::from_outputs)
    }

    /// Evaluate all four entries at one point.
    pub fn evaluate_point(&self, inputs: &[Complex64]) -> Result<Matrix2<Complex64>, EvalError> {
        let values = self.program.evaluate_point(inputs)?;
        Ok(Matrix2::new(values[0], values[1], values[2], values[3]))
    }

    /// Compose the stored layer values directly at one wavelength, without
    /// going through the compiled program.
    pub fn numeric_matrix(&self, wavelength_nm: f64) -> Result<Matrix2<Complex64>, DomainError> {
        let matrix = compose(&self.stack, numeric_interface, |layer: &Layer| {
            numeric_propagation(layer, wavelength_nm)
        })?;
        for entry in matrix.entries() {
            finite(*entry, PRODUCT_SITE)?;
        }
        Ok(matrix)
    }

    /// A named argument binder pre-filled with the stored layer values.
    pub fn parameters(&self) -> Parameters<'_> {
        let mut values = BTreeMap::new();
        for layer in &self.stack {
            let symbols = layer.symbols();
            values.insert(
                symbols.refractive_index,
                Argument::scalar(layer.refractive_index),
            );
            values.insert(symbols.thickness, Argument::real(layer.thickness));
        }
        Parameters {
            model: self,
            values,
        }
    }
}

/// Broadcast arrays of the four scattering-matrix entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatteringArrays {
    pub s11: ArrayD<Complex64>,
    pub s12: ArrayD<Complex64>,
    pub s21: ArrayD<Complex64>,
    pub s22: ArrayD<Complex64>,
}

impl ScatteringArrays {
    fn from_outputs(outputs: Vec<ArrayD<Complex64>>) -> Self {
        let mut outputs = outputs.into_iter();
        let mut next = || outputs.next().expect("stack program has four outputs");
        Self {
            s11: next(),
            s12: next(),
            s21: next(),
            s22: next(),
        }
    }

    /// Broadcast shape shared by all four entries.
    pub fn shape(&self) -> &[usize] {
        self.s11.shape()
    }

    pub fn len(&self) -> usize {
        self.s11.len()
    }

    pub fn is_empty(&self) -> bool {
        self.s11.is_empty()
    }

    /// The 2×2 matrix at one broadcast position.
    pub fn get(&self, index: &[usize]) -> Option<Matrix2<Complex64>> {
        Some(Matrix2::new(
            *self.s11.get(index)?,
            *self.s12.get(index)?,
            *self.s21.get(index)?,
            *self.s22.get(index)?,
        ))
    }

    /// Amplitude reflection coefficient $r = S_{21}/S_{11}$ seen from the
    /// ambient side. Independent of the overall $1/t$ scaling.
    pub fn reflection_coefficient(&self) -> Result<ArrayD<Complex64>, DomainError> {
        let mut r = self.s21.clone();
        for (i, (value, s11)) in r.iter_mut().zip(self.s11.iter()).enumerate() {
            *value = Operand::divide(*value, *s11, "reflection coefficient")
                .map_err(|e| e.at_element(i))?;
        }
        Ok(r)
    }

    /// Power reflectance $|r|^2$.
    pub fn reflectance(&self) -> Result<ArrayD<f64>, DomainError> {
        Ok(self.reflection_coefficient()?.mapv(|r| r.norm_sqr()))
    }
}

/// Named arguments for a [`ScatteringModel`].
///
/// Every `ri{i}` and `d{i}` starts at the value stored in the layer; the
/// wavelength has no default and must be set before evaluation.
#[derive(Debug, Clone)]
pub struct Parameters<'a> {
    model: &'a ScatteringModel,
    values: BTreeMap<Symbol, Argument>,
}

impl Parameters<'_> {
    /// Bind any placeholder of the model.
    pub fn set(
        &mut self,
        symbol: Symbol,
        value: impl Into<Argument>,
    ) -> Result<&mut Self, EvalError> {
        if !self.model.order.contains(&symbol) {
            return Err(EvalError::UnknownParameter(symbol));
        }
        self.values.insert(symbol, value.into());
        Ok(self)
    }

    /// Bind the wavelength grid (nm).
    pub fn wavelength(&mut self, value: impl Into<Argument>) -> &mut Self {
        self.values.insert(Symbol::WAVELENGTH, value.into());
        self
    }

    /// Override the refractive index of layer `layer`.
    pub fn refractive_index(
        &mut self,
        layer: usize,
        value: impl Into<Argument>,
    ) -> Result<&mut Self, EvalError> {
        self.set(Symbol::refractive_index(layer), value)
    }

    /// Override the thickness (nm) of layer `layer`.
    pub fn thickness(
        &mut self,
        layer: usize,
        value: impl Into<Argument>,
    ) -> Result<&mut Self, EvalError> {
        self.set(Symbol::thickness(layer), value)
    }

    /// Positional arguments in [`ScatteringModel::argument_order`].
    pub fn arguments(&self) -> Result<Vec<Argument>, EvalError> {
        self.model
            .order
            .iter()
            .map(|symbol| {
                self.values
                    .get(symbol)
                    .cloned()
                    .ok_or(EvalError::MissingArgument(*symbol))
            })
            .collect()
    }

    pub fn evaluate(&self) -> Result<ScatteringArrays, EvalError> {
        self.model.evaluate(&self.arguments()?)
    }

    pub fn evaluate_parallel(&self) -> Result<ScatteringArrays, EvalError> {
        self.model.evaluate_parallel(&self.arguments()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_empty_stack_is_rejected() {
        assert!(matches!(ScatteringModel::build(&[]), Err(StackError::Empty)));
    }

    #[test]
    fn test_reserved_and_duplicate_indices_are_rejected() {
        let err = ScatteringModel::build(&[Layer::ambient()]).unwrap_err();
        assert!(matches!(err, StackError::ReservedIndex));

        let err = ScatteringModel::build(&[Layer::with_index(2), Layer::with_index(2)]).unwrap_err();
        assert!(matches!(err, StackError::DuplicateIndex(2)));
    }

    #[test]
    fn test_argument_order_interleaves_layers() {
        let model = ScatteringModel::build(&[Layer::with_index(1), Layer::with_index(2)]).unwrap();
        let names: Vec<String> = model.argument_order().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["wl", "ri0", "d0", "ri1", "d1", "ri2", "d2"]);
    }

    #[test]
    fn test_input_layers_are_not_modified() {
        let layers = vec![Layer::new(1, 100.0, c(1.5, 0.0))];
        let model = ScatteringModel::build(&layers).unwrap();
        assert_eq!(layers, vec![Layer::new(1, 100.0, c(1.5, 0.0))]);
        assert_eq!(model.layers().len(), 2);
        assert!(model.layers()[0].is_ambient());
        assert_eq!(model.layer_count(), 1);
    }

    #[test]
    fn test_single_layer_has_no_propagation() {
        let model = ScatteringModel::build(&[Layer::with_index(1)]).unwrap();
        let symbols = model.matrix().m11.free_symbols();
        assert!(!symbols.contains(&Symbol::WAVELENGTH));
        assert!(!symbols.contains(&Symbol::thickness(1)));
    }

    #[test]
    fn test_compiled_matches_direct_composition() {
        let model = ScatteringModel::from_layers([
            (85.0, c(2.1, -0.01)),
            (140.0, c(1.46, 0.0)),
            (0.0, c(3.9, -0.02)),
        ])
        .unwrap();
        let direct = model.numeric_matrix(600.0).unwrap();

        let mut params = model.parameters();
        params.wavelength(600.0);
        let compiled = params.evaluate().unwrap();
        let at = compiled.get(&[]).unwrap();
        assert!(at.max_abs_diff(&direct) < 1e-12);
    }

    #[test]
    fn test_missing_wavelength_is_reported() {
        let model = ScatteringModel::build(&[Layer::with_index(1)]).unwrap();
        let err = model.parameters().evaluate().unwrap_err();
        assert!(matches!(err, EvalError::MissingArgument(s) if s == Symbol::WAVELENGTH));
    }

    #[test]
    fn test_unknown_layer_is_reported() {
        let model = ScatteringModel::build(&[Layer::with_index(1)]).unwrap();
        let mut params = model.parameters();
        let err = params.thickness(5, 10.0).unwrap_err();
        assert!(matches!(err, EvalError::UnknownParameter(s) if s == Symbol::thickness(5)));
    }

    #[test]
    fn test_reflection_of_bare_substrate() {
        let model = ScatteringModel::from_layers([(0.0, c(1.5, 0.0))]).unwrap();
        let mut params = model.parameters();
        params.wavelength(vec![400.0, 500.0, 600.0]);
        let s = params.evaluate().unwrap();
        let reflectance = s.reflectance().unwrap();
        for &value in reflectance.iter() {
            assert_abs_diff_eq!(value, 0.04, epsilon = 1e-12);
        }
    }
}
