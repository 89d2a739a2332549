//! Lowering of symbolic expressions into numeric evaluators.
//!
//! [`Program::compile`] flattens one or more expression DAGs into a
//! straight-line register program over a fixed, ordered parameter list. Each
//! distinct node becomes one instruction, so subexpressions shared by the
//! matrix product are computed once per evaluation.
//!
//! Evaluation takes one [`Argument`] per parameter, broadcasts them against
//! each other with NumPy rules (trailing axes aligned, length-1 axes
//! stretched) and runs the program once per element of the broadcast shape.
//! Divisions and exponentials are checked on every element; the first
//! failure aborts the call with the element index attached.

use std::collections::HashMap;
use std::sync::Arc;

use ndarray::{Array1, ArrayD, IxDyn};
use num_complex::Complex64;
use rayon::prelude::*;
use thiserror::Error;

use crate::expr::{Expr, Node};
use crate::operators::{finite, DomainError, PRODUCT_SITE};
use crate::types::Symbol;

/// Errors while lowering an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Parameter {0} is listed more than once")]
    DuplicateParameter(Symbol),

    #[error("Expression depends on {0}, which is not in the parameter list")]
    UnboundSymbol(Symbol),
}

/// Errors while evaluating a compiled program.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Expected {expected} arguments, got {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("Argument shapes {shapes:?} cannot be broadcast together")]
    Broadcast { shapes: Vec<Vec<usize>> },

    #[error("No value bound for {0}")]
    MissingArgument(Symbol),

    #[error("{0} is not a parameter of this model")]
    UnknownParameter(Symbol),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Output shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// One positional argument: a complex scalar or array of any dimension.
///
/// Real inputs (wavelengths, thicknesses) convert losslessly via `From`.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument(ArrayD<Complex64>);

impl Argument {
    pub fn scalar(value: Complex64) -> Self {
        Self(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn real(value: f64) -> Self {
        Self::scalar(Complex64::new(value, 0.0))
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn values(&self) -> &ArrayD<Complex64> {
        &self.0
    }

    pub fn into_inner(self) -> ArrayD<Complex64> {
        self.0
    }
}

impl From<f64> for Argument {
    fn from(value: f64) -> Self {
        Self::real(value)
    }
}

impl From<Complex64> for Argument {
    fn from(value: Complex64) -> Self {
        Self::scalar(value)
    }
}

impl From<&[f64]> for Argument {
    fn from(values: &[f64]) -> Self {
        Self(Array1::from_iter(values.iter().map(|&v| Complex64::new(v, 0.0))).into_dyn())
    }
}

impl From<&[Complex64]> for Argument {
    fn from(values: &[Complex64]) -> Self {
        Self(Array1::from_vec(values.to_vec()).into_dyn())
    }
}

impl From<Vec<f64>> for Argument {
    fn from(values: Vec<f64>) -> Self {
        Self::from(values.as_slice())
    }
}

impl From<Vec<Complex64>> for Argument {
    fn from(values: Vec<Complex64>) -> Self {
        Self(Array1::from_vec(values).into_dyn())
    }
}

impl From<Array1<f64>> for Argument {
    fn from(values: Array1<f64>) -> Self {
        Self(values.mapv(|v| Complex64::new(v, 0.0)).into_dyn())
    }
}

impl From<Array1<Complex64>> for Argument {
    fn from(values: Array1<Complex64>) -> Self {
        Self(values.into_dyn())
    }
}

impl From<ArrayD<f64>> for Argument {
    fn from(values: ArrayD<f64>) -> Self {
        Self(values.mapv(|v| Complex64::new(v, 0.0)))
    }
}

impl From<ArrayD<Complex64>> for Argument {
    fn from(values: ArrayD<Complex64>) -> Self {
        Self(values)
    }
}

/// Result shape of broadcasting `shapes` together, or `None` if two axes
/// disagree and neither is 1.
pub fn broadcast_shape(shapes: &[&[usize]]) -> Option<Vec<usize>> {
    let ndim = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out = vec![1; ndim];
    for shape in shapes {
        let offset = ndim - shape.len();
        for (axis, &len) in shape.iter().enumerate() {
            let slot = &mut out[offset + axis];
            if *slot == 1 {
                *slot = len;
            } else if len != 1 && len != *slot {
                return None;
            }
        }
    }
    Some(out)
}

#[derive(Debug, Clone)]
enum Instruction {
    /// Copy the argument in this parameter slot.
    Load(usize),
    Constant(Complex64),
    Add(usize, usize),
    Sub(usize, usize),
    Mul(usize, usize),
    Div {
        numerator: usize,
        denominator: usize,
        site: Arc<str>,
    },
    Neg(usize),
    Exp {
        argument: usize,
        site: Arc<str>,
    },
}

/// Straight-line register program. Register `i` holds the result of
/// instruction `i`.
#[derive(Debug, Clone)]
pub struct Program {
    parameters: Vec<Symbol>,
    instructions: Vec<Instruction>,
    outputs: Vec<usize>,
}

struct Lowering<'a> {
    slots: &'a HashMap<Symbol, usize>,
    instructions: Vec<Instruction>,
    by_node: HashMap<usize, usize>,
    by_symbol: HashMap<Symbol, usize>,
    by_constant: HashMap<(u64, u64), usize>,
}

impl Lowering<'_> {
    fn emit(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    fn register(&self, expr: &Expr) -> usize {
        self.by_node[&expr.id()]
    }

    fn constant(&mut self, value: Complex64) -> usize {
        let key = (value.re.to_bits(), value.im.to_bits());
        if let Some(&reg) = self.by_constant.get(&key) {
            return reg;
        }
        let reg = self.emit(Instruction::Constant(value));
        self.by_constant.insert(key, reg);
        reg
    }

    fn load(&mut self, symbol: Symbol) -> Result<usize, CompileError> {
        if let Some(&reg) = self.by_symbol.get(&symbol) {
            return Ok(reg);
        }
        let slot = *self
            .slots
            .get(&symbol)
            .ok_or(CompileError::UnboundSymbol(symbol))?;
        let reg = self.emit(Instruction::Load(slot));
        self.by_symbol.insert(symbol, reg);
        Ok(reg)
    }

    /// Emit one node whose operands are already lowered.
    fn emit_node(&mut self, expr: &Expr) -> Result<usize, CompileError> {
        let instruction = match expr.node() {
            Node::Constant(c) => return Ok(self.constant(*c)),
            Node::Symbol(s) => return self.load(*s),
            Node::Add(a, b) => Instruction::Add(self.register(a), self.register(b)),
            Node::Sub(a, b) => Instruction::Sub(self.register(a), self.register(b)),
            Node::Mul(a, b) => Instruction::Mul(self.register(a), self.register(b)),
            Node::Div {
                numerator,
                denominator,
                site,
            } => Instruction::Div {
                numerator: self.register(numerator),
                denominator: self.register(denominator),
                site: Arc::clone(site),
            },
            Node::Neg(a) => Instruction::Neg(self.register(a)),
            Node::Exp { argument, site } => Instruction::Exp {
                argument: self.register(argument),
                site: Arc::clone(site),
            },
        };
        Ok(self.emit(instruction))
    }

    /// Post-order walk with an explicit stack; deep stacks produce deep DAGs.
    fn lower(&mut self, root: &Expr) -> Result<usize, CompileError> {
        let mut pending: Vec<(Expr, bool)> = vec![(root.clone(), false)];
        while let Some((expr, expanded)) = pending.pop() {
            if self.by_node.contains_key(&expr.id()) {
                continue;
            }
            if expanded {
                let reg = self.emit_node(&expr)?;
                self.by_node.insert(expr.id(), reg);
                continue;
            }
            let operands: Vec<Expr> = expr
                .node()
                .operands()
                .into_iter()
                .filter(|child| !self.by_node.contains_key(&child.id()))
                .cloned()
                .collect();
            pending.push((expr, true));
            // Reversed so the left operand is emitted first.
            pending.extend(operands.into_iter().rev().map(|child| (child, false)));
        }
        Ok(self.register(root))
    }
}

/// Per-argument values after broadcasting.
enum Column {
    Uniform(Complex64),
    Varying(Vec<Complex64>),
}

impl Column {
    fn at(&self, index: usize) -> Complex64 {
        match self {
            Column::Uniform(value) => *value,
            Column::Varying(values) => values[index],
        }
    }
}

struct Broadcast {
    shape: Vec<usize>,
    len: usize,
    columns: Vec<Column>,
}

impl Program {
    /// Lower `outputs` over `parameters`. The parameter order is the
    /// positional argument order of every later call.
    pub fn compile(parameters: &[Symbol], outputs: &[&Expr]) -> Result<Self, CompileError> {
        let mut slots = HashMap::with_capacity(parameters.len());
        for (slot, symbol) in parameters.iter().enumerate() {
            if slots.insert(*symbol, slot).is_some() {
                return Err(CompileError::DuplicateParameter(*symbol));
            }
        }

        let mut lowering = Lowering {
            slots: &slots,
            instructions: Vec::new(),
            by_node: HashMap::new(),
            by_symbol: HashMap::new(),
            by_constant: HashMap::new(),
        };
        let registers = outputs
            .iter()
            .map(|expr| lowering.lower(expr))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Compiled {} output(s) into {} instructions over {} parameters",
            registers.len(),
            lowering.instructions.len(),
            parameters.len()
        );

        Ok(Self {
            parameters: parameters.to_vec(),
            instructions: lowering.instructions,
            outputs: registers,
        })
    }

    /// Positional parameter order.
    pub fn parameters(&self) -> &[Symbol] {
        &self.parameters
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    fn check_arity(&self, found: usize) -> Result<(), EvalError> {
        if found != self.parameters.len() {
            return Err(EvalError::ArityMismatch {
                expected: self.parameters.len(),
                found,
            });
        }
        Ok(())
    }

    fn run(&self, inputs: &[Complex64], registers: &mut Vec<Complex64>) -> Result<(), DomainError> {
        registers.clear();
        for instruction in &self.instructions {
            let value = match instruction {
                Instruction::Load(slot) => inputs[*slot],
                Instruction::Constant(c) => *c,
                Instruction::Add(a, b) => finite(registers[*a] + registers[*b], PRODUCT_SITE)?,
                Instruction::Sub(a, b) => finite(registers[*a] - registers[*b], PRODUCT_SITE)?,
                Instruction::Mul(a, b) => finite(registers[*a] * registers[*b], PRODUCT_SITE)?,
                Instruction::Div {
                    numerator,
                    denominator,
                    site,
                } => {
                    let d = registers[*denominator];
                    if d.re == 0.0 && d.im == 0.0 {
                        return Err(DomainError::DivisionByZero {
                            site: site.to_string(),
                            element: None,
                        });
                    }
                    finite(registers[*numerator] / d, site)?
                }
                Instruction::Neg(a) => -registers[*a],
                Instruction::Exp { argument, site } => finite(registers[*argument].exp(), site)?,
            };
            registers.push(value);
        }
        Ok(())
    }

    /// Evaluate at a single point.
    pub fn evaluate_point(&self, inputs: &[Complex64]) -> Result<Vec<Complex64>, EvalError> {
        self.check_arity(inputs.len())?;
        let mut registers = Vec::with_capacity(self.instructions.len());
        self.run(inputs, &mut registers)?;
        Ok(self.outputs.iter().map(|&r| registers[r]).collect())
    }

    fn prepare(&self, args: &[Argument]) -> Result<Broadcast, EvalError> {
        self.check_arity(args.len())?;

        let shapes: Vec<&[usize]> = args.iter().map(Argument::shape).collect();
        let broadcast_error = || EvalError::Broadcast {
            shapes: shapes.iter().map(|s| s.to_vec()).collect(),
        };
        let shape = broadcast_shape(&shapes).ok_or_else(broadcast_error)?;
        let len = shape.iter().product();

        let columns = args
            .iter()
            .map(|arg| {
                let values = arg.values();
                if values.len() == 1 {
                    if let Some(&value) = values.iter().next() {
                        return Ok(Column::Uniform(value));
                    }
                }
                let view = values
                    .broadcast(IxDyn(&shape))
                    .ok_or_else(broadcast_error)?;
                Ok(Column::Varying(view.iter().copied().collect()))
            })
            .collect::<Result<Vec<_>, EvalError>>()?;

        log::debug!("Evaluating {} element(s) of shape {:?}", len, shape);
        Ok(Broadcast {
            shape,
            len,
            columns,
        })
    }

    fn assemble(
        shape: &[usize],
        outputs: Vec<Vec<Complex64>>,
    ) -> Result<Vec<ArrayD<Complex64>>, EvalError> {
        outputs
            .into_iter()
            .map(|data| ArrayD::from_shape_vec(IxDyn(shape), data).map_err(EvalError::from))
            .collect()
    }

    /// Evaluate every output over the broadcast of `args`.
    pub fn evaluate(&self, args: &[Argument]) -> Result<Vec<ArrayD<Complex64>>, EvalError> {
        let Broadcast {
            shape,
            len,
            columns,
        } = self.prepare(args)?;

        let mut inputs = vec![Complex64::new(0.0, 0.0); columns.len()];
        let mut registers = Vec::with_capacity(self.instructions.len());
        let mut outputs: Vec<Vec<Complex64>> =
            (0..self.outputs.len()).map(|_| Vec::with_capacity(len)).collect();

        for i in 0..len {
            for (slot, column) in inputs.iter_mut().zip(&columns) {
                *slot = column.at(i);
            }
            self.run(&inputs, &mut registers)
                .map_err(|e| e.at_element(i))?;
            for (out, &reg) in outputs.iter_mut().zip(&self.outputs) {
                out.push(registers[reg]);
            }
        }

        Self::assemble(&shape, outputs)
    }

    /// Same as [`Program::evaluate`], spreading elements across the rayon
    /// thread pool.
    pub fn evaluate_parallel(
        &self,
        args: &[Argument],
    ) -> Result<Vec<ArrayD<Complex64>>, EvalError> {
        let Broadcast {
            shape,
            len,
            columns,
        } = self.prepare(args)?;

        let rows = (0..len)
            .into_par_iter()
            .map_init(
                || {
                    (
                        vec![Complex64::new(0.0, 0.0); columns.len()],
                        Vec::with_capacity(self.instructions.len()),
                    )
                },
                |(inputs, registers), i| {
                    for (slot, column) in inputs.iter_mut().zip(&columns) {
                        *slot = column.at(i);
                    }
                    self.run(inputs, registers).map_err(|e| e.at_element(i))?;
                    Ok(self.outputs.iter().map(|&r| registers[r]).collect::<Vec<_>>())
                },
            )
            .collect::<Result<Vec<_>, DomainError>>()?;

        let mut outputs: Vec<Vec<Complex64>> =
            (0..self.outputs.len()).map(|_| Vec::with_capacity(len)).collect();
        for row in rows {
            for (out, value) in outputs.iter_mut().zip(row) {
                out.push(value);
            }
        }

        Self::assemble(&shape, outputs)
    }
}

/// A single compiled expression with a fixed positional parameter list.
///
/// Cheap to clone and safe to share across threads.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    program: Arc<Program>,
}

impl CompiledFunction {
    pub fn compile(parameters: &[Symbol], expr: &Expr) -> Result<Self, CompileError> {
        Ok(Self {
            program: Arc::new(Program::compile(parameters, &[expr])?),
        })
    }

    /// Positional parameter order.
    pub fn parameters(&self) -> &[Symbol] {
        self.program.parameters()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    fn single(outputs: Vec<ArrayD<Complex64>>) -> ArrayD<Complex64> {
        outputs
            .into_iter()
            .next()
            .expect("compiled function has exactly one output")
    }

    /// Evaluate over broadcast array arguments.
    pub fn call(&self, args: &[Argument]) -> Result<ArrayD<Complex64>, EvalError> {
        self.program.evaluate(args).map(Self::single)
    }

    /// Evaluate over broadcast array arguments on the rayon pool.
    pub fn call_parallel(&self, args: &[Argument]) -> Result<ArrayD<Complex64>, EvalError> {
        self.program.evaluate_parallel(args).map(Self::single)
    }

    /// Evaluate at one point.
    pub fn call_scalar(&self, args: &[Complex64]) -> Result<Complex64, EvalError> {
        let values = self.program.evaluate_point(args)?;
        Ok(values[0])
    }
}
