//! Symbolic expressions over layer placeholders.
//!
//! An [`Expr`] is a handle to a reference-counted [`Node`], so expressions form
//! a DAG rather than a tree. Multiplying transfer matrices reuses every entry
//! of the running product twice per step; sharing nodes keeps the graph
//! linear in the number of layers, and [`crate::compile`] emits each shared
//! node exactly once.
//!
//! The smart constructors fold constants and the trivial identities
//! ($x + 0$, $x \cdot 1$, $x \cdot 0$, $x - x$, $-(-x)$, $e^0$). Off-diagonal
//! zeros of the propagation matrices therefore vanish during assembly instead
//! of being carried through every product.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::sync::Arc;

use num_complex::Complex64;

use crate::operators::DomainError;
use crate::types::Symbol;

/// One operation in the expression graph.
#[derive(Debug)]
pub enum Node {
    Constant(Complex64),
    Symbol(Symbol),
    Add(Expr, Expr),
    Sub(Expr, Expr),
    Mul(Expr, Expr),
    /// Division checked at evaluation time. `site` names the operator the
    /// denominator belongs to so that a zero can be attributed.
    Div {
        numerator: Expr,
        denominator: Expr,
        site: Arc<str>,
    },
    Neg(Expr),
    /// Complex exponential. `site` is reported if the result overflows.
    Exp { argument: Expr, site: Arc<str> },
}

impl Node {
    /// Direct operands of this node.
    pub fn operands(&self) -> Vec<&Expr> {
        match self {
            Node::Constant(_) | Node::Symbol(_) => Vec::new(),
            Node::Add(a, b) | Node::Sub(a, b) | Node::Mul(a, b) => vec![a, b],
            Node::Div {
                numerator,
                denominator,
                ..
            } => vec![numerator, denominator],
            Node::Neg(a) => vec![a],
            Node::Exp { argument, .. } => vec![argument],
        }
    }
}

/// Shared handle to an expression node. Cloning is a reference-count bump.
#[derive(Clone)]
pub struct Expr(Arc<Node>);

fn is_zero(c: Complex64) -> bool {
    c.re == 0.0 && c.im == 0.0
}

fn is_one(c: Complex64) -> bool {
    c.re == 1.0 && c.im == 0.0
}

impl Expr {
    fn from_node(node: Node) -> Self {
        Self(Arc::new(node))
    }

    pub fn constant(value: impl Into<Complex64>) -> Self {
        Self::from_node(Node::Constant(value.into()))
    }

    pub fn symbol(symbol: Symbol) -> Self {
        Self::from_node(Node::Symbol(symbol))
    }

    pub fn zero() -> Self {
        Self::constant(Complex64::new(0.0, 0.0))
    }

    pub fn one() -> Self {
        Self::constant(Complex64::new(1.0, 0.0))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn as_constant(&self) -> Option<Complex64> {
        match self.node() {
            Node::Constant(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self.node() {
            Node::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_constant().is_some_and(is_zero)
    }

    pub fn is_one(&self) -> bool {
        self.as_constant().is_some_and(is_one)
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity of the node for memoisation during lowering.
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Same node, or leaves that are trivially equal.
    fn same_as(&self, other: &Expr) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.node(), other.node()) {
            (Node::Symbol(a), Node::Symbol(b)) => a == b,
            (Node::Constant(a), Node::Constant(b)) => a == b,
            _ => false,
        }
    }

    /// `self / denominator`, checked at evaluation time.
    ///
    /// Fails immediately if the denominator is already known to be zero.
    pub fn checked_div(self, denominator: Expr, site: &str) -> Result<Expr, DomainError> {
        match (self.as_constant(), denominator.as_constant()) {
            (_, Some(d)) if is_zero(d) => Err(DomainError::DivisionByZero {
                site: site.to_string(),
                element: None,
            }),
            (Some(n), Some(d)) => Ok(Expr::constant(n / d)),
            (_, Some(d)) if is_one(d) => Ok(self),
            _ => Ok(Expr::from_node(Node::Div {
                numerator: self,
                denominator,
                site: Arc::from(site),
            })),
        }
    }

    /// $e^{\text{self}}$.
    pub fn exp(self, site: &str) -> Result<Expr, DomainError> {
        match self.as_constant() {
            Some(c) => {
                let value = c.exp();
                if value.is_finite() {
                    Ok(Expr::constant(value))
                } else {
                    Err(DomainError::NonFinite {
                        site: site.to_string(),
                        element: None,
                    })
                }
            }
            None => Ok(Expr::from_node(Node::Exp {
                argument: self,
                site: Arc::from(site),
            })),
        }
    }

    /// Visit every distinct node once, parents before children.
    fn visit(&self, mut f: impl FnMut(&Expr)) {
        let mut seen = HashSet::new();
        let mut pending = vec![self.clone()];
        while let Some(expr) = pending.pop() {
            if !seen.insert(expr.id()) {
                continue;
            }
            f(&expr);
            pending.extend(expr.node().operands().into_iter().cloned());
        }
    }

    /// Placeholders this expression depends on.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut symbols = BTreeSet::new();
        self.visit(|e| {
            if let Some(s) = e.as_symbol() {
                symbols.insert(s);
            }
        });
        symbols
    }

    /// Number of distinct nodes in the DAG.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.visit(|_| count += 1);
        count
    }
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Self {
        Expr::symbol(symbol)
    }
}

impl From<Complex64> for Expr {
    fn from(value: Complex64) -> Self {
        Expr::constant(value)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::constant(Complex64::new(value, 0.0))
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        match (self.as_constant(), rhs.as_constant()) {
            (Some(a), Some(b)) => Expr::constant(a + b),
            (Some(a), _) if is_zero(a) => rhs,
            (_, Some(b)) if is_zero(b) => self,
            _ => Expr::from_node(Node::Add(self, rhs)),
        }
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        if self.same_as(&rhs) {
            return Expr::zero();
        }
        match (self.as_constant(), rhs.as_constant()) {
            (Some(a), Some(b)) => Expr::constant(a - b),
            (_, Some(b)) if is_zero(b) => self,
            (Some(a), _) if is_zero(a) => -rhs,
            _ => Expr::from_node(Node::Sub(self, rhs)),
        }
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        match (self.as_constant(), rhs.as_constant()) {
            (Some(a), Some(b)) => Expr::constant(a * b),
            (Some(a), _) if is_zero(a) => Expr::zero(),
            (_, Some(b)) if is_zero(b) => Expr::zero(),
            (Some(a), _) if is_one(a) => rhs,
            (_, Some(b)) if is_one(b) => self,
            _ => Expr::from_node(Node::Mul(self, rhs)),
        }
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        match self.node() {
            Node::Constant(c) => Expr::constant(-*c),
            Node::Neg(inner) => inner.clone(),
            _ => Expr::from_node(Node::Neg(self)),
        }
    }
}

impl<'a> Add<&'a Expr> for &'a Expr {
    type Output = Expr;

    fn add(self, rhs: &'a Expr) -> Expr {
        self.clone() + rhs.clone()
    }
}

impl<'a> Sub<&'a Expr> for &'a Expr {
    type Output = Expr;

    fn sub(self, rhs: &'a Expr) -> Expr {
        self.clone() - rhs.clone()
    }
}

impl<'a> Mul<&'a Expr> for &'a Expr {
    type Output = Expr;

    fn mul(self, rhs: &'a Expr) -> Expr {
        self.clone() * rhs.clone()
    }
}

// Printing. Binding strength: sums 1, products 2, negation 3, atoms 4.

fn precedence(node: &Node) -> u8 {
    match node {
        Node::Add(..) | Node::Sub(..) => 1,
        Node::Mul(..) | Node::Div { .. } => 2,
        Node::Neg(_) => 3,
        Node::Constant(c) if c.im == 0.0 && c.re < 0.0 => 3,
        Node::Constant(_) | Node::Symbol(_) | Node::Exp { .. } => 4,
    }
}

fn write_constant(f: &mut fmt::Formatter<'_>, c: Complex64) -> fmt::Result {
    if c.im == 0.0 {
        write!(f, "{}", c.re)
    } else if c.re == 0.0 && c.im == 1.0 {
        write!(f, "I")
    } else if c.re == 0.0 {
        write!(f, "({}*I)", c.im)
    } else if c.im < 0.0 {
        write!(f, "({} - {}*I)", c.re, -c.im)
    } else {
        write!(f, "({} + {}*I)", c.re, c.im)
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min_precedence: u8) -> fmt::Result {
    if precedence(expr.node()) < min_precedence {
        write!(f, "(")?;
        write_node(f, expr)?;
        write!(f, ")")
    } else {
        write_node(f, expr)
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr.node() {
        Node::Constant(c) => write_constant(f, *c),
        Node::Symbol(s) => write!(f, "{s}"),
        Node::Add(a, b) => {
            write_operand(f, a, 1)?;
            write!(f, " + ")?;
            write_operand(f, b, 1)
        }
        Node::Sub(a, b) => {
            write_operand(f, a, 1)?;
            write!(f, " - ")?;
            write_operand(f, b, 2)
        }
        Node::Mul(a, b) => {
            write_operand(f, a, 2)?;
            write!(f, "*")?;
            write_operand(f, b, 2)
        }
        Node::Div {
            numerator,
            denominator,
            ..
        } => {
            write_operand(f, numerator, 2)?;
            write!(f, "/")?;
            write_operand(f, denominator, 3)
        }
        Node::Neg(a) => {
            write!(f, "-")?;
            write_operand(f, a, 3)
        }
        Node::Exp { argument, .. } => {
            write!(f, "exp(")?;
            write_operand(f, argument, 0)?;
            write!(f, ")")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, self)
    }
}

/// Printed expressions expand shared nodes, so large graphs are summarised.
const DEBUG_NODE_LIMIT: usize = 64;

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes = self.node_count();
        if nodes > DEBUG_NODE_LIMIT {
            write!(f, "Expr(<{nodes} nodes>)")
        } else {
            write!(f, "Expr({self})")
        }
    }
}
