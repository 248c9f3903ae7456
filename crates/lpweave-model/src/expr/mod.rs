//! Linear and quadratic expressions over model variables.

mod ops;

use std::fmt;

use crate::error::{Error, Result};
use crate::ids::VariableId;
use crate::variable::Variable;

/// A coefficient applied to one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTerm {
    pub variable: Variable,
    pub coefficient: f64,
}

/// A coefficient applied to a product of two variables.
///
/// `first` always carries the smaller id, so `x*y` and `y*x` share one key.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraticTerm {
    pub first: Variable,
    pub second: Variable,
    pub coefficient: f64,
}

impl QuadraticTerm {
    fn new(coefficient: f64, a: &Variable, b: &Variable) -> Self {
        let (first, second) = if a.id() <= b.id() { (a, b) } else { (b, a) };
        Self {
            first: first.clone(),
            second: second.clone(),
            coefficient,
        }
    }

    fn key(&self) -> (VariableId, VariableId) {
        (self.first.id(), self.second.id())
    }
}

/// `constant + Σ c·x + Σ q·x·y`, degree at most two.
///
/// Terms accumulate as they are added, so the same variable may appear more than once
/// until [`Expression::assemble`] merges duplicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    constant: f64,
    linear: Vec<LinearTerm>,
    quadratic: Vec<QuadraticTerm>,
}

fn check_finite(value: f64, what: &str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::term(format!("{what} must be finite, got {value}")))
    }
}

impl Expression {
    // ── Constructors ──────────────────────────────────────────────────────

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_constant(constant: f64) -> Self {
        Self {
            constant,
            ..Self::default()
        }
    }

    pub fn from_variable(variable: &Variable) -> Self {
        Self::term(1.0, variable)
    }

    pub fn term(coefficient: f64, variable: &Variable) -> Self {
        let mut expr = Self::new();
        expr.push_linear(coefficient, variable);
        expr
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn linear_terms(&self) -> &[LinearTerm] {
        &self.linear
    }

    pub fn quadratic_terms(&self) -> &[QuadraticTerm] {
        &self.quadratic
    }

    pub fn is_quadratic(&self) -> bool {
        !self.quadratic.is_empty()
    }

    /// True when the expression has no variable terms.
    pub fn is_constant(&self) -> bool {
        self.linear.is_empty() && self.quadratic.is_empty()
    }

    pub fn degree(&self) -> usize {
        if self.is_quadratic() {
            2
        } else if self.linear.is_empty() {
            0
        } else {
            1
        }
    }

    /// Distinct variables in first-appearance order, linear terms before quadratic ones.
    pub fn variables(&self) -> Vec<Variable> {
        let mut seen = std::collections::HashSet::new();
        let linear = self.linear.iter().map(|t| &t.variable);
        let quadratic = self.quadratic.iter().flat_map(|t| [&t.first, &t.second]);
        linear
            .chain(quadratic)
            .filter(|v| seen.insert(v.id()))
            .cloned()
            .collect()
    }

    /// Sum of all linear coefficients on `variable`.
    pub fn coefficient(&self, variable: &Variable) -> f64 {
        let id = variable.id();
        self.linear
            .iter()
            .filter(|t| t.variable.id() == id)
            .map(|t| t.coefficient)
            .sum()
    }

    pub fn quadratic_coefficient(&self, a: &Variable, b: &Variable) -> f64 {
        let key = QuadraticTerm::new(0.0, a, b).key();
        self.quadratic
            .iter()
            .filter(|t| t.key() == key)
            .map(|t| t.coefficient)
            .sum()
    }

    /// Value at the variables' current solution values.
    pub fn level(&self) -> f64 {
        let linear: f64 = self
            .linear
            .iter()
            .map(|t| t.coefficient * t.variable.value())
            .sum();
        let quadratic: f64 = self
            .quadratic
            .iter()
            .map(|t| t.coefficient * t.first.value() * t.second.value())
            .sum();
        self.constant + linear + quadratic
    }

    // ── Accumulation ──────────────────────────────────────────────────────

    pub(crate) fn push_linear(&mut self, coefficient: f64, variable: &Variable) {
        if coefficient != 0.0 {
            self.linear.push(LinearTerm {
                variable: variable.clone(),
                coefficient,
            });
        }
    }

    pub(crate) fn push_quadratic(&mut self, coefficient: f64, a: &Variable, b: &Variable) {
        if coefficient != 0.0 {
            self.quadratic.push(QuadraticTerm::new(coefficient, a, b));
        }
    }

    pub(crate) fn push_scaled(&mut self, multiplier: f64, other: &Expression) {
        if multiplier == 0.0 {
            return;
        }
        self.constant += multiplier * other.constant;
        for t in &other.linear {
            self.push_linear(multiplier * t.coefficient, &t.variable);
        }
        for t in &other.quadratic {
            self.push_quadratic(multiplier * t.coefficient, &t.first, &t.second);
        }
    }

    pub(crate) fn scale(&mut self, factor: f64) {
        if factor == 0.0 {
            self.clear();
            return;
        }
        self.constant *= factor;
        for t in &mut self.linear {
            t.coefficient *= factor;
        }
        for t in &mut self.quadratic {
            t.coefficient *= factor;
        }
    }

    pub fn add_constant(&mut self, constant: f64) -> Result<&mut Self> {
        check_finite(constant, "constant")?;
        self.constant += constant;
        Ok(self)
    }

    /// Append `coefficient·variable`. A zero coefficient adds nothing.
    pub fn add_term(&mut self, coefficient: f64, variable: &Variable) -> Result<&mut Self> {
        check_finite(coefficient, "coefficient")?;
        self.push_linear(coefficient, variable);
        Ok(self)
    }

    pub fn add_quadratic_term(
        &mut self,
        coefficient: f64,
        a: &Variable,
        b: &Variable,
    ) -> Result<&mut Self> {
        check_finite(coefficient, "coefficient")?;
        self.push_quadratic(coefficient, a, b);
        Ok(self)
    }

    /// Append every term of `other`.
    ///
    /// An expression cannot be added into itself; clone it first:
    ///
    /// ```compile_fail
    /// use lpweave_model::{Expression, IdAllocator, Variable};
    ///
    /// let ids = IdAllocator::new();
    /// let mut e = Expression::from(&Variable::new(&ids));
    /// e.add_expression(&e).unwrap();
    /// ```
    pub fn add_expression(&mut self, other: &Expression) -> Result<&mut Self> {
        self.add_scaled(1.0, other)
    }

    /// Append `multiplier·other` term by term.
    pub fn add_scaled(&mut self, multiplier: f64, other: &Expression) -> Result<&mut Self> {
        check_finite(multiplier, "multiplier")?;
        self.push_scaled(multiplier, other);
        Ok(self)
    }

    /// Append `coefficient·variable·other`; `other` must be at most linear.
    pub fn add_product(
        &mut self,
        coefficient: f64,
        variable: &Variable,
        other: &Expression,
    ) -> Result<&mut Self> {
        check_finite(coefficient, "coefficient")?;
        if other.is_quadratic() {
            return Err(Error::term(format!(
                "product of {variable} with a quadratic expression exceeds degree 2"
            )));
        }
        if coefficient == 0.0 {
            return Ok(self);
        }
        self.push_linear(coefficient * other.constant, variable);
        for t in &other.linear {
            self.push_quadratic(coefficient * t.coefficient, variable, &t.variable);
        }
        Ok(self)
    }

    pub fn subtract_constant(&mut self, constant: f64) -> Result<&mut Self> {
        self.add_constant(-constant)
    }

    pub fn subtract_term(&mut self, coefficient: f64, variable: &Variable) -> Result<&mut Self> {
        self.add_term(-coefficient, variable)
    }

    pub fn subtract_quadratic_term(
        &mut self,
        coefficient: f64,
        a: &Variable,
        b: &Variable,
    ) -> Result<&mut Self> {
        self.add_quadratic_term(-coefficient, a, b)
    }

    pub fn subtract_expression(&mut self, other: &Expression) -> Result<&mut Self> {
        self.add_scaled(-1.0, other)
    }

    pub fn subtract_scaled(&mut self, multiplier: f64, other: &Expression) -> Result<&mut Self> {
        self.add_scaled(-multiplier, other)
    }

    // ── Scaling and products ──────────────────────────────────────────────

    /// Multiply every coefficient. Multiplying by zero empties the expression.
    pub fn multiply_scalar(&mut self, factor: f64) -> Result<&mut Self> {
        check_finite(factor, "factor")?;
        self.scale(factor);
        Ok(self)
    }

    pub fn divide(&mut self, divisor: f64) -> Result<&mut Self> {
        if divisor == 0.0 {
            return Err(Error::term("division by zero"));
        }
        self.multiply_scalar(1.0 / divisor)
    }

    pub fn multiply_variable(&mut self, variable: &Variable) -> Result<&mut Self> {
        if self.is_quadratic() {
            return Err(Error::term(format!(
                "multiplying a quadratic expression by {variable} exceeds degree 2"
            )));
        }
        let current = std::mem::take(self);
        self.add_product(1.0, variable, &current)?;
        Ok(self)
    }

    /// In-place product with `other`, refused whenever the result would exceed degree 2.
    pub fn multiply(&mut self, other: &Expression) -> Result<&mut Self> {
        if self.is_quadratic() {
            if !other.is_constant() {
                return Err(Error::term(
                    "product of a quadratic expression with a non-constant one exceeds degree 2",
                ));
            }
            return self.multiply_scalar(other.constant);
        }

        if self.linear.is_empty() {
            let factor = self.constant;
            self.clear();
            return self.add_scaled(factor, other);
        }

        if other.is_quadratic() {
            return Err(Error::term(
                "product of a linear expression with a quadratic one exceeds degree 2",
            ));
        }

        let mut product = Expression::new();
        product.add_scaled(self.constant, other)?;
        for t in &self.linear {
            product.add_product(t.coefficient, &t.variable, other)?;
        }
        *self = product;
        Ok(self)
    }

    pub fn squared(&mut self) -> Result<&mut Self> {
        let copy = self.clone();
        self.multiply(&copy)
    }

    // ── Editing ───────────────────────────────────────────────────────────

    /// Replace every linear term on `variable` with one carrying `value`.
    /// Returns the summed coefficient that was replaced.
    pub fn set_coefficient(&mut self, variable: &Variable, value: f64) -> Result<f64> {
        check_finite(value, "coefficient")?;
        let previous = self.coefficient(variable);
        let id = variable.id();
        self.linear.retain(|t| t.variable.id() != id);
        self.push_linear(value, variable);
        Ok(previous)
    }

    pub fn set_quadratic_coefficient(&mut self, a: &Variable, b: &Variable, value: f64) -> Result<f64> {
        check_finite(value, "coefficient")?;
        let previous = self.quadratic_coefficient(a, b);
        let key = QuadraticTerm::new(0.0, a, b).key();
        self.quadratic.retain(|t| t.key() != key);
        self.push_quadratic(value, a, b);
        Ok(previous)
    }

    pub fn set_constant(&mut self, constant: f64) -> Result<()> {
        check_finite(constant, "constant")?;
        self.constant = constant;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.constant = 0.0;
        self.linear.clear();
        self.quadratic.clear();
    }

    // ── Assembly ──────────────────────────────────────────────────────────

    /// Fails on a non-finite constant or coefficient.
    pub fn check_finite(&self) -> Result<()> {
        check_finite(self.constant, "constant")?;
        if let Some(t) = self.linear.iter().find(|t| !t.coefficient.is_finite()) {
            return Err(Error::term(format!(
                "coefficient {} on {} is not finite",
                t.coefficient, t.variable
            )));
        }
        if let Some(t) = self.quadratic.iter().find(|t| !t.coefficient.is_finite()) {
            return Err(Error::term(format!(
                "coefficient {} on {}*{} is not finite",
                t.coefficient, t.first, t.second
            )));
        }
        Ok(())
    }

    /// Sort terms by variable id and merge duplicates.
    ///
    /// Merged terms whose coefficients cancel are kept with a zero coefficient; the
    /// nonzero pattern of a compiled row must not depend on values.
    pub fn assemble(&mut self) -> Result<()> {
        self.check_finite()?;

        self.linear.sort_by_key(|t| t.variable.id());
        let mut merged: Vec<LinearTerm> = Vec::with_capacity(self.linear.len());
        for term in self.linear.drain(..) {
            match merged.last_mut() {
                Some(last) if last.variable.id() == term.variable.id() => {
                    last.coefficient += term.coefficient;
                }
                _ => merged.push(term),
            }
        }
        self.linear = merged;

        self.quadratic.sort_by_key(QuadraticTerm::key);
        let mut merged: Vec<QuadraticTerm> = Vec::with_capacity(self.quadratic.len());
        for term in self.quadratic.drain(..) {
            match merged.last_mut() {
                Some(last) if last.key() == term.key() => last.coefficient += term.coefficient,
                _ => merged.push(term),
            }
        }
        self.quadratic = merged;
        Ok(())
    }

    /// True when terms are sorted by id without duplicates.
    pub fn is_assembled(&self) -> bool {
        self.linear
            .windows(2)
            .all(|w| w[0].variable.id() < w[1].variable.id())
            && self.quadratic.windows(2).all(|w| w[0].key() < w[1].key())
    }
}

fn write_signed(
    f: &mut fmt::Formatter<'_>,
    first: &mut bool,
    coefficient: f64,
    body: &str,
) -> fmt::Result {
    let magnitude = coefficient.abs();
    if *first {
        if coefficient < 0.0 {
            write!(f, "-")?;
        }
    } else if coefficient < 0.0 {
        write!(f, " - ")?;
    } else {
        write!(f, " + ")?;
    }
    *first = false;
    if body.is_empty() {
        write!(f, "{magnitude}")
    } else if magnitude == 1.0 {
        write!(f, "{body}")
    } else {
        write!(f, "{magnitude} {body}")
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for t in &self.linear {
            write_signed(f, &mut first, t.coefficient, t.variable.name().as_str())?;
        }
        for t in &self.quadratic {
            let body = if t.first.id() == t.second.id() {
                format!("{}^2", t.first.name())
            } else {
                format!("{}*{}", t.first.name(), t.second.name())
            };
            write_signed(f, &mut first, t.coefficient, &body)?;
        }
        if self.constant != 0.0 || first {
            write_signed(f, &mut first, self.constant, "")?;
        }
        Ok(())
    }
}
