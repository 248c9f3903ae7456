//! Operator overloads for building expressions.
//!
//! Only combinations that cannot exceed degree 2 get an operator; products of
//! expressions go through the checked methods instead. Non-finite coefficients
//! introduced here are caught by [`Expression::assemble`].

use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use super::Expression;
use crate::variable::Variable;

impl From<f64> for Expression {
    fn from(constant: f64) -> Self {
        Expression::from_constant(constant)
    }
}

impl From<&Variable> for Expression {
    fn from(variable: &Variable) -> Self {
        Expression::from_variable(variable)
    }
}

impl From<Variable> for Expression {
    fn from(variable: Variable) -> Self {
        Expression::from_variable(&variable)
    }
}

// ── Expression with expression ──────────────────────────────────────────────

impl Add for Expression {
    type Output = Expression;

    fn add(mut self, rhs: Expression) -> Expression {
        self.push_scaled(1.0, &rhs);
        self
    }
}

impl Sub for Expression {
    type Output = Expression;

    fn sub(mut self, rhs: Expression) -> Expression {
        self.push_scaled(-1.0, &rhs);
        self
    }
}

impl AddAssign for Expression {
    fn add_assign(&mut self, rhs: Expression) {
        self.push_scaled(1.0, &rhs);
    }
}

impl SubAssign for Expression {
    fn sub_assign(&mut self, rhs: Expression) {
        self.push_scaled(-1.0, &rhs);
    }
}

impl Neg for Expression {
    type Output = Expression;

    fn neg(mut self) -> Expression {
        self.scale(-1.0);
        self
    }
}

// ── Expression with scalar ───────────────────────────────────────────────────

impl Add<f64> for Expression {
    type Output = Expression;

    fn add(mut self, rhs: f64) -> Expression {
        self.constant += rhs;
        self
    }
}

impl Sub<f64> for Expression {
    type Output = Expression;

    fn sub(mut self, rhs: f64) -> Expression {
        self.constant -= rhs;
        self
    }
}

impl Mul<f64> for Expression {
    type Output = Expression;

    fn mul(mut self, rhs: f64) -> Expression {
        self.scale(rhs);
        self
    }
}

impl MulAssign<f64> for Expression {
    fn mul_assign(&mut self, rhs: f64) {
        self.scale(rhs);
    }
}

impl Add<Expression> for f64 {
    type Output = Expression;

    fn add(self, rhs: Expression) -> Expression {
        rhs + self
    }
}

impl Sub<Expression> for f64 {
    type Output = Expression;

    fn sub(self, rhs: Expression) -> Expression {
        -rhs + self
    }
}

impl Mul<Expression> for f64 {
    type Output = Expression;

    fn mul(self, rhs: Expression) -> Expression {
        rhs * self
    }
}

// ── Variables ────────────────────────────────────────────────────────────────

impl Mul<f64> for &Variable {
    type Output = Expression;

    fn mul(self, rhs: f64) -> Expression {
        Expression::term(rhs, self)
    }
}

impl Mul<&Variable> for f64 {
    type Output = Expression;

    fn mul(self, rhs: &Variable) -> Expression {
        Expression::term(self, rhs)
    }
}

impl Add<&Variable> for f64 {
    type Output = Expression;

    fn add(self, rhs: &Variable) -> Expression {
        Expression::from_variable(rhs) + self
    }
}

impl Sub<&Variable> for f64 {
    type Output = Expression;

    fn sub(self, rhs: &Variable) -> Expression {
        Expression::term(-1.0, rhs) + self
    }
}

impl Add<f64> for &Variable {
    type Output = Expression;

    fn add(self, rhs: f64) -> Expression {
        Expression::from_variable(self) + rhs
    }
}

impl Sub<f64> for &Variable {
    type Output = Expression;

    fn sub(self, rhs: f64) -> Expression {
        Expression::from_variable(self) - rhs
    }
}

impl Add<&Variable> for &Variable {
    type Output = Expression;

    fn add(self, rhs: &Variable) -> Expression {
        let mut expr = Expression::from_variable(self);
        expr.push_linear(1.0, rhs);
        expr
    }
}

impl Sub<&Variable> for &Variable {
    type Output = Expression;

    fn sub(self, rhs: &Variable) -> Expression {
        let mut expr = Expression::from_variable(self);
        expr.push_linear(-1.0, rhs);
        expr
    }
}

impl Neg for &Variable {
    type Output = Expression;

    fn neg(self) -> Expression {
        Expression::term(-1.0, self)
    }
}

impl Add<&Variable> for Expression {
    type Output = Expression;

    fn add(mut self, rhs: &Variable) -> Expression {
        self.push_linear(1.0, rhs);
        self
    }
}

impl Sub<&Variable> for Expression {
    type Output = Expression;

    fn sub(mut self, rhs: &Variable) -> Expression {
        self.push_linear(-1.0, rhs);
        self
    }
}

impl Add<Expression> for &Variable {
    type Output = Expression;

    fn add(self, rhs: Expression) -> Expression {
        rhs + self
    }
}

impl Sub<Expression> for &Variable {
    type Output = Expression;

    fn sub(self, rhs: Expression) -> Expression {
        -rhs + self
    }
}

impl AddAssign<&Variable> for Expression {
    fn add_assign(&mut self, rhs: &Variable) {
        self.push_linear(1.0, rhs);
    }
}

impl SubAssign<&Variable> for Expression {
    fn sub_assign(&mut self, rhs: &Variable) {
        self.push_linear(-1.0, rhs);
    }
}

/// `x * y` is always degree 2, so it gets an operator too.
impl Mul<&Variable> for &Variable {
    type Output = Expression;

    fn mul(self, rhs: &Variable) -> Expression {
        let mut expr = Expression::new();
        expr.push_quadratic(1.0, self, rhs);
        expr
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::Expression;
    use crate::ids::IdAllocator;
    use crate::variable::Variable;

    #[test]
    fn test_operator_chain() {
        let ids = IdAllocator::new();
        let x = Variable::new(&ids);
        let y = Variable::new(&ids);

        let mut expr = 2.0 * &x + 3.0 * &y - &x + 5.0;
        expr.assemble().unwrap();
        assert!((expr.coefficient(&x) - 1.0).abs() < 1e-12);
        assert!((expr.coefficient(&y) - 3.0).abs() < 1e-12);
        assert!((expr.constant() - 5.0).abs() < 1e-12);

        let negated = -expr.clone();
        assert!((negated.coefficient(&y) + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_variable_product() {
        let ids = IdAllocator::new();
        let x = Variable::new(&ids);
        let y = Variable::new(&ids);
        let expr = &y * &x;
        assert_eq!(expr.quadratic_terms()[0].first, x);
        assert!((expr.quadratic_coefficient(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_conversions() {
        let ids = IdAllocator::new();
        let x = Variable::new(&ids);
        let e: Expression = (&x).into();
        assert_eq!(e.degree(), 1);
        let c: Expression = 4.0.into();
        assert_eq!(c.degree(), 0);
    }
}
