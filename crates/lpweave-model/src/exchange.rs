//! Column/row exchange format for whole models.
//!
//! Variables are addressed by position in `variables`; missing or `null` bounds are
//! infinite, except a variable's lower bound which defaults to zero.

use lpweave_solver::ObjectiveSense;
use tracing::debug;

use crate::constraint::{Constraint, ConstraintType};
use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::ids::IdAllocator;
use crate::model::Model;
use crate::objective::Objective;
use crate::variable::{Variable, VariableKind};

#[cfg(feature = "serde")]
fn zero() -> Option<f64> {
    Some(0.0)
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default = "zero"))]
    pub lower: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub upper: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub integer: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermSpec {
    pub column: usize,
    pub coefficient: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSpec {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    pub terms: Vec<TermSpec>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub lower: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub upper: Option<f64>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectiveSpec {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub constant: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub terms: Vec<TermSpec>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSpec {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub sense: ObjectiveSense,
    pub variables: Vec<VariableSpec>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub constraints: Vec<ConstraintSpec>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub objective: ObjectiveSpec,
}

fn bound(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn linear(variables: &[Variable], terms: &[TermSpec], owner: &str) -> Result<Expression> {
    let mut expr = Expression::new();
    for term in terms {
        let variable = variables.get(term.column).ok_or_else(|| {
            Error::term(format!(
                "{owner} references column {} but only {} variables exist",
                term.column,
                variables.len()
            ))
        })?;
        expr.add_term(term.coefficient, variable)?;
    }
    Ok(expr)
}

/// Pick the row shape from which bounds are present.
fn import_row(ids: &IdAllocator, spec: &ConstraintSpec, expr: Expression) -> Result<Constraint> {
    let constraint = match (bound(spec.lower), bound(spec.upper)) {
        (Some(lower), Some(upper)) if lower == upper => {
            Constraint::new(ids, expr, ConstraintType::Eq, lower)?
        }
        (None, Some(upper)) => Constraint::new(ids, expr, ConstraintType::Le, upper)?,
        (Some(lower), None) => Constraint::new(ids, expr, ConstraintType::Ge, lower)?,
        (Some(lower), Some(upper)) => Constraint::range(ids, lower, expr, upper)?,
        (None, None) => {
            let free = Constraint::range(ids, f64::NEG_INFINITY, expr, f64::INFINITY)?;
            free.set_enabled(false)?;
            free
        }
    };
    if let Some(name) = &spec.name {
        constraint.set_name(name.as_str())?;
    }
    Ok(constraint)
}

impl Model {
    /// Build a model from the exchange format. Returns the model and its variables in
    /// column order.
    pub fn from_spec(ids: &IdAllocator, spec: &ModelSpec) -> Result<(Model, Vec<Variable>)> {
        let model = match &spec.name {
            Some(name) => Model::named(ids, name.as_str()),
            None => Model::new(ids),
        };

        let variables = spec
            .variables
            .iter()
            .map(|v| {
                let lower = v.lower.unwrap_or(f64::NEG_INFINITY);
                let upper = v.upper.unwrap_or(f64::INFINITY);
                if v.integer {
                    Variable::integer(ids, v.name.as_str(), lower, upper)
                } else {
                    Variable::bounded(ids, v.name.as_str(), lower, upper)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut objective = linear(&variables, &spec.objective.terms, "objective")?;
        objective.add_constant(spec.objective.constant)?;
        let objective = match &spec.objective.name {
            Some(name) => Objective::named(ids, name.as_str(), objective),
            None => Objective::named(ids, "obj", objective),
        };
        model.set_objective(&objective)?;
        model.set_sense(spec.sense)?;

        for (row, constraint) in spec.constraints.iter().enumerate() {
            let owner = format!("constraint {row}");
            let expr = linear(&variables, &constraint.terms, &owner)?;
            model.add(&import_row(ids, constraint, expr)?)?;
        }

        debug!(
            component = "exchange",
            operation = "import",
            model = %model.name(),
            variables = variables.len(),
            constraints = spec.constraints.len(),
            integers = variables.iter().filter(|v| v.kind() == VariableKind::Integer).count(),
        );
        Ok((model, variables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(column: usize, coefficient: f64) -> TermSpec {
        TermSpec { column, coefficient }
    }

    fn row(lower: Option<f64>, upper: Option<f64>) -> ConstraintSpec {
        ConstraintSpec {
            name: None,
            terms: vec![term(0, 1.0)],
            lower,
            upper,
        }
    }

    fn spec(constraints: Vec<ConstraintSpec>) -> ModelSpec {
        ModelSpec {
            name: Some("imported".into()),
            sense: ObjectiveSense::Maximize,
            variables: vec![VariableSpec {
                name: "x".into(),
                lower: Some(0.0),
                upper: None,
                integer: false,
            }],
            constraints,
            objective: ObjectiveSpec {
                name: None,
                constant: 1.0,
                terms: vec![term(0, 2.0)],
            },
        }
    }

    #[test]
    fn test_row_classification() {
        let ids = IdAllocator::new();
        let (model, vars) = Model::from_spec(
            &ids,
            &spec(vec![
                row(Some(2.0), Some(2.0)),
                row(None, Some(4.0)),
                row(Some(1.0), None),
                row(Some(1.0), Some(3.0)),
                row(None, None),
            ]),
        )
        .unwrap();

        let rows = model.constraints();
        assert_eq!(rows[0].constraint_type(), ConstraintType::Eq);
        assert_eq!(rows[1].constraint_type(), ConstraintType::Le);
        assert_eq!(rows[2].constraint_type(), ConstraintType::Ge);
        assert!(rows[3].is_range());
        assert_eq!((rows[3].lower(), rows[3].upper()), (1.0, 3.0));
        assert!(rows[4].is_range());
        assert!(!rows[4].is_enabled());

        assert_eq!(model.name(), "imported");
        assert_eq!(model.sense(), ObjectiveSense::Maximize);
        assert_eq!(vars[0].name(), "x");
        assert!((model.objective().constant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_column() {
        let ids = IdAllocator::new();
        let mut bad = spec(vec![]);
        bad.constraints.push(ConstraintSpec {
            name: Some("broken".into()),
            terms: vec![term(3, 1.0)],
            lower: None,
            upper: Some(1.0),
        });
        let err = Model::from_spec(&ids, &bad).unwrap_err();
        assert_eq!(err.code(), "TERM_INVALID");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_nulls_are_infinite() {
        let json = r#"{
            "variables": [{"name": "x", "upper": null}, {"name": "y", "lower": null, "integer": true}],
            "constraints": [{"name": "cap", "terms": [{"column": 0, "coefficient": 1.0}], "upper": 4.0}],
            "objective": {"terms": [{"column": 1, "coefficient": 1.0}]}
        }"#;
        let spec: ModelSpec = serde_json::from_str(json).unwrap();
        let ids = IdAllocator::new();
        let (model, vars) = Model::from_spec(&ids, &spec).unwrap();
        assert_eq!(vars[0].lower(), 0.0);
        assert!(vars[0].upper().is_infinite());
        assert!(vars[1].lower().is_infinite());
        assert!(vars[1].is_integer());
        assert!(model.constraint("cap").is_some());
    }
}
