mod common;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use common::{investment, take_calls, RecordingBackend, Rejection};
use lpweave_model::{
    Constraint, Expression, IdAllocator, Model, Objective, ObjectiveSense, Solver, SolverConfig, Variable,
    VariableKind,
};
use lpweave_solver::{Backend, SimplexBackend, SparseVector};

fn calls_matching(log: &common::CallLog, prefix: &str) -> Vec<String> {
    take_calls(log).into_iter().filter(|c| c.starts_with(prefix)).collect()
}

#[test]
fn test_textbook_maximisation() {
    let ids = IdAllocator::new();
    let model = Model::new(&ids);
    let x = Variable::named(&ids, "x");
    let y = Variable::named(&ids, "y");
    model.set_objective(&Objective::new(&ids, 3.0 * &x + &y)).unwrap();
    model.add(&Constraint::le(&ids, 2.0 * &x + 3.0 * &y, 10.0).unwrap()).unwrap();

    let solver = Solver::new(&model, SimplexBackend::new());
    solver.maximise(false).unwrap();

    assert!(solver.is_proven_optimal());
    assert_abs_diff_eq!(x.value(), 5.0, epsilon = 1e-6);
    assert_abs_diff_eq!(y.value(), 0.0, epsilon = 1e-6);
    assert_relative_eq!(solver.objective_value(), 15.0, epsilon = 1e-6);
}

#[test]
fn test_investment_primal_and_dual_values() {
    let inv = investment();
    let solver = Solver::new(&inv.model, SimplexBackend::new());
    solver.solve(false).unwrap();

    assert!(solver.is_proven_optimal());
    assert_abs_diff_eq!(inv.x.value(), 3.0, epsilon = 1e-6);
    assert_abs_diff_eq!(inv.y.value(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(solver.objective_value(), 11.0, epsilon = 1e-6);
    assert_relative_eq!(inv.model.objective().value(), 11.0, epsilon = 1e-6);

    assert_abs_diff_eq!(inv.budget.price(), 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(inv.labour.price(), 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(inv.budget.value(), 4.0, epsilon = 1e-6);
    assert_abs_diff_eq!(inv.labour.value(), 6.0, epsilon = 1e-6);
    assert_abs_diff_eq!(inv.labour.slack(), 3.0, epsilon = 1e-6);
    assert_abs_diff_eq!(inv.x.reduced_cost(), 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(inv.y.reduced_cost(), 0.0, epsilon = 1e-6);

    assert!(inv.x.is_feasible(1e-9));
    assert!(inv.budget.is_feasible(1e-9));
    assert_eq!(solver.column_of(&inv.x), Some(0));
    assert_eq!(solver.column_of(&inv.y), Some(1));
    assert_eq!(solver.row_of(&inv.labour), Some(1));
}

#[test]
fn test_objective_constant_is_added_to_value() {
    let inv = investment();
    inv.model.objective().set_constant(5.0).unwrap();
    let solver = Solver::new(&inv.model, SimplexBackend::new());
    solver.solve(false).unwrap();
    assert_relative_eq!(solver.objective_value(), 16.0, epsilon = 1e-6);
}

#[test]
fn test_range_lower_moves_only_its_row() {
    let ids = IdAllocator::new();
    let model = Model::new(&ids);
    let x = Variable::named(&ids, "x");
    let y = Variable::named(&ids, "y");
    model.set_objective(&Objective::new(&ids, &x + &y)).unwrap();
    let cap = Constraint::le(&ids, &x + &y, 8.0).unwrap();
    let band = Constraint::range(&ids, 0.0, 2.0 * &x + &y, 10.0).unwrap();
    model.add(&cap).unwrap();
    model.add(&band).unwrap();

    let (backend, log) = RecordingBackend::new();
    let solver = Solver::new(&model, backend);
    solver.generate().unwrap();
    take_calls(&log);

    band.set_lower(4.0).unwrap();
    assert_eq!(take_calls(&log), vec!["set_row_lower(1, 4)".to_string()]);
    assert_eq!(band.lower(), 4.0);

    let (lower, upper) = solver
        .with_backend(|b| (b.row_lower().to_vec(), b.row_upper().to_vec()))
        .unwrap();
    assert_eq!(lower[1], 4.0);
    assert_eq!(upper[1], 10.0);
    assert!(lower[0].is_infinite());
    assert_eq!(upper[0], 8.0);
}

#[test]
fn test_plain_constraint_rejects_explicit_bounds() {
    let inv = investment();
    let err = inv.budget.set_lower(1.0).unwrap_err();
    assert_eq!(err.code(), "STRUCTURE_UNSUPPORTED");
}

#[test]
fn test_constraint_added_after_generate_is_appended() {
    let inv = investment();
    let (backend, log) = RecordingBackend::new();
    let solver = Solver::new(&inv.model, backend);
    solver.generate().unwrap();
    take_calls(&log);

    let z = Variable::bounded(&inv.ids, "z", 0.0, 2.0).unwrap();
    let extra = Constraint::le(&inv.ids, &inv.x + &z, 5.0).unwrap();
    inv.model.add(&extra).unwrap();
    assert_eq!(solver.statistics().queued, 1);

    solver.generate().unwrap();
    assert_eq!(
        calls_matching(&log, "add_"),
        vec!["add_column(0, 0, 2, 0)".to_string(), "add_row(2, -inf, 5)".to_string()]
    );
    assert_eq!(solver.row_of(&extra), Some(2));
    assert_eq!(solver.column_of(&z), Some(2));

    let stats = solver.statistics();
    assert_eq!((stats.columns, stats.rows, stats.queued), (3, 3, 0));
    assert_eq!(stats.nonzeros, 6);

    solver.solve(false).unwrap();
    assert_relative_eq!(solver.objective_value(), 11.0, epsilon = 1e-6);
}

#[test]
fn test_duplicate_add_is_a_registration_conflict() {
    let inv = investment();
    let err = inv.model.add(&inv.budget).unwrap_err();
    assert_eq!(err.code(), "ENTITY_REGISTRATION");
    assert_eq!(inv.model.num_constraints(), 2);
}

#[test]
fn test_coefficient_edits_on_compiled_rows() {
    let inv = investment();
    let (backend, log) = RecordingBackend::new();
    let solver = Solver::new(&inv.model, backend);
    solver.generate().unwrap();
    take_calls(&log);

    let previous = inv.budget.set_coefficient(&inv.y, 2.0).unwrap();
    assert_eq!(previous, 1.0);
    assert_eq!(take_calls(&log), vec!["set_coefficient(0, 1, 2)".to_string()]);
    assert_eq!(solver.with_backend(|b| b.coefficient(0, 1)).unwrap(), Some(2.0));

    let err = inv.budget.set_coefficient(&inv.y, 0.0).unwrap_err();
    assert_eq!(err.code(), "STRUCTURE_UNSUPPORTED");
    assert_eq!(inv.budget.coefficient(&inv.y), 2.0);

    let z = Variable::named(&inv.ids, "z");
    let err = inv.labour.set_coefficient(&z, 1.0).unwrap_err();
    assert_eq!(err.code(), "STRUCTURE_UNSUPPORTED");
    assert_eq!(inv.labour.coefficient(&z), 0.0);
    assert!(take_calls(&log).is_empty());
}

#[test]
fn test_coefficient_edit_before_generate_is_free() {
    let inv = investment();
    let z = Variable::named(&inv.ids, "z");
    inv.labour.set_coefficient(&z, 1.0).unwrap();
    inv.labour.set_coefficient(&inv.x, 0.0).unwrap();

    let solver = Solver::new(&inv.model, SimplexBackend::new());
    solver.generate().unwrap();
    let row = solver.row_of(&inv.labour).unwrap();
    let col_x = solver.column_of(&inv.x).unwrap();
    let col_z = solver.column_of(&z).unwrap();
    assert_eq!(solver.with_backend(|b| b.coefficient(row, col_z)).unwrap(), Some(1.0));
    assert_eq!(solver.with_backend(|b| b.coefficient(row, col_x)).unwrap(), None);
}

#[test]
fn test_disable_frees_row_without_moving_offsets() {
    let inv = investment();
    let (backend, log) = RecordingBackend::new();
    let solver = Solver::new(&inv.model, backend);
    solver.generate().unwrap();
    take_calls(&log);

    inv.budget.set_enabled(false).unwrap();
    assert_eq!(take_calls(&log), vec!["set_row_type(0, Free, 0, 0)".to_string()]);
    assert_eq!(solver.row_of(&inv.budget), Some(0));
    assert_eq!(solver.row_of(&inv.labour), Some(1));
    assert_eq!(solver.column_of(&inv.y), Some(1));

    solver.solve(false).unwrap();
    // x = 3, y = 2 once only labour and the bound on x bind
    assert_relative_eq!(solver.objective_value(), 13.0, epsilon = 1e-6);
    assert!(inv.budget.is_feasible(1e-9));

    inv.budget.set_enabled(true).unwrap();
    assert_eq!(
        calls_matching(&log, "set_row_type"),
        vec!["set_row_type(0, Le, 4, 0)".to_string()]
    );
    solver.solve(false).unwrap();
    assert_relative_eq!(solver.objective_value(), 11.0, epsilon = 1e-6);
}

#[test]
fn test_disabled_range_keeps_bound_edits_until_enabled() {
    let ids = IdAllocator::new();
    let model = Model::new(&ids);
    let x = Variable::named(&ids, "x");
    model.set_objective(&Objective::new(&ids, &x)).unwrap();
    let band = Constraint::range(&ids, 1.0, &x, 3.0).unwrap();
    model.add(&band).unwrap();

    let (backend, log) = RecordingBackend::new();
    let solver = Solver::new(&model, backend);
    solver.generate().unwrap();
    band.set_enabled(false).unwrap();
    take_calls(&log);

    band.set_bounds(2.0, 6.0).unwrap();
    assert!(take_calls(&log).is_empty());

    band.set_enabled(true).unwrap();
    assert_eq!(take_calls(&log), vec!["set_row_type(0, Range, 6, 4)".to_string()]);
    solver.maximise(false).unwrap();
    assert_abs_diff_eq!(x.value(), 6.0, epsilon = 1e-6);
}

#[test]
fn test_freeze_pins_and_unfreeze_restores() {
    let inv = investment();
    let (backend, log) = RecordingBackend::new();
    let solver = Solver::new(&inv.model, backend);
    solver.generate().unwrap();
    take_calls(&log);

    inv.y.set_value(1.5);
    inv.y.freeze().unwrap();
    inv.y.freeze().unwrap();
    assert_eq!(take_calls(&log), vec!["set_col_bounds(1, 1.5, 1.5)".to_string()]);

    inv.y.set_upper(10.0).unwrap();
    inv.y.unfreeze().unwrap();
    assert!(take_calls(&log).is_empty());
    assert!(inv.y.is_frozen());

    inv.y.unfreeze().unwrap();
    assert_eq!(take_calls(&log), vec!["set_col_bounds(1, 0, 10)".to_string()]);
    assert_eq!(inv.y.upper(), 10.0);
}

#[test]
fn test_frozen_variable_compiles_at_its_value() {
    let inv = investment();
    inv.x.set_value(2.0);
    inv.x.freeze().unwrap();

    let solver = Solver::new(&inv.model, SimplexBackend::new());
    solver.solve(false).unwrap();
    assert_abs_diff_eq!(inv.x.value(), 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(inv.y.value(), 2.0, epsilon = 1e-6);
}

#[test]
fn test_bound_and_kind_edits_reach_backend() {
    let inv = investment();
    let (backend, log) = RecordingBackend::new();
    let solver = Solver::new(&inv.model, backend);
    solver.generate().unwrap();
    take_calls(&log);

    inv.x.set_lower(1.0).unwrap();
    inv.y.set_upper(0.5).unwrap();
    inv.y.set_kind(VariableKind::Integer).unwrap();
    assert_eq!(
        take_calls(&log),
        vec![
            "set_col_lower(0, 1)".to_string(),
            "set_col_upper(1, 0.5)".to_string(),
            "set_integer(1, true)".to_string(),
        ]
    );
    assert!(solver.with_backend(|b| b.is_integer(1)).unwrap());
}

#[test]
fn test_objective_swap_rewrites_dense_vector() {
    let inv = investment();
    let (backend, log) = RecordingBackend::new();
    let solver = Solver::new(&inv.model, backend);
    solver.generate().unwrap();
    take_calls(&log);

    let old = inv.model.objective();
    let alternative = Objective::named(&inv.ids, "alt", &inv.x + 4.0 * &inv.y);
    inv.model.set_objective(&alternative).unwrap();
    assert_eq!(take_calls(&log), vec!["set_objective([1.0, 4.0])".to_string()]);
    assert!(!old.is_registered());
    assert!(alternative.is_registered());
    assert!(solver.objective().ptr_eq(&alternative));

    solver.solve(false).unwrap();
    assert_relative_eq!(solver.objective_value(), 12.0, epsilon = 1e-6);
    assert_abs_diff_eq!(inv.y.value(), 3.0, epsilon = 1e-6);
}

#[test]
fn test_objective_coefficient_edit() {
    let inv = investment();
    let (backend, log) = RecordingBackend::new();
    let solver = Solver::new(&inv.model, backend);
    solver.generate().unwrap();
    take_calls(&log);

    let objective = inv.model.objective();
    assert_eq!(objective.set_coefficient(&inv.y, 5.0).unwrap(), 2.0);
    assert_eq!(take_calls(&log), vec!["set_objective_coefficient(1, 5)".to_string()]);

    let z = Variable::named(&inv.ids, "z");
    let err = objective.set_coefficient(&z, 1.0).unwrap_err();
    assert_eq!(err.code(), "STRUCTURE_UNSUPPORTED");
    assert_eq!(objective.coefficient(&z), 0.0);
}

#[test]
fn test_sense_change_is_forwarded() {
    let inv = investment();
    let (backend, log) = RecordingBackend::new();
    let solver = Solver::new(&inv.model, backend);
    solver.solve(false).unwrap();
    take_calls(&log);

    inv.model.set_sense(ObjectiveSense::Minimize).unwrap();
    assert_eq!(take_calls(&log), vec!["set_objective_sense(Minimize)".to_string()]);
    solver.resolve(false).unwrap();
    assert_abs_diff_eq!(solver.objective_value(), 0.0, epsilon = 1e-6);
}

#[test]
fn test_shared_model_fans_out_and_last_solve_wins() {
    let inv = investment();
    let first = Solver::new(&inv.model, SimplexBackend::new());
    let second = Solver::new(&inv.model, SimplexBackend::new());
    first.generate().unwrap();
    second.generate().unwrap();
    assert_eq!(inv.model.engine_count(), 2);

    inv.x.set_upper(2.0).unwrap();
    for solver in [&first, &second] {
        assert_eq!(solver.with_backend(|b| b.col_upper()[0]).unwrap(), 2.0);
    }

    second.with_backend_mut(|b| b.set_col_upper(0, 1.0)).unwrap().unwrap();
    second.solve(false).unwrap();
    assert_abs_diff_eq!(inv.x.value(), 1.0, epsilon = 1e-6);
    assert_eq!(inv.x.assigned_engine(), Some(second.id()));

    first.solve(false).unwrap();
    assert_abs_diff_eq!(inv.x.value(), 2.0, epsilon = 1e-6);
    assert_eq!(inv.x.assigned_engine(), Some(first.id()));
    assert_eq!(inv.budget.assigned_offset(), Some(0));
    assert_relative_eq!(first.objective_value(), 10.0, epsilon = 1e-6);

    drop(first);
    assert_eq!(inv.model.engine_count(), 1);
    assert!(inv.x.is_registered());
}

fn knapsack(config: SolverConfig) -> (Solver, common::CallLog, Variable, Variable) {
    let (solver, log, _, x, y) = knapsack_with_rejection(config);
    (solver, log, x, y)
}

fn knapsack_with_rejection(config: SolverConfig) -> (Solver, common::CallLog, Rejection, Variable, Variable) {
    let ids = IdAllocator::new();
    let model = Model::new(&ids);
    let x = Variable::integer(&ids, "x", 0.0, 10.0).unwrap();
    let y = Variable::integer(&ids, "y", 0.0, 10.0).unwrap();
    model.set_objective(&Objective::new(&ids, 5.0 * &x + 4.0 * &y)).unwrap();
    model.set_sense(ObjectiveSense::Maximize).unwrap();
    model.add(&Constraint::le(&ids, 6.0 * &x + 4.0 * &y, 24.0).unwrap()).unwrap();
    model.add(&Constraint::le(&ids, &x + 2.0 * &y, 6.0).unwrap()).unwrap();

    let (backend, log) = RecordingBackend::new();
    let rejection = backend.rejection();
    (Solver::with_config(&model, backend, config), log, rejection, x, y)
}

#[test]
fn test_branch_and_bound_restores_bounds() {
    let (solver, log, x, y) = knapsack(SolverConfig::default());
    solver.solve(false).unwrap();

    assert!(solver.is_proven_optimal());
    assert_relative_eq!(solver.objective_value(), 20.0, epsilon = 1e-6);
    assert!(solver.status().nodes > 1);
    assert!(x.is_feasible(1e-6) && y.is_feasible(1e-6));

    let calls = take_calls(&log);
    let searched = calls.iter().position(|c| c == "branch_and_bound").unwrap();
    let restored = calls.iter().position(|c| c == "set_col_lower_all(2)").unwrap();
    assert!(searched < restored);
    assert!(calls.contains(&"set_dual_objective_limit(inf)".to_string()));

    let (lower, upper) = solver
        .with_backend(|b| (b.col_lower().to_vec(), b.col_upper().to_vec()))
        .unwrap();
    assert_eq!(lower, vec![0.0, 0.0]);
    assert_eq!(upper, vec![10.0, 10.0]);
    assert!(!solver.has_mip_snapshot());
}

#[test]
fn test_forced_relaxation_skips_branching() {
    let (solver, log, x, _) = knapsack(SolverConfig::default());
    solver.solve(true).unwrap();
    assert_relative_eq!(solver.objective_value(), 21.0, epsilon = 1e-6);
    assert_abs_diff_eq!(x.value(), 3.0, epsilon = 1e-6);
    assert!(!take_calls(&log).contains(&"branch_and_bound".to_string()));
}

#[test]
fn test_manual_mip_save_and_reset() {
    let (auto, _, _, _) = knapsack(SolverConfig::default());
    assert_eq!(auto.save_before_mip_solve().unwrap_err().code(), "SOLVER_PRECONDITION");
    assert_eq!(auto.reset_after_mip_solve().unwrap_err().code(), "SOLVER_PRECONDITION");

    let (solver, log, _, _) = knapsack(SolverConfig::new().with_auto_reset_mip(false));
    assert_eq!(solver.reset_after_mip_solve().unwrap_err().code(), "SOLVER_PRECONDITION");

    solver.save_before_mip_solve().unwrap();
    assert!(solver.has_mip_snapshot());
    solver.solve(false).unwrap();
    assert_relative_eq!(solver.objective_value(), 20.0, epsilon = 1e-6);
    assert!(!take_calls(&log).iter().any(|c| c.starts_with("set_col_lower_all")));

    solver.reset_after_mip_solve().unwrap();
    let (lower, upper) = solver
        .with_backend(|b| (b.col_lower().to_vec(), b.col_upper().to_vec()))
        .unwrap();
    assert_eq!(lower, vec![0.0, 0.0]);
    assert_eq!(upper, vec![10.0, 10.0]);
    assert!(!solver.has_mip_snapshot());
}

#[test]
fn test_warm_resolve_takes_no_iterations() {
    let inv = investment();
    let solver = Solver::new(&inv.model, SimplexBackend::new());
    solver.solve(false).unwrap();
    assert!(solver.status().iterations > 0);

    let warm = solver.warm_start().unwrap();
    assert!(!warm.is_empty());
    assert!(warm.row_price().is_none());
    solver.set_warm_start(&warm).unwrap();
    solver.resolve(false).unwrap();
    assert_eq!(solver.status().iterations, 0);
    assert_relative_eq!(solver.objective_value(), 11.0, epsilon = 1e-6);

    let empty = solver.empty_warm_start().unwrap();
    solver.set_warm_start(&empty).unwrap();
    solver.resolve(false).unwrap();
    assert!(solver.status().iterations > 0);
}

#[test]
fn test_warm_start_carries_row_prices_when_configured() {
    let inv = investment();
    let (backend, log) = RecordingBackend::new();
    let config = SolverConfig::new().with_warm_start_row_prices(true);
    let solver = Solver::with_config(&inv.model, backend, config);
    assert!(solver.warm_start().is_err());
    solver.solve(false).unwrap();

    let warm = solver.warm_start().unwrap();
    assert_eq!(warm.row_price().map(<[f64]>::len), Some(2));
    take_calls(&log);
    solver.set_warm_start(&warm).unwrap();
    assert_eq!(
        take_calls(&log),
        vec![
            "set_warm_start".to_string(),
            "set_col_solution(2)".to_string(),
            "set_row_price(2)".to_string(),
        ]
    );
}

#[test]
fn test_ungenerate_then_generate_rebuilds_same_problem() {
    let inv = investment();
    let solver = Solver::new(&inv.model, SimplexBackend::new());
    solver.generate().unwrap();
    let snapshot = |solver: &Solver| {
        solver
            .with_backend(|b| {
                (
                    b.col_lower().to_vec(),
                    b.col_upper().to_vec(),
                    b.row_lower().to_vec(),
                    b.row_upper().to_vec(),
                    b.matrix_by_col().triplets(),
                )
            })
            .unwrap()
    };
    let before = snapshot(&solver);

    solver.ungenerate().unwrap();
    assert!(!solver.is_generated());
    assert!(!inv.x.is_registered());
    assert!(!inv.budget.is_registered());
    assert_eq!(solver.statistics().queued, 2);

    solver.generate().unwrap();
    assert_eq!(snapshot(&solver), before);
    assert_eq!(solver.row_of(&inv.budget), Some(0));
}

#[test]
fn test_resolve_requires_generate() {
    let inv = investment();
    let solver = Solver::new(&inv.model, SimplexBackend::new());
    assert_eq!(solver.resolve(false).unwrap_err().code(), "SOLVER_PRECONDITION");
}

#[test]
fn test_disposed_engine_refuses_work() {
    let inv = investment();
    let solver = Solver::new(&inv.model, SimplexBackend::new());
    solver.solve(false).unwrap();
    solver.dispose().unwrap();

    assert!(solver.is_disposed());
    assert!(!inv.x.is_registered());
    assert_eq!(inv.model.engine_count(), 0);
    assert_eq!(solver.solve(false).unwrap_err().code(), "SOLVER_PRECONDITION");
    assert!(solver.with_backend(|b| b.num_cols()).is_err());

    inv.x.set_upper(1.0).unwrap();
    solver.dispose().unwrap();
}

#[test]
fn test_backend_edits_behind_the_engine_are_caught() {
    let inv = investment();
    let solver = Solver::new(&inv.model, SimplexBackend::new());
    solver.solve(false).unwrap();
    solver
        .with_backend_mut(|b| b.add_column(&SparseVector::default(), 0.0, 1.0, 0.0))
        .unwrap()
        .unwrap();

    let err = solver.resolve(false).unwrap_err();
    assert_eq!(err.code(), "SOLVER_PRECONDITION");
}

#[test]
fn test_quadratic_objective_loads_hessian() {
    let ids = IdAllocator::new();
    let model = Model::new(&ids);
    let x = Variable::bounded(&ids, "x", 0.0, 5.0).unwrap();
    let mut shifted = Expression::from(&x) - 2.0;
    shifted.squared().unwrap();
    let objective = Objective::new(&ids, shifted);
    model.set_objective(&objective).unwrap();
    model.add(&Constraint::ge(&ids, &x, 1.0).unwrap()).unwrap();

    let (backend, log) = RecordingBackend::new();
    let solver = Solver::new(&model, backend);
    solver.generate().unwrap();
    assert!(take_calls(&log).contains(&"load_quadratic_objective(1)".to_string()));
    let hessian = solver
        .with_backend(|b| b.quadratic_objective().map(|h| h.triplets()))
        .unwrap();
    assert_eq!(hessian, Some(vec![(0, 0, 2.0)]));
    assert_eq!(solver.with_backend(|b| b.objective_coefficients().to_vec()).unwrap(), vec![-4.0]);

    let err = solver.solve(false).unwrap_err();
    assert_eq!(err.code(), "BACKEND_REJECTED");

    let linear = Objective::new(&ids, &x);
    let err = model.set_objective(&linear).unwrap_err();
    assert_eq!(err.code(), "STRUCTURE_UNSUPPORTED");
    assert!(model.objective().ptr_eq(&objective));

    let err = objective.set_quadratic_coefficient(&x, &x, 3.0).unwrap_err();
    assert_eq!(err.code(), "STRUCTURE_UNSUPPORTED");
}

#[test]
fn test_model_clear_refused_while_engines_attached() {
    let inv = investment();
    let solver = Solver::new(&inv.model, SimplexBackend::new());
    assert_eq!(inv.model.clear().unwrap_err().code(), "SOLVER_PRECONDITION");
    drop(solver);
    inv.model.clear().unwrap();
    assert_eq!(inv.model.num_constraints(), 0);
}

#[test]
fn test_infinite_right_hand_side_is_refused_up_front() {
    let ids = IdAllocator::new();
    let x = Variable::named(&ids, "x");
    let err = Constraint::le(&ids, &x, f64::INFINITY).unwrap_err();
    assert_eq!(err.code(), "TERM_INVALID");
}

#[test]
fn test_failed_assembly_is_repeatable_and_leaves_backend_untouched() {
    let ids = IdAllocator::new();
    let model = Model::new(&ids);
    let x = Variable::named(&ids, "x");
    model.set_objective(&Objective::new(&ids, &x)).unwrap();
    let overflow = Constraint::le(&ids, &x + 1e308, -1e308).unwrap();
    model.add(&overflow).unwrap();
    let shown = overflow.to_string();

    let (backend, log) = RecordingBackend::new();
    let solver = Solver::new(&model, backend);
    take_calls(&log);
    for _ in 0..2 {
        assert_eq!(solver.generate().unwrap_err().code(), "TERM_INVALID");
        assert_eq!(overflow.to_string(), shown);
        assert!(!solver.is_incomplete());
    }
    assert!(take_calls(&log).is_empty());
    assert!(!x.is_registered());
}

#[test]
fn test_queued_assembly_error_keeps_compiled_rows() {
    let inv = investment();
    let solver = Solver::new(&inv.model, SimplexBackend::new());
    solver.generate().unwrap();

    let overflow = Constraint::le(&inv.ids, &inv.x + 1e308, -1e308).unwrap();
    inv.model.add(&overflow).unwrap();
    assert_eq!(solver.generate().unwrap_err().code(), "TERM_INVALID");
    assert!(!solver.is_incomplete());
    assert_eq!(solver.statistics().rows, 2);
    assert_eq!(solver.statistics().queued, 1);
    assert_eq!(solver.row_of(&overflow), None);
}

#[test]
fn test_rejected_load_refuses_until_ungenerate() {
    let inv = investment();
    let (backend, log) = RecordingBackend::new();
    let rejection = backend.rejection();
    let solver = Solver::new(&inv.model, backend);

    rejection.borrow_mut().push("load_problem");
    assert_eq!(solver.generate().unwrap_err().code(), "BACKEND_REJECTED");
    assert!(solver.is_incomplete());
    assert_eq!(solver.generate().unwrap_err().code(), "SOLVER_PRECONDITION");
    assert_eq!(solver.solve(false).unwrap_err().code(), "SOLVER_PRECONDITION");

    rejection.borrow_mut().clear();
    take_calls(&log);
    solver.ungenerate().unwrap();
    assert!(!solver.is_incomplete());
    solver.solve(false).unwrap();
    assert_eq!(calls_matching(&log, "load_problem"), vec!["load_problem(2x2)".to_string()]);
    assert_relative_eq!(solver.objective_value(), 11.0, epsilon = 1e-6);
    assert_eq!(inv.budget.assigned_offset(), Some(0));
    assert_eq!(inv.labour.assigned_offset(), Some(1));
}

#[test]
fn test_rejected_row_recompiles_unchanged_after_ungenerate() {
    let inv = investment();
    let (backend, _log) = RecordingBackend::new();
    let rejection = backend.rejection();
    let solver = Solver::new(&inv.model, backend);
    solver.solve(false).unwrap();

    let tight = Constraint::le(&inv.ids, &inv.x + &inv.y, 3.0).unwrap();
    inv.model.add(&tight).unwrap();
    rejection.borrow_mut().push("add_row");
    assert_eq!(solver.generate().unwrap_err().code(), "BACKEND_REJECTED");
    assert!(solver.is_incomplete());
    assert_eq!(solver.resolve(false).unwrap_err().code(), "SOLVER_PRECONDITION");

    rejection.borrow_mut().clear();
    solver.ungenerate().unwrap();
    solver.solve(false).unwrap();
    let stats = solver.statistics();
    assert_eq!((stats.columns, stats.rows, stats.queued), (2, 3, 0));
    assert_eq!(solver.row_of(&tight), Some(2));
    assert_abs_diff_eq!(inv.x.value(), 3.0, epsilon = 1e-6);
    assert_abs_diff_eq!(inv.y.value(), 0.0, epsilon = 1e-6);
    assert_relative_eq!(solver.objective_value(), 9.0, epsilon = 1e-6);
}

#[test]
fn test_search_failure_is_reported_over_restore_failure() {
    let (solver, log, rejection, _, _) = knapsack_with_rejection(SolverConfig::default());
    rejection.borrow_mut().extend(["branch_and_bound", "set_col_lower_all"]);
    let err = solver.solve(false).unwrap_err();
    assert_eq!(err.code(), "BACKEND_REJECTED");
    assert!(err.to_string().contains("branch_and_bound"), "{err}");
    assert!(take_calls(&log).contains(&"set_col_lower_all(2)".to_string()));
    assert!(!solver.has_mip_snapshot());

    rejection.borrow_mut().retain(|op| *op != "branch_and_bound");
    let err = solver.solve(false).unwrap_err();
    assert!(err.to_string().contains("set_col_lower_all"), "{err}");
}

#[test]
fn test_each_engine_reads_its_own_solution() {
    let inv = investment();
    let first = Solver::new(&inv.model, SimplexBackend::new());
    let second = Solver::new(&inv.model, SimplexBackend::new());
    second.generate().unwrap();
    second.with_backend_mut(|b| b.set_col_upper(0, 1.0)).unwrap().unwrap();

    second.solve(false).unwrap();
    first.solve(false).unwrap();
    assert_eq!(inv.x.assigned_engine(), Some(first.id()));
    assert_abs_diff_eq!(inv.x.value(), 3.0, epsilon = 1e-6);

    assert_abs_diff_eq!(first.value(&inv.x).unwrap(), 3.0, epsilon = 1e-6);
    assert_abs_diff_eq!(second.value(&inv.x).unwrap(), 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(second.value(&inv.y).unwrap(), 8.0 / 3.0, epsilon = 1e-6);
    assert_abs_diff_eq!(first.reduced_cost(&inv.x).unwrap(), 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(second.reduced_cost(&inv.x).unwrap(), 7.0 / 3.0, epsilon = 1e-6);
    assert_abs_diff_eq!(first.price(&inv.budget).unwrap(), 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(second.price(&inv.labour).unwrap(), 2.0 / 3.0, epsilon = 1e-6);
    assert_abs_diff_eq!(second.activity(&inv.labour).unwrap(), 9.0, epsilon = 1e-6);
    assert_abs_diff_eq!(inv.labour.price(), 0.0, epsilon = 1e-6);

    let stranger = Variable::named(&inv.ids, "z");
    assert_eq!(first.value(&stranger).unwrap_err().code(), "SOLVER_PRECONDITION");
}

#[test]
fn test_engine_feasibility_uses_its_own_values() {
    let inv = investment();
    let first = Solver::new(&inv.model, SimplexBackend::new());
    let second = Solver::new(&inv.model, SimplexBackend::new());
    second.generate().unwrap();
    second.with_backend_mut(|b| b.set_col_upper(0, 1.0)).unwrap().unwrap();
    second.solve(false).unwrap();
    first.solve(false).unwrap();
    assert!(first.is_feasible(1e-6).unwrap());
    assert!(second.is_feasible(1e-6).unwrap());

    inv.x.set_upper(2.0).unwrap();
    assert!(!first.is_feasible(1e-6).unwrap());
    assert!(second.is_feasible(1e-6).unwrap());
}

#[test]
fn test_feasibility_checks_integrality() {
    let (solver, _, _, _) = knapsack(SolverConfig::default());
    solver.solve(true).unwrap();
    assert!(!solver.is_feasible(1e-6).unwrap());
    solver.solve(false).unwrap();
    assert!(solver.is_feasible(1e-6).unwrap());
}

#[test]
fn test_relaxation_flag_reaches_resolve_and_optimise() {
    let (solver, log, _, _) = knapsack(SolverConfig::default());
    solver.solve(true).unwrap();
    take_calls(&log);

    solver.resolve(true).unwrap();
    assert_relative_eq!(solver.objective_value(), 21.0, epsilon = 1e-6);
    assert!(!take_calls(&log).contains(&"branch_and_bound".to_string()));

    solver.maximise(false).unwrap();
    assert_relative_eq!(solver.objective_value(), 20.0, epsilon = 1e-6);
    assert!(take_calls(&log).contains(&"branch_and_bound".to_string()));

    solver.maximise(true).unwrap();
    assert_relative_eq!(solver.objective_value(), 21.0, epsilon = 1e-6);
    assert!(take_calls(&log).contains(&"resolve".to_string()));
}

#[test]
fn test_minimise_solves_first_then_resolves() {
    let inv = investment();
    let (backend, log) = RecordingBackend::new();
    let solver = Solver::new(&inv.model, backend);

    solver.minimise(false).unwrap();
    assert_abs_diff_eq!(solver.objective_value(), 0.0, epsilon = 1e-6);
    assert_eq!(calls_matching(&log, "initial_solve"), vec!["initial_solve".to_string()]);

    solver.maximise(false).unwrap();
    let calls = take_calls(&log);
    assert!(calls.contains(&"resolve".to_string()));
    assert!(!calls.contains(&"initial_solve".to_string()));
    assert_relative_eq!(solver.objective_value(), 11.0, epsilon = 1e-6);
}

#[test]
fn test_solution_and_statistics_reports() {
    let inv = investment();
    let solver = Solver::new(&inv.model, SimplexBackend::new());
    solver.solve(false).unwrap();

    let report = solver.solution_report().unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 9, "{report}");
    assert_eq!(lines[0], "Model status: Optimal");
    assert!(lines[1].starts_with("Objective: "));
    assert_eq!(lines[2], "Variables:");
    assert!(lines[3].starts_with("x : 0 <= "));
    assert_eq!(lines[5], "Constraints:");
    assert!(lines[6].starts_with("budget : -inf <= "));
    assert_eq!(lines[8], "End");

    assert_eq!(
        solver.statistics_report(),
        "Statistics for model investment\n Number of variables  : 2\n Number of constraints: 2\n Number of elements   : 4\n Number of integers   : 0"
    );
}
