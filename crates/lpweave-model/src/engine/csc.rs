//! Column-major assembly of compiled rows and objective Hessians.

use lpweave_solver::CscMatrix;

/// Build a CSC matrix from `(row, col, value)` triplets in two passes: count the
/// entries of every column, then place each one at its column's cursor. Entries keep
/// their input order inside a column.
pub(crate) fn from_triplets(num_rows: usize, num_cols: usize, triplets: &[(usize, usize, f64)]) -> CscMatrix {
    let mut col_starts = vec![0usize; num_cols + 1];
    for &(_, col, _) in triplets {
        col_starts[col + 1] += 1;
    }
    for col in 0..num_cols {
        col_starts[col + 1] += col_starts[col];
    }

    let nnz = col_starts[num_cols];
    let mut row_indices = vec![0usize; nnz];
    let mut values = vec![0.0; nnz];
    let mut cursor = col_starts[..num_cols].to_vec();
    for &(row, col, value) in triplets {
        let slot = cursor[col];
        row_indices[slot] = row;
        values[slot] = value;
        cursor[col] += 1;
    }

    CscMatrix {
        num_rows,
        col_starts,
        row_indices,
        values,
    }
}

/// Triplets of the constraint matrix, row by row.
pub(crate) fn row_triplets(rows: &[Vec<(usize, f64)>]) -> Vec<(usize, usize, f64)> {
    rows.iter()
        .enumerate()
        .flat_map(|(row, entries)| entries.iter().map(move |&(col, value)| (row, col, value)))
        .collect()
}

/// Upper-triangular Hessian for `1/2 x'Qx` from terms `coef * x_i * x_j`.
///
/// Each term lands at `(min, max)` of its two columns; diagonal entries are doubled.
pub(crate) fn upper_hessian(num_cols: usize, terms: &[(usize, usize, f64)]) -> CscMatrix {
    let mut triplets: Vec<(usize, usize, f64)> = terms
        .iter()
        .map(|&(i, j, coef)| {
            let (row, col) = if i <= j { (i, j) } else { (j, i) };
            let value = if row == col { 2.0 * coef } else { coef };
            (row, col, value)
        })
        .collect();
    triplets.sort_by_key(|&(row, col, _)| (col, row));
    from_triplets(num_cols, num_cols, &triplets)
}
