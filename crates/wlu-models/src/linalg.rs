//! Dense helpers for the small normal-equation systems the models solve.

/// Solves `a * x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when a pivot vanishes.
pub fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

/// Builds `XᵀX` and `Xᵀy` for a design with a leading intercept column.
pub fn normal_equations(x: &[Vec<f64>], y: &[f64]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let p = x.first().map_or(0, Vec::len) + 1;
    let mut xtx = vec![vec![0.0; p]; p];
    let mut xty = vec![0.0; p];
    for (row, target) in x.iter().zip(y) {
        let design: Vec<f64> = std::iter::once(1.0).chain(row.iter().copied()).collect();
        for i in 0..p {
            xty[i] += design[i] * target;
            for j in 0..p {
                xtx[i][j] += design[i] * design[j];
            }
        }
    }
    (xtx, xty)
}

/// Evaluates `intercept + row · coefficients`.
pub fn linear_predict(intercept: f64, coefficients: &[f64], row: &[f64]) -> f64 {
    intercept + row.iter().zip(coefficients).map(|(a, b)| a * b).sum::<f64>()
}
