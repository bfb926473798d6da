//! Dense linear algebra for the linear model family.
//!
//! Least squares goes through a Householder QR followed by a one-sided Jacobi
//! SVD of the triangular factor, so rank-deficient designs (duplicated
//! one-hot columns, high polynomial degrees) still get the minimum-norm
//! solution. Ridge systems are symmetric positive definite and use Cholesky.

use ndarray::{Array1, Array2, Axis, s};

use crate::error::{LearningError, Result};

const MAX_SWEEPS: usize = 80;

/// Thin SVD `m = u · diag(sigma) · vᵀ` of an `r × c` matrix, `c` columns kept.
struct Svd {
    u: Array2<f64>,
    sigma: Array1<f64>,
    v: Array2<f64>,
}

/// One-sided Jacobi (Hestenes) SVD. Orthogonalizes the columns of `m`.
fn jacobi_svd(m: &Array2<f64>) -> Svd {
    let (rows, cols) = m.dim();
    let mut w = m.to_owned();
    let mut v = Array2::<f64>::eye(cols);
    let tol = f64::EPSILON * rows.max(1) as f64;

    for _ in 0..MAX_SWEEPS {
        let mut rotated = false;
        for i in 0..cols {
            for j in (i + 1)..cols {
                let wi = w.column(i);
                let wj = w.column(j);
                let alpha = wi.dot(&wi);
                let beta = wj.dot(&wj);
                let gamma = wi.dot(&wj);
                if gamma == 0.0 || gamma.abs() <= tol * (alpha * beta).sqrt() {
                    continue;
                }
                rotated = true;

                let zeta = (beta - alpha) / (2.0 * gamma);
                let t = zeta.signum() / (zeta.abs() + (1.0 + zeta * zeta).sqrt());
                let c = 1.0 / (1.0 + t * t).sqrt();
                let sn = c * t;

                rotate_columns(&mut w, i, j, c, sn);
                rotate_columns(&mut v, i, j, c, sn);
            }
        }
        if !rotated {
            break;
        }
    }

    let sigma: Array1<f64> = w.axis_iter(Axis(1)).map(|col| col.dot(&col).sqrt()).collect();
    let mut u = w;
    for (k, &s_k) in sigma.iter().enumerate() {
        if s_k > 0.0 {
            u.column_mut(k).mapv_inplace(|x| x / s_k);
        }
    }

    Svd { u, sigma, v }
}

fn rotate_columns(m: &mut Array2<f64>, i: usize, j: usize, c: f64, s: f64) {
    for r in 0..m.nrows() {
        let a = m[[r, i]];
        let b = m[[r, j]];
        m[[r, i]] = c * a - s * b;
        m[[r, j]] = s * a + c * b;
    }
}

/// Singular values below this are treated as zero.
fn cutoff(sigma: &Array1<f64>, rows: usize, cols: usize) -> f64 {
    let max = sigma.iter().copied().fold(0.0_f64, f64::max);
    max * f64::EPSILON * rows.max(cols) as f64
}

/// Householder QR of a tall matrix. Returns `R` (`p × p`) and `Qᵀb` (first `p`).
fn householder_qr(a: &Array2<f64>, b: &Array1<f64>) -> (Array2<f64>, Array1<f64>) {
    let (n, p) = a.dim();
    let mut r = a.to_owned();
    let mut qtb = b.to_owned();

    for k in 0..p {
        let norm = r.slice(s![k.., k]).dot(&r.slice(s![k.., k])).sqrt();
        if norm == 0.0 {
            continue;
        }
        let alpha = if r[[k, k]] > 0.0 { -norm } else { norm };

        let mut v = r.slice(s![k.., k]).to_owned();
        v[0] -= alpha;
        let v_norm_sq = v.dot(&v);
        if v_norm_sq == 0.0 {
            continue;
        }

        for j in k..p {
            let dot = v.dot(&r.slice(s![k.., j]));
            let f = 2.0 * dot / v_norm_sq;
            for (idx, row) in (k..n).enumerate() {
                r[[row, j]] -= f * v[idx];
            }
        }
        let dot = v.dot(&qtb.slice(s![k..]));
        let f = 2.0 * dot / v_norm_sq;
        for (idx, row) in (k..n).enumerate() {
            qtb[row] -= f * v[idx];
        }
    }

    let r_top = r.slice(s![..p, ..]).to_owned();
    let qtb_top = qtb.slice(s![..p]).to_owned();
    (r_top, qtb_top)
}

/// Minimum-norm least-squares solution of `a · x ≈ b`.
pub fn lstsq(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let (n, p) = a.dim();
    if n != b.len() {
        return Err(LearningError::TrainingFailed(format!(
            "design has {n} rows but target has {}",
            b.len()
        )));
    }
    if n == 0 || p == 0 {
        return Ok(Array1::zeros(p));
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(LearningError::TrainingFailed(
            "design matrix or target contains non-finite values".to_string(),
        ));
    }

    let x = if p <= n {
        // R = U Σ Vᵀ  ⇒  x = V Σ⁺ Uᵀ (Qᵀb)
        let (r, qtb) = householder_qr(a, b);
        let svd = jacobi_svd(&r);
        let limit = cutoff(&svd.sigma, n, p);
        let mut coeffs = svd.u.t().dot(&qtb);
        for (k, c) in coeffs.iter_mut().enumerate() {
            *c = if svd.sigma[k] > limit { *c / svd.sigma[k] } else { 0.0 };
        }
        svd.v.dot(&coeffs)
    } else {
        // Aᵀ = U Σ Vᵀ  ⇒  A = V Σ Uᵀ  ⇒  x = U Σ⁺ Vᵀ b
        let svd = jacobi_svd(&a.t().to_owned());
        let limit = cutoff(&svd.sigma, n, p);
        let mut coeffs = svd.v.t().dot(b);
        for (k, c) in coeffs.iter_mut().enumerate() {
            *c = if svd.sigma[k] > limit { *c / svd.sigma[k] } else { 0.0 };
        }
        svd.u.dot(&coeffs)
    };

    if x.iter().any(|v| !v.is_finite()) {
        return Err(LearningError::TrainingFailed(
            "least-squares solution is not finite".to_string(),
        ));
    }
    Ok(x)
}

/// Solve `a · x = b` for symmetric positive definite `a`.
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return Err(LearningError::TrainingFailed(
            "cholesky_solve needs a square system".to_string(),
        ));
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if !(sum > 0.0) || !sum.is_finite() {
                    return Err(LearningError::TrainingFailed(
                        "matrix is not positive definite".to_string(),
                    ));
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }
    // Lᵀ x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_close(a: &Array1<f64>, b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < tol, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_lstsq_exact_system() {
        let a = array![[1.0, 0.0], [0.0, 2.0], [1.0, 1.0]];
        let b = array![1.0, 4.0, 3.0];
        let x = lstsq(&a, &b).unwrap();
        assert_close(&x, &[1.0, 2.0], 1e-10);
    }

    #[test]
    fn test_lstsq_overdetermined() {
        // Best fit of y = 2x through noisy-free points plus one outlier direction.
        let a = array![[1.0], [2.0], [3.0], [4.0]];
        let b = array![2.0, 4.0, 6.0, 8.0];
        let x = lstsq(&a, &b).unwrap();
        assert_close(&x, &[2.0], 1e-10);
    }

    #[test]
    fn test_lstsq_rank_deficient_min_norm() {
        // Two identical columns: the minimum-norm solution splits the weight.
        let a = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let b = array![2.0, 4.0, 6.0];
        let x = lstsq(&a, &b).unwrap();
        assert_close(&x, &[1.0, 1.0], 1e-9);
    }

    #[test]
    fn test_lstsq_wide_matrix() {
        // More unknowns than equations.
        let a = array![[1.0, 0.0, 1.0], [0.0, 1.0, 1.0]];
        let b = array![1.0, 1.0];
        let x = lstsq(&a, &b).unwrap();
        let residual = a.dot(&x) - &b;
        assert!(residual.iter().all(|r| r.abs() < 1e-10));
        assert_close(&x, &[1.0 / 3.0, 1.0 / 3.0, 2.0 / 3.0], 1e-9);
    }

    #[test]
    fn test_cholesky_solve() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = cholesky_solve(&a, &b).unwrap();
        assert_close(&x, &[0.5, 0.0], 1e-12);
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        assert!(cholesky_solve(&a, &array![1.0, 1.0]).is_err());
    }
}
