use ndarray::{Array2, ArrayView2, s};

use crate::{MlErr, Result};

/// The lower triangular factor `L` of a symmetric positive definite matrix `A = L · Lᵀ`.
///
/// Only the lower triangle of `A` is read, so slightly asymmetric inputs produced by floating
/// point round-off are treated as the symmetric matrix they approximate.
#[derive(Debug, Clone)]
pub struct Cholesky {
    l: Array2<f64>,
}

impl Cholesky {
    /// Factors the given square matrix.
    ///
    /// # Arguments
    /// * `a` - A symmetric positive definite matrix.
    ///
    /// # Returns
    /// The factorization, or `SingularMatrix` naming the first pivot that is not strictly
    /// positive (or not finite).
    pub fn factor(a: ArrayView2<f64>) -> Result<Self> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(MlErr::SizeMismatch {
                what: "cholesky columns",
                got: a.ncols(),
                expected: n,
            });
        }

        let mut l = Array2::<f64>::zeros((n, n));

        for i in 0..n {
            for j in 0..=i {
                let sum = l.slice(s![i, ..j]).dot(&l.slice(s![j, ..j]));

                if i == j {
                    let pivot = a[[i, i]] - sum;
                    if pivot <= 0. || !pivot.is_finite() {
                        return Err(MlErr::SingularMatrix { dim: n, pivot: i });
                    }

                    l[[i, i]] = pivot.sqrt();
                } else {
                    l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
                }
            }
        }

        Ok(Self { l })
    }

    /// Returns the dimension of the factored matrix.
    pub fn dim(&self) -> usize {
        self.l.nrows()
    }

    /// Returns the lower triangular factor.
    pub fn factor_l(&self) -> ArrayView2<'_, f64> {
        self.l.view()
    }

    /// Solves `A · x = b` for every column of `b` at once.
    ///
    /// # Arguments
    /// * `b` - The right hand sides, `dim` rows and any amount of columns.
    ///
    /// # Returns
    /// The solution with the same shape as `b`.
    pub fn solve(&self, b: ArrayView2<f64>) -> Result<Array2<f64>> {
        let n = self.dim();
        if b.nrows() != n {
            return Err(MlErr::SizeMismatch {
                what: "right hand side rows",
                got: b.nrows(),
                expected: n,
            });
        }

        let l = &self.l;
        let mut x = b.to_owned();

        // Forward substitution: L · y = b
        for i in 0..n {
            let acc = l.slice(s![i, ..i]).dot(&x.slice(s![..i, ..]));
            let mut row = x.row_mut(i);
            row -= &acc;
            row /= l[[i, i]];
        }

        // Back substitution: Lᵀ · x = y
        for i in (0..n).rev() {
            let acc = l.slice(s![i + 1.., i]).dot(&x.slice(s![i + 1.., ..]));
            let mut row = x.row_mut(i);
            row -= &acc;
            row /= l[[i, i]];
        }

        Ok(x)
    }
}

/// Solves `lhs · x = rhs` for a symmetric positive definite `lhs`.
///
/// # Returns
/// The solution, or `SingularMatrix` if `lhs` is not positive definite. There is no partial
/// result on failure.
pub fn solve(lhs: ArrayView2<f64>, rhs: ArrayView2<f64>) -> Result<Array2<f64>> {
    Cholesky::factor(lhs)?.solve(rhs)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};

    use super::*;

    fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
        (a - b).iter().fold(0., |acc, v| acc.max(v.abs()))
    }

    #[test]
    fn factor_reconstructs_matrix() {
        let a = array![[4., 12., -16.], [12., 37., -43.], [-16., -43., 98.]];
        let chol = Cholesky::factor(a.view()).unwrap();

        let l = chol.factor_l();
        assert_eq!(l, array![[2., 0., 0.], [6., 1., 0.], [-8., 5., 3.]]);
        assert!(max_abs_diff(&l.dot(&l.t()), &a) < 1e-12);
    }

    #[test]
    fn solves_multiple_right_hand_sides() {
        let a = array![[4., 1., 0.], [1., 3., 1.], [0., 1., 2.]];
        let expected = array![[1., -2.], [0.5, 1.], [-1., 3.]];
        let b = a.dot(&expected);

        let x = solve(a.view(), b.view()).unwrap();
        assert_eq!(x.dim(), (3, 2));
        assert!(max_abs_diff(&x, &expected) < 1e-12);
    }

    #[test]
    fn identity_rhs_gives_inverse() {
        let a = array![[2., 1.], [1., 2.]];
        let inv = solve(a.view(), Array2::eye(2).view()).unwrap();

        assert!(max_abs_diff(&a.dot(&inv), &Array2::eye(2)) < 1e-12);
    }

    #[test]
    fn rejects_indefinite_matrix() {
        let a = array![[1., 2.], [2., 1.]];
        assert!(matches!(
            Cholesky::factor(a.view()),
            Err(MlErr::SingularMatrix { dim: 2, pivot: 1 })
        ));
    }

    #[test]
    fn rejects_semidefinite_matrix() {
        let a = array![[1., 1.], [1., 1.]];
        assert!(matches!(
            Cholesky::factor(a.view()),
            Err(MlErr::SingularMatrix { pivot: 1, .. })
        ));
    }

    #[test]
    fn rejects_nan() {
        let a = array![[f64::NAN]];
        assert!(Cholesky::factor(a.view()).is_err());
    }

    #[test]
    fn rejects_non_square_and_wrong_rhs() {
        let a = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            Cholesky::factor(a.view()),
            Err(MlErr::SizeMismatch { .. })
        ));

        let chol = Cholesky::factor(Array2::<f64>::eye(2).view()).unwrap();
        let b = Array2::<f64>::zeros((3, 1));
        assert!(matches!(
            chol.solve(b.view()),
            Err(MlErr::SizeMismatch { got: 3, expected: 2, .. })
        ));
    }

    #[test]
    fn empty_system_is_trivial() {
        let a = Array2::<f64>::zeros((0, 0));
        let b = Array2::<f64>::zeros((0, 4));
        let x = solve(a.view(), b.view()).unwrap();
        assert_eq!(x.dim(), (0, 4));
    }
}
