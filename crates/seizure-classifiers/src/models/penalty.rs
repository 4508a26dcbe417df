//! Elastic-net penalties fitted as a sequence of ridge problems.
//!
//! The linear learners in linfa only offer an L2 penalty. For
//! `R(w) = (1 - r) / 2 |w|^2 + r |w|_1` every round fits a ridge model on
//! columns scaled by `s_j = sqrt(|w_j| / ((1 - r) |w_j| + r))`, with `w` taken
//! from the previous round, so that the ridge term on the scaled weights
//! equals `R` at the previous solution. A column whose weight collapses keeps
//! a zero scale and stays out of the model.
use ndarray::{Array1, Array2, ArrayView2};

use crate::error::{ModelSelectionError, Result};

pub(crate) const MAX_ROUNDS: usize = 30;

/// Weights below this magnitude are treated as exact zeros.
const ZERO_WEIGHT: f64 = 1e-8;

/// A model fitted on `x * column_scale`.
#[derive(Debug, Clone)]
pub(crate) struct Reweighted<M> {
    pub model: M,
    pub column_scale: Array1<f64>,
}

/// Run reweighted ridge rounds until the column scales move by less than `tol`.
///
/// `fit_ridge` receives the scaled training matrix and returns the fitted
/// model together with its weights in the scaled space. With `l1_ratio == 0`
/// a single unscaled round is run.
pub(crate) fn fit_elastic_net<M, F>(
    x: ArrayView2<f64>,
    l1_ratio: f64,
    tol: f64,
    mut fit_ridge: F,
) -> Result<Reweighted<M>>
where
    F: FnMut(Array2<f64>) -> Result<(M, Array1<f64>)>,
{
    let mut scale = Array1::<f64>::ones(x.ncols());
    let mut last = None;
    for round in 0..MAX_ROUNDS {
        let (model, scaled_coef) = fit_ridge(&x * &scale)?;
        let next = next_scale(&(scaled_coef * &scale), l1_ratio);
        let change = (&next - &scale)
            .iter()
            .fold(0.0f64, |acc, d| acc.max(d.abs()));
        last = Some(Reweighted {
            model,
            column_scale: scale,
        });
        if l1_ratio == 0.0 || change <= tol {
            log::trace!("Elastic-net reweighting settled after {} rounds", round + 1);
            break;
        }
        scale = next;
    }
    last.ok_or_else(|| ModelSelectionError::config("Elastic-net reweighting ran no rounds"))
}

fn next_scale(coef: &Array1<f64>, l1_ratio: f64) -> Array1<f64> {
    coef.mapv(|w| {
        let w = w.abs();
        if w < ZERO_WEIGHT {
            0.0
        } else {
            (w / ((1.0 - l1_ratio) * w + l1_ratio)).sqrt()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_next_scale_limits() {
        let coef = array![4.0, -0.25, 0.0];
        // pure L1: s = sqrt(|w|)
        assert_eq!(next_scale(&coef, 1.0), array![2.0, 0.5, 0.0]);
        // pure L2: every surviving column keeps unit scale
        assert_eq!(next_scale(&coef, 0.0), array![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_ridge_only_runs_once() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let mut calls = 0;
        let fitted = fit_elastic_net(x.view(), 0.0, 1e-6, |scaled| {
            calls += 1;
            assert_eq!(scaled, array![[1.0, 2.0], [3.0, 4.0]]);
            Ok(((), array![0.5, 0.0]))
        })
        .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(fitted.column_scale, array![1.0, 1.0]);
    }

    #[test]
    fn test_collapsed_columns_stay_dropped() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let mut seen = Vec::new();
        let fitted = fit_elastic_net(x.view(), 1.0, 1e-9, |scaled| {
            seen.push(scaled.column(1).to_owned());
            // the first column converges to |w| = 1, the second is never used
            Ok(((), array![1.0, 0.0]))
        })
        .unwrap();
        assert!(seen.len() > 1);
        assert!(seen[1..].iter().all(|col| col.iter().all(|&v| v == 0.0)));
        assert_eq!(fitted.column_scale, array![1.0, 0.0]);
    }
}
