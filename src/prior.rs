//! Normal-inverse-Wishart prior over embedding space.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// Global NIW hyperparameters shared by every table.
///
/// κ₀ is the pseudo-count controlling confidence in the prior mean, ν₀ the
/// degrees of freedom controlling confidence in the prior covariance, and
/// μ₀ the prior mean in embedding space. The outer product κ₀·μ₀μ₀ᵀ is
/// cached once at construction since it never changes afterwards.
#[derive(Debug, Clone)]
pub struct NiwPrior {
    /// Prior pseudo-count κ₀.
    pub kappa: f64,
    /// Prior degrees of freedom ν₀.
    pub nu: f64,
    /// Prior mean μ₀ (length D).
    pub mu: DVector<f64>,
    /// Cached κ₀·μ₀μ₀ᵀ (D×D).
    pub kappa_mu_mu_t: DMatrix<f64>,
}

impl NiwPrior {
    /// Create a prior from explicit hyperparameters.
    ///
    /// Requires κ₀ > 0 and ν₀ > D − 1 for the posterior predictive
    /// distribution to be proper.
    pub fn new(kappa: f64, nu: f64, mu: DVector<f64>) -> Result<Self> {
        let dim = mu.len();
        if !(kappa > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "kappa must be positive, got {kappa}"
            )));
        }
        if !(nu > dim as f64 - 1.0) {
            return Err(Error::InvalidArgument(format!(
                "nu must exceed D - 1 = {}, got {nu}",
                dim as f64 - 1.0
            )));
        }
        let kappa_mu_mu_t = (&mu * mu.transpose()) * kappa;
        Ok(Self {
            kappa,
            nu,
            mu,
            kappa_mu_mu_t,
        })
    }

    /// Derive a prior from the vocabulary embeddings.
    ///
    /// μ₀ is the mean embedding and ν₀ = D, the weakest setting that keeps
    /// the predictive distribution proper. This matches how the trainer
    /// initialises its prior, so loaded models evaluate densities under the
    /// same prior they were trained with.
    pub fn from_embeddings(embeddings: &DMatrix<f64>, kappa: f64) -> Result<Self> {
        if embeddings.nrows() == 0 {
            return Err(Error::InvalidArgument(
                "cannot derive a prior from an empty embedding matrix".into(),
            ));
        }
        let mu = embeddings.row_mean().transpose();
        let nu = embeddings.ncols() as f64;
        Self::new(kappa, nu, mu)
    }

    /// Embedding dimensionality D.
    pub fn dim(&self) -> usize {
        self.mu.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_embeddings_uses_mean_and_dim() {
        let embeddings = DMatrix::from_row_slice(2, 2, &[0.0, 2.0, 4.0, 6.0]);
        let prior = NiwPrior::from_embeddings(&embeddings, 0.5).unwrap();

        assert_eq!(prior.dim(), 2);
        assert_eq!(prior.nu, 2.0);
        assert!((prior.mu[0] - 2.0).abs() < 1e-12);
        assert!((prior.mu[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn outer_product_cache_matches_definition() {
        let mu = DVector::from_column_slice(&[1.0, 3.0]);
        let prior = NiwPrior::new(2.0, 3.0, mu).unwrap();

        assert!((prior.kappa_mu_mu_t[(0, 0)] - 2.0).abs() < 1e-12);
        assert!((prior.kappa_mu_mu_t[(0, 1)] - 6.0).abs() < 1e-12);
        assert!((prior.kappa_mu_mu_t[(1, 0)] - 6.0).abs() < 1e-12);
        assert!((prior.kappa_mu_mu_t[(1, 1)] - 18.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_nonpositive_kappa() {
        let mu = DVector::from_column_slice(&[0.0, 0.0]);
        assert!(matches!(
            NiwPrior::new(0.0, 3.0, mu),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_improper_nu() {
        // D = 3 requires nu > 2.
        let mu = DVector::from_column_slice(&[0.0, 0.0, 0.0]);
        assert!(matches!(
            NiwPrior::new(1.0, 2.0, mu),
            Err(Error::InvalidArgument(_))
        ));
    }
}
