//! Per-table posterior parameters and the Student-t density evaluators.
//!
//! Each table carries the posterior of a Normal-inverse-Wishart model over
//! embedding space: a customer count, a posterior mean, the lower-triangular
//! Cholesky factor L of the posterior covariance, and the half-log-determinant
//! ½·ln|Σ| = ln|L|. Integrating out the covariance gives a multivariate
//! Student-t posterior predictive density, evaluated here through a scaled
//! triangular solve:
//!
//! ```text
//! d = x − μₜ
//! L' = scaleₜ · Lₜ
//! L' z = d            (forward substitution, O(D²))
//! val = ‖z‖²
//! ```
//!
//! so the Mahalanobis term never requires forming or inverting the full
//! covariance (which would be O(D³) per table).
//!
//! The per-table `scale` and `dof` caches are computed once at construction.
//! This encodes a deliberate modelling approximation: during a document's
//! sampling sweep the global table statistics are treated as frozen, as if
//! the document contributed nothing to them. The document's contribution is
//! assumed negligible against the training corpus, and preserving this
//! behaviour keeps output distributions identical to the reference trainer.

use nalgebra::{DMatrix, DVector};
use statrs::function::gamma::ln_gamma;

use crate::error::{Error, Result};
use crate::prior::NiwPrior;

/// Posterior parameters for the K tables, frozen at load time.
#[derive(Debug, Clone)]
pub struct TableParams {
    dim: usize,
    /// Customers observed at each table during training (nₜ).
    counts: Vec<f64>,
    /// Posterior mean per table (μₜ, length D).
    means: Vec<DVector<f64>>,
    /// Lower-triangular Cholesky factor of the posterior covariance (Lₜ).
    cholesky: Vec<DMatrix<f64>>,
    /// ½·ln|Σₜ| = ln|Lₜ| per table.
    half_log_det: Vec<f64>,
    /// Cached √((kₙ+1)/(kₙ(νₙ−D+1))) per table.
    scale: Vec<f64>,
    /// Cached Student-t degrees of freedom ν₀+nₜ−D+1 per table.
    dof: Vec<f64>,
}

impl TableParams {
    /// Assemble the table set and precompute the per-table caches.
    ///
    /// All arrays must have K entries with trailing dimension D taken from
    /// the prior; anything else is a [`Error::ShapeMismatch`]. Every table
    /// must satisfy νₙ − D + 1 > 0, otherwise its predictive distribution
    /// is undefined and construction fails.
    pub fn new(
        prior: &NiwPrior,
        counts: Vec<f64>,
        means: Vec<DVector<f64>>,
        cholesky: Vec<DMatrix<f64>>,
        half_log_det: Vec<f64>,
    ) -> Result<Self> {
        let num_tables = counts.len();
        let dim = prior.dim();
        if num_tables == 0 {
            return Err(Error::InvalidArgument(
                "a model must have at least one table".into(),
            ));
        }
        if means.len() != num_tables {
            return Err(Error::ShapeMismatch {
                name: "table_means",
                expected: format!("{num_tables} tables"),
                actual: format!("{} tables", means.len()),
            });
        }
        if cholesky.len() != num_tables {
            return Err(Error::ShapeMismatch {
                name: "table_cholesky",
                expected: format!("{num_tables} tables"),
                actual: format!("{} tables", cholesky.len()),
            });
        }
        if half_log_det.len() != num_tables {
            return Err(Error::ShapeMismatch {
                name: "log_determinants",
                expected: format!("{num_tables} tables"),
                actual: format!("{} tables", half_log_det.len()),
            });
        }
        for (table, mean) in means.iter().enumerate() {
            if mean.len() != dim {
                return Err(Error::ShapeMismatch {
                    name: "table_means",
                    expected: format!("length {dim}"),
                    actual: format!("length {} for table {table}", mean.len()),
                });
            }
        }
        for (table, chol) in cholesky.iter().enumerate() {
            if chol.nrows() != dim || chol.ncols() != dim {
                return Err(Error::ShapeMismatch {
                    name: "table_cholesky",
                    expected: format!("{dim}x{dim}"),
                    actual: format!("{}x{} for table {table}", chol.nrows(), chol.ncols()),
                });
            }
        }
        for (table, &count) in counts.iter().enumerate() {
            if !count.is_finite() || count < 0.0 {
                return Err(Error::InvalidArgument(format!(
                    "table {table}: count must be a non-negative finite value, got {count}"
                )));
            }
        }

        let mut scale = Vec::with_capacity(num_tables);
        let mut dof = Vec::with_capacity(num_tables);
        for (table, &count) in counts.iter().enumerate() {
            let k_n = prior.kappa + count;
            let nu_n = prior.nu + count;
            let table_dof = nu_n - dim as f64 + 1.0;
            if !(table_dof > 0.0) {
                return Err(Error::InvalidArgument(format!(
                    "table {table}: nu_n - D + 1 = {table_dof} must be positive \
                     for a proper predictive distribution"
                )));
            }
            scale.push(((k_n + 1.0) / (k_n * table_dof)).sqrt());
            dof.push(table_dof);
        }

        Ok(Self {
            dim,
            counts,
            means,
            cholesky,
            half_log_det,
            scale,
            dof,
        })
    }

    /// Number of tables K.
    pub fn num_tables(&self) -> usize {
        self.counts.len()
    }

    /// Embedding dimensionality D.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Customer counts per table.
    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    /// Posterior mean of table `table`.
    pub fn mean(&self, table: usize) -> &DVector<f64> {
        &self.means[table]
    }

    /// Cholesky factor of table `table`.
    pub fn cholesky_factor(&self, table: usize) -> &DMatrix<f64> {
        &self.cholesky[table]
    }

    /// Half-log-determinants per table.
    pub fn half_log_dets(&self) -> &[f64] {
        &self.half_log_det
    }

    /// Log posterior-predictive (multivariate Student-t) density of `x`
    /// under table `table`.
    pub fn log_density(&self, x: &DVector<f64>, table: usize) -> Result<f64> {
        self.check_dim(x)?;
        if table >= self.num_tables() {
            return Err(Error::InvalidArgument(format!(
                "table id {table} outside range (K = {})",
                self.num_tables()
            )));
        }
        self.table_log_density(x, table)
    }

    /// Log posterior-predictive density of `x` under every table.
    ///
    /// Produces, for each t, the same value as [`log_density`](Self::log_density)
    /// computed independently; the solves are batched but never approximated.
    pub fn log_density_all(&self, x: &DVector<f64>) -> Result<Vec<f64>> {
        self.check_dim(x)?;
        (0..self.num_tables())
            .map(|table| self.table_log_density(x, table))
            .collect()
    }

    fn check_dim(&self, x: &DVector<f64>) -> Result<()> {
        if x.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: x.len(),
            });
        }
        Ok(())
    }

    fn table_log_density(&self, x: &DVector<f64>, table: usize) -> Result<f64> {
        let nu = self.dof[table];
        let dim = self.dim as f64;

        let centered = x - &self.means[table];
        let scaled_chol = &self.cholesky[table] * self.scale[table];
        let solved = scaled_chol
            .solve_lower_triangular(&centered)
            .ok_or_else(|| {
                Error::NumericalError(format!(
                    "singular Cholesky factor for table {table}; model parameters are degenerate"
                ))
            })?;
        let val = solved.norm_squared();

        Ok(ln_gamma((nu + dim) / 2.0)
            - (ln_gamma(nu / 2.0)
                + dim / 2.0 * (nu.ln() + std::f64::consts::PI.ln())
                + self.half_log_det[table]
                + (nu + dim) / 2.0 * (1.0 + val / nu).ln()))
    }
}
