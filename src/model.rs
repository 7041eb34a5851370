//! The trained model and its inference surface.

use nalgebra::{DMatrix, DVector};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::error::{Error, Result};
use crate::params::TableParams;
use crate::prior::NiwPrior;
use crate::sampler::{self, DocumentState};

/// A pretrained Gaussian LDA model, loaded for inference on new documents.
///
/// Holds the vocabulary, the shared read-only embedding matrix (one row per
/// vocabulary entry), the NIW prior, the per-table posterior parameters,
/// and the Dirichlet concentration α that smooths the document-local
/// topic histogram.
///
/// All global state is frozen after construction: [`sample`](Self::sample)
/// takes `&self` and mutates only its own per-document state, so concurrent
/// inference calls on separate threads need no locking. Reproducibility
/// comes from the injected random source; there is no hidden global RNG.
#[derive(Debug, Clone)]
pub struct GaussianLda {
    vocab: Vec<String>,
    embeddings: DMatrix<f64>,
    prior: NiwPrior,
    tables: TableParams,
    alpha: f64,
}

impl GaussianLda {
    /// Assemble a model from loaded parts.
    ///
    /// Validates that the embedding matrix is V×D for the vocabulary size V
    /// and the table dimensionality D, and that α is positive and finite.
    pub fn new(
        vocab: Vec<String>,
        embeddings: DMatrix<f64>,
        prior: NiwPrior,
        tables: TableParams,
        alpha: f64,
    ) -> Result<Self> {
        let dim = tables.dim();
        if prior.dim() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: prior.dim(),
            });
        }
        if embeddings.ncols() != dim {
            return Err(Error::ShapeMismatch {
                name: "vocab_embeddings",
                expected: format!("{dim} columns"),
                actual: format!("{} columns", embeddings.ncols()),
            });
        }
        if embeddings.nrows() != vocab.len() {
            return Err(Error::ShapeMismatch {
                name: "vocab_embeddings",
                expected: format!("{} rows (one per vocabulary entry)", vocab.len()),
                actual: format!("{} rows", embeddings.nrows()),
            });
        }
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "alpha must be positive and finite, got {alpha}"
            )));
        }
        Ok(Self {
            vocab,
            embeddings,
            prior,
            tables,
            alpha,
        })
    }

    /// Number of tables K.
    pub fn num_tables(&self) -> usize {
        self.tables.num_tables()
    }

    /// Embedding dimensionality D.
    pub fn embedding_dim(&self) -> usize {
        self.tables.dim()
    }

    /// Vocabulary size V.
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// The vocabulary, indexed by token id.
    pub fn vocab(&self) -> &[String] {
        &self.vocab
    }

    /// The V×D embedding matrix.
    pub fn embeddings(&self) -> &DMatrix<f64> {
        &self.embeddings
    }

    /// The NIW prior shared by every table.
    pub fn prior(&self) -> &NiwPrior {
        &self.prior
    }

    /// The per-table posterior parameters.
    pub fn tables(&self) -> &TableParams {
        &self.tables
    }

    /// Dirichlet concentration α.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Log posterior-predictive density of `x` under table `table`.
    pub fn log_density(&self, x: &DVector<f64>, table: usize) -> Result<f64> {
        self.tables.log_density(x, table)
    }

    /// Log posterior-predictive density of `x` under every table.
    pub fn log_density_all_tables(&self, x: &DVector<f64>) -> Result<Vec<f64>> {
        self.tables.log_density_all(x)
    }

    /// Run `num_iterations` Gibbs sweeps over `document` and return the
    /// final table assignment for every token position.
    ///
    /// Token ids are validated against the vocabulary before any sampling
    /// work begins; an out-of-range id fails fast with
    /// [`Error::InvalidToken`] and no state is touched. `num_iterations`
    /// of zero is valid and returns the initial uniform-random assignment
    /// unchanged. There is no convergence check; the iteration count is
    /// fixed by the caller.
    ///
    /// The random source is an explicit argument so concurrent documents
    /// are independently reproducible: identical seed, document, and
    /// iteration count produce a bit-identical assignment sequence.
    pub fn sample<R: Rng>(
        &self,
        document: &[usize],
        num_iterations: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        for &token in document {
            if token >= self.vocab.len() {
                return Err(Error::InvalidToken {
                    token,
                    vocab_size: self.vocab.len(),
                });
            }
        }

        let token_embeddings: Vec<DVector<f64>> = document
            .iter()
            .map(|&token| self.embeddings.row(token).transpose())
            .collect();

        let mut state = DocumentState::init(document.len(), self.num_tables(), rng);
        sampler::run_sweeps(
            &self.tables,
            self.alpha,
            &token_embeddings,
            num_iterations,
            &mut state,
            rng,
        )?;
        Ok(state.into_assignments())
    }

    /// Deterministic convenience wrapper over [`sample`](Self::sample),
    /// seeding a `Xoshiro256PlusPlus` from `seed`.
    pub fn sample_with_seed(
        &self,
        document: &[usize],
        num_iterations: usize,
        seed: u64,
    ) -> Result<Vec<usize>> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        self.sample(document, num_iterations, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_model() -> GaussianLda {
        let embeddings = DMatrix::from_row_slice(3, 2, &[0.1, 0.0, 0.0, 0.1, 0.2, 0.2]);
        let prior = NiwPrior::from_embeddings(&embeddings, 0.1).unwrap();
        let identity = DMatrix::<f64>::identity(2, 2);
        let tables = TableParams::new(
            &prior,
            vec![5.0, 5.0],
            vec![
                DVector::from_column_slice(&[0.0, 0.0]),
                DVector::from_column_slice(&[1.0, 1.0]),
            ],
            vec![identity.clone(), identity],
            vec![0.0, 0.0],
        )
        .unwrap();
        GaussianLda::new(
            vec!["a".into(), "b".into(), "c".into()],
            embeddings,
            prior,
            tables,
            0.5,
        )
        .unwrap()
    }

    #[test]
    fn out_of_vocabulary_token_fails_fast() {
        let model = tiny_model();
        let result = model.sample_with_seed(&[0, 1, 3], 4, 1);
        assert!(matches!(
            result,
            Err(Error::InvalidToken {
                token: 3,
                vocab_size: 3
            })
        ));
    }

    #[test]
    fn rejects_embedding_vocab_mismatch() {
        let embeddings = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 1.0]);
        let prior = NiwPrior::from_embeddings(&embeddings, 0.1).unwrap();
        let tables = TableParams::new(
            &prior,
            vec![1.0],
            vec![DVector::from_column_slice(&[0.0, 0.0])],
            vec![DMatrix::<f64>::identity(2, 2)],
            vec![0.0],
        )
        .unwrap();
        // Three vocab entries but only two embedding rows.
        let result = GaussianLda::new(
            vec!["a".into(), "b".into(), "c".into()],
            embeddings,
            prior,
            tables,
            0.5,
        );
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn density_surface_delegates_consistently() {
        let model = tiny_model();
        let x = DVector::from_column_slice(&[0.3, -0.2]);

        let all = model.log_density_all_tables(&x).unwrap();
        assert_eq!(all.len(), 2);
        for table in 0..2 {
            let single = model.log_density(&x, table).unwrap();
            assert!((all[table] - single).abs() < 1e-9);
        }
    }
}
