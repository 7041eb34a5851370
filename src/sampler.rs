//! Per-document collapsed Gibbs sweep.
//!
//! The sampler alternates over token positions in document order. For each
//! position it retracts the token from its current table, scores every table
//! with the document-local prior ln(H[t] + α) plus the table's predictive
//! log density, renormalises in the log domain, and draws a replacement
//! assignment:
//!
//! ```text
//! for each sweep:
//!     for each position i:
//!         H[A[i]] -= 1                              (retract)
//!         p[t] ∝ exp(ln(H[t] + α) + logDensity(xᵢ, t))
//!         A[i] ← draw from p;  H[A[i]] += 1         (commit)
//! ```
//!
//! Positions within one sweep are strictly sequential: each posterior
//! depends on the partially updated histogram, so reordering or
//! parallelising positions would change the sampling semantics. Global
//! table parameters are never written; all mutation is confined to the
//! per-document state.

use nalgebra::DVector;
use rand::Rng;

use crate::error::Result;
use crate::params::TableParams;

/// Ephemeral per-document sampling state: one table assignment per token
/// plus the topic-count histogram over the K tables.
///
/// The histogram update is an explicit two-phase retract/commit pair, so no
/// sentinel "unassigned" value ever appears in the assignment vector. The
/// invariant sum(H) == N holds at every pair boundary (and is N − 1 only
/// between the two phases, while the token being resampled is logically
/// unassigned).
#[derive(Debug)]
pub(crate) struct DocumentState {
    assignments: Vec<usize>,
    histogram: Vec<usize>,
}

impl DocumentState {
    /// Draw a uniform initial assignment for every position and build the
    /// matching histogram (zero-filled for unseen tables).
    pub(crate) fn init<R: Rng>(len: usize, num_tables: usize, rng: &mut R) -> Self {
        let assignments: Vec<usize> = (0..len).map(|_| rng.random_range(0..num_tables)).collect();
        let mut histogram = vec![0usize; num_tables];
        for &table in &assignments {
            histogram[table] += 1;
        }
        Self {
            assignments,
            histogram,
        }
    }

    /// Phase one: remove the token at `pos` from its current table so it
    /// does not bias its own posterior.
    fn retract(&mut self, pos: usize) {
        let old = self.assignments[pos];
        debug_assert!(self.histogram[old] > 0, "histogram underflow at table {old}");
        self.histogram[old] -= 1;
    }

    /// Phase two: commit the freshly sampled table for `pos`.
    fn commit(&mut self, pos: usize, table: usize) {
        self.assignments[pos] = table;
        self.histogram[table] += 1;
        debug_assert_eq!(
            self.histogram.iter().sum::<usize>(),
            self.assignments.len(),
            "histogram must account for every token after a retract/commit pair"
        );
    }

    fn count(&self, table: usize) -> usize {
        self.histogram[table]
    }

    pub(crate) fn into_assignments(self) -> Vec<usize> {
        self.assignments
    }
}

/// Run `num_iterations` full sweeps over the document.
///
/// `token_embeddings` holds one embedding per token position, in document
/// order. The density evaluator is queried once per token per sweep; table
/// parameters stay frozen throughout (the document's own contribution to
/// the global statistics is deliberately ignored).
pub(crate) fn run_sweeps<R: Rng>(
    tables: &TableParams,
    alpha: f64,
    token_embeddings: &[DVector<f64>],
    num_iterations: usize,
    state: &mut DocumentState,
    rng: &mut R,
) -> Result<()> {
    let num_tables = tables.num_tables();
    let mut log_posterior = vec![0.0_f64; num_tables];

    for _ in 0..num_iterations {
        for (pos, x) in token_embeddings.iter().enumerate() {
            state.retract(pos);

            let log_likelihoods = tables.log_density_all(x)?;
            for (table, slot) in log_posterior.iter_mut().enumerate() {
                *slot = (state.count(table) as f64 + alpha).ln() + log_likelihoods[table];
            }

            let table = sample_categorical_log(&log_posterior, rng);
            state.commit(pos, table);
        }
    }
    Ok(())
}

/// Draw an index from unnormalised log weights.
///
/// Subtracts the maximum before exponentiating so the normalisation never
/// overflows, then draws via an inverse-CDF scan over the renormalised
/// weights.
fn sample_categorical_log<R: Rng>(log_weights: &[f64], rng: &mut R) -> usize {
    let max = log_weights
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = log_weights.iter().map(|&w| (w - max).exp()).collect();
    let total: f64 = weights.iter().sum();

    let u: f64 = rng.random::<f64>() * total;
    let mut acc = 0.0;
    for (index, &weight) in weights.iter().enumerate() {
        acc += weight;
        if u < acc {
            return index;
        }
    }
    // Rounding can leave u marginally above the accumulated total.
    weights.len() - 1
}
