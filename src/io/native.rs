//! Native model persistence.
//!
//! A model directory holds two files: `params.json` with the
//! hyperparameters and vocabulary, and `arrays.bin` with the numeric
//! arrays (bincode of flat row-major buffers plus their dimensions, so a
//! corrupt store can be reported with expected-vs-actual shape detail).
//! A save/load round trip reproduces counts, means, Cholesky factors, and
//! log-determinants exactly.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::GaussianLda;
use crate::params::TableParams;
use crate::prior::NiwPrior;

/// Hyperparameter record filename.
pub const PARAMS_FILE: &str = "params.json";

/// Array store filename.
pub const ARRAYS_FILE: &str = "arrays.bin";

#[derive(Serialize, Deserialize)]
struct HyperParams {
    vocab: Vec<String>,
    num_tables: usize,
    alpha: f64,
    kappa: f64,
}

/// Flat row-major array dump. Dimensions are stored explicitly so load can
/// validate every buffer length before any matrix is built.
#[derive(Serialize, Deserialize)]
struct ArrayStore {
    num_tables: usize,
    dim: usize,
    vocab_size: usize,
    table_counts: Vec<f64>,
    table_means: Vec<f64>,
    log_determinants: Vec<f64>,
    table_cholesky: Vec<f64>,
    vocab_embeddings: Vec<f64>,
}

/// Write `model` to `dir`, creating the directory if needed.
pub fn save(model: &GaussianLda, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let num_tables = model.num_tables();
    let dim = model.embedding_dim();
    let vocab_size = model.vocab_size();
    let tables = model.tables();

    let mut table_means = Vec::with_capacity(num_tables * dim);
    for table in 0..num_tables {
        table_means.extend(tables.mean(table).iter().copied());
    }
    let mut table_cholesky = Vec::with_capacity(num_tables * dim * dim);
    for table in 0..num_tables {
        let chol = tables.cholesky_factor(table);
        for i in 0..dim {
            for j in 0..dim {
                table_cholesky.push(chol[(i, j)]);
            }
        }
    }
    let embeddings = model.embeddings();
    let mut vocab_embeddings = Vec::with_capacity(vocab_size * dim);
    for row in 0..vocab_size {
        for col in 0..dim {
            vocab_embeddings.push(embeddings[(row, col)]);
        }
    }

    let params = HyperParams {
        vocab: model.vocab().to_vec(),
        num_tables,
        alpha: model.alpha(),
        kappa: model.prior().kappa,
    };
    let store = ArrayStore {
        num_tables,
        dim,
        vocab_size,
        table_counts: tables.counts().to_vec(),
        table_means,
        log_determinants: tables.half_log_dets().to_vec(),
        table_cholesky,
        vocab_embeddings,
    };

    let params_path = dir.join(PARAMS_FILE);
    let params_file = File::create(&params_path).map_err(|e| Error::io(&params_path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(params_file), &params)?;

    let arrays_path = dir.join(ARRAYS_FILE);
    let arrays_file = File::create(&arrays_path).map_err(|e| Error::io(&arrays_path, e))?;
    bincode::serialize_into(BufWriter::new(arrays_file), &store)?;

    Ok(())
}

/// Load a model from a directory written by [`save`].
pub fn load(dir: impl AsRef<Path>) -> Result<GaussianLda> {
    let dir = dir.as_ref();

    let params_path = dir.join(PARAMS_FILE);
    let params_file = File::open(&params_path).map_err(|e| Error::io(&params_path, e))?;
    let params: HyperParams = serde_json::from_reader(BufReader::new(params_file))?;

    let arrays_path = dir.join(ARRAYS_FILE);
    let arrays_file = File::open(&arrays_path).map_err(|e| Error::io(&arrays_path, e))?;
    let store: ArrayStore = bincode::deserialize_from(BufReader::new(arrays_file))?;

    let num_tables = store.num_tables;
    let dim = store.dim;
    let vocab_size = store.vocab_size;

    if params.num_tables != num_tables {
        return Err(Error::ShapeMismatch {
            name: "num_tables",
            expected: format!("{} (from {PARAMS_FILE})", params.num_tables),
            actual: format!("{num_tables} (from {ARRAYS_FILE})"),
        });
    }
    if params.vocab.len() != vocab_size {
        return Err(Error::ShapeMismatch {
            name: "vocab",
            expected: format!("{vocab_size} entries (from {ARRAYS_FILE})"),
            actual: format!("{} entries (from {PARAMS_FILE})", params.vocab.len()),
        });
    }
    check_len("table_counts", &store.table_counts, num_tables)?;
    check_len("table_means", &store.table_means, num_tables * dim)?;
    check_len("log_determinants", &store.log_determinants, num_tables)?;
    check_len("table_cholesky", &store.table_cholesky, num_tables * dim * dim)?;
    check_len("vocab_embeddings", &store.vocab_embeddings, vocab_size * dim)?;

    let embeddings = DMatrix::from_row_slice(vocab_size, dim, &store.vocab_embeddings);
    let prior = NiwPrior::from_embeddings(&embeddings, params.kappa)?;

    let means: Vec<DVector<f64>> = store
        .table_means
        .chunks_exact(dim)
        .map(DVector::from_column_slice)
        .collect();
    let cholesky: Vec<DMatrix<f64>> = store
        .table_cholesky
        .chunks_exact(dim * dim)
        .map(|chunk| DMatrix::from_row_slice(dim, dim, chunk))
        .collect();

    let tables = TableParams::new(
        &prior,
        store.table_counts,
        means,
        cholesky,
        store.log_determinants,
    )?;

    debug!(
        "loaded native model from {}: K={num_tables}, D={dim}, V={vocab_size}",
        dir.display()
    );
    GaussianLda::new(params.vocab, embeddings, prior, tables, params.alpha)
}

fn check_len(name: &'static str, buffer: &[f64], expected: usize) -> Result<()> {
    if buffer.len() != expected {
        return Err(Error::ShapeMismatch {
            name,
            expected: format!("{expected} values"),
            actual: format!("{} values", buffer.len()),
        });
    }
    Ok(())
}
