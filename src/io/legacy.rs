//! Loader for the original Java Gaussian LDA dump.
//!
//! The trainer writes one `<k>.txt` file per table into the model
//! directory, appending a block of D+1 lines per training iteration: one
//! whitespace-separated mean line followed by the D rows of the Cholesky
//! factor. A shared `topic_counts.txt` appends K counts (one per line) per
//! iteration. Embeddings and vocabulary are not stored with the model and
//! are supplied as the same files used for training: a newline-separated
//! vocabulary and a whitespace-separated embedding file whose first line
//! fixes the dimensionality and is otherwise unused.
//!
//! The dump stores neither α nor κ₀, so they are taken from
//! [`LegacyOptions`] or fall back to the trainer defaults (α = 1/K,
//! κ₀ = 0.1). Half-log-determinants are not stored either and are derived
//! from the Cholesky diagonal as ln|L| = Σᵢ ln Lᵢᵢ.
//!
//! Ragged files (a trailing partial iteration, or different iteration
//! counts across tables) are an accepted accuracy risk of this format:
//! they are reported through `log::warn!` and loading proceeds with the
//! best available iteration per table.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::model::GaussianLda;
use crate::params::TableParams;
use crate::prior::NiwPrior;

/// Shared per-iteration table counts filename.
pub const TOPIC_COUNTS_FILE: &str = "topic_counts.txt";

/// Options for the legacy loader.
#[derive(Debug, Clone)]
pub struct LegacyOptions {
    /// Dirichlet concentration α; defaults to 1/K, the trainer's default.
    pub alpha: Option<f64>,
    /// Prior pseudo-count κ₀; defaults to 0.1, the trainer's default.
    pub kappa: Option<f64>,
    /// Stored training iteration to load; −1 selects the most recent.
    pub iteration: i64,
}

impl Default for LegacyOptions {
    fn default() -> Self {
        Self {
            alpha: None,
            kappa: None,
            iteration: -1,
        }
    }
}

/// Load a model from a legacy dump directory plus its external embedding
/// and vocabulary files.
pub fn load(
    model_dir: impl AsRef<Path>,
    embeddings_path: impl AsRef<Path>,
    vocab_path: impl AsRef<Path>,
    options: &LegacyOptions,
) -> Result<GaussianLda> {
    let model_dir = model_dir.as_ref();
    let embeddings_path = embeddings_path.as_ref();
    let vocab_path = vocab_path.as_ref();

    let vocab = read_vocab(vocab_path)?;
    let embeddings = read_embeddings(embeddings_path, vocab.len())?;
    let dim = embeddings.ncols();

    let table_files = find_table_files(model_dir)?;
    let num_tables = table_files.len();

    let mut means = Vec::with_capacity(num_tables);
    let mut cholesky = Vec::with_capacity(num_tables);
    let mut half_log_dets = Vec::with_capacity(num_tables);
    let mut stored_iterations: Option<usize> = None;

    for (table, path) in &table_files {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let lines: Vec<&str> = text.lines().collect();

        // Each stored iteration occupies D+1 lines: the mean, then the
        // D rows of the Cholesky factor.
        let block = dim + 1;
        let blocks = lines.len() / block;
        if lines.len() % block != 0 {
            warn!(
                "{}: not an exact number of stored iterations ({blocks} complete, {} extra lines)",
                path.display(),
                lines.len() % block
            );
        }
        if blocks == 0 {
            return Err(Error::ShapeMismatch {
                name: "table_params",
                expected: format!("at least {block} lines (one stored iteration)"),
                actual: format!("{} lines in {}", lines.len(), path.display()),
            });
        }
        if let Some(previous) = stored_iterations {
            if previous != blocks {
                warn!(
                    "different numbers of stored iterations across tables: {blocks} != {previous}"
                );
            }
        }
        stored_iterations = Some(blocks);

        let requested = if options.iteration < 0 {
            blocks - 1
        } else {
            options.iteration as usize
        };
        let chosen = if requested >= blocks {
            warn!(
                "{}: iteration {requested} not stored; using last available ({})",
                path.display(),
                blocks - 1
            );
            blocks - 1
        } else {
            requested
        };
        let start = chosen * block;

        let mean_values = parse_floats(lines[start], path)?;
        if mean_values.len() != dim {
            return Err(Error::ShapeMismatch {
                name: "table_means",
                expected: format!("{dim}-value mean"),
                actual: format!("{} values for table {table}", mean_values.len()),
            });
        }
        means.push(DVector::from_column_slice(&mean_values));

        let mut chol = DMatrix::<f64>::zeros(dim, dim);
        for i in 0..dim {
            let row_values = parse_floats(lines[start + 1 + i], path)?;
            if row_values.len() != dim {
                return Err(Error::ShapeMismatch {
                    name: "table_cholesky",
                    expected: format!("{dim} values per row"),
                    actual: format!("{} values in row {i} for table {table}", row_values.len()),
                });
            }
            for (j, &value) in row_values.iter().enumerate() {
                chol[(i, j)] = value;
            }
        }
        half_log_dets.push(half_log_det(&chol, *table)?);
        cholesky.push(chol);
    }

    let counts = read_counts(model_dir, num_tables, options.iteration)?;

    let alpha = options.alpha.unwrap_or(1.0 / num_tables as f64);
    let kappa = options.kappa.unwrap_or(0.1);

    let prior = NiwPrior::from_embeddings(&embeddings, kappa)?;
    let tables = TableParams::new(&prior, counts, means, cholesky, half_log_dets)?;

    debug!(
        "loaded legacy model from {}: K={num_tables}, D={dim}, V={}",
        model_dir.display(),
        vocab.len()
    );
    GaussianLda::new(vocab, embeddings, prior, tables, alpha)
}

fn read_vocab(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let vocab: Vec<String> = text.lines().map(str::to_owned).collect();
    if vocab.is_empty() {
        return Err(Error::ShapeMismatch {
            name: "vocab",
            expected: "at least one vocabulary entry".into(),
            actual: format!("empty file {}", path.display()),
        });
    }
    Ok(vocab)
}

/// Read the whitespace-separated embedding file. The first line only fixes
/// the dimensionality; rows fill from the second line onward, and rows the
/// file does not provide stay zero.
fn read_embeddings(path: &Path, vocab_size: usize) -> Result<DMatrix<f64>> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut lines = text.lines();
    let first = lines.next().ok_or_else(|| Error::Parse {
        path: path.to_path_buf(),
        message: "empty embedding file".into(),
    })?;
    let dim = first.split_whitespace().count();
    if dim == 0 {
        return Err(Error::Parse {
            path: path.to_path_buf(),
            message: "first line holds no values to fix the dimensionality".into(),
        });
    }

    let mut embeddings = DMatrix::<f64>::zeros(vocab_size, dim);
    for (row, line) in lines.enumerate() {
        if row >= vocab_size {
            return Err(Error::ShapeMismatch {
                name: "vocab_embeddings",
                expected: format!("at most {vocab_size} embedding rows"),
                actual: format!("more rows in {}", path.display()),
            });
        }
        let values = parse_floats(line, path)?;
        if values.len() != dim {
            return Err(Error::ShapeMismatch {
                name: "vocab_embeddings",
                expected: format!("{dim} values per row"),
                actual: format!("{} values in row {row}", values.len()),
            });
        }
        for (col, &value) in values.iter().enumerate() {
            embeddings[(row, col)] = value;
        }
    }
    Ok(embeddings)
}

/// Find `<k>.txt` files and return them sorted by table id. Ids must be
/// dense in 0..K since they index the parameter arrays.
fn find_table_files(model_dir: &Path) -> Result<Vec<(usize, PathBuf)>> {
    let entries = fs::read_dir(model_dir).map_err(|e| Error::io(model_dir, e))?;
    let mut table_files: Vec<(usize, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(model_dir, e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(stem) = name.strip_suffix(".txt") {
            if !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(id) = stem.parse::<usize>() {
                    table_files.push((id, entry.path()));
                }
            }
        }
    }
    if table_files.is_empty() {
        return Err(Error::ShapeMismatch {
            name: "table_params",
            expected: "at least one <k>.txt table file".into(),
            actual: format!("none found in {}", model_dir.display()),
        });
    }
    table_files.sort_by_key(|(id, _)| *id);
    for (index, (id, _)) in table_files.iter().enumerate() {
        if *id != index {
            return Err(Error::ShapeMismatch {
                name: "table_params",
                expected: format!("table files numbered 0..{}", table_files.len()),
                actual: format!("table id {id} at position {index}"),
            });
        }
    }
    Ok(table_files)
}

fn read_counts(model_dir: &Path, num_tables: usize, iteration: i64) -> Result<Vec<f64>> {
    let path = model_dir.join(TOPIC_COUNTS_FILE);
    let text = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
    let lines: Vec<&str> = text.lines().collect();

    let range = if iteration < 0 {
        if lines.len() < num_tables {
            return Err(Error::ShapeMismatch {
                name: "topic_counts",
                expected: format!("at least {num_tables} count lines"),
                actual: format!("{} lines", lines.len()),
            });
        }
        lines.len() - num_tables..lines.len()
    } else {
        let start = iteration as usize * num_tables;
        let end = start + num_tables;
        if end > lines.len() {
            return Err(Error::ShapeMismatch {
                name: "topic_counts",
                expected: format!("{end} count lines for iteration {iteration}"),
                actual: format!("{} lines", lines.len()),
            });
        }
        start..end
    };

    lines[range]
        .iter()
        .map(|line| {
            line.trim().parse::<f64>().map_err(|_| Error::Parse {
                path: path.clone(),
                message: format!("invalid count {:?}", line.trim()),
            })
        })
        .collect()
}

fn half_log_det(chol: &DMatrix<f64>, table: usize) -> Result<f64> {
    let mut sum = 0.0;
    for i in 0..chol.nrows() {
        let diag = chol[(i, i)];
        if !(diag > 0.0) {
            return Err(Error::NumericalError(format!(
                "non-positive Cholesky diagonal {diag} for table {table}; \
                 stored factor is degenerate"
            )));
        }
        sum += diag.ln();
    }
    Ok(sum)
}

fn parse_floats(line: &str, path: &Path) -> Result<Vec<f64>> {
    line.split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| Error::Parse {
                path: path.to_path_buf(),
                message: format!("invalid float {token:?}"),
            })
        })
        .collect()
}
