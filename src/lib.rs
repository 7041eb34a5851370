//! # gaussian-lda
//!
//! Topic inference for pretrained Gaussian LDA models.
//!
//! Gaussian LDA represents each latent topic ("table") as a
//! Normal-inverse-Wishart posterior over word-embedding space. Given a
//! trained model, this crate assigns every token of a new document to a
//! table by collapsed Gibbs sampling, without updating the pretrained
//! global parameters:
//!
//! - Each table's posterior predictive is a multivariate Student-t density,
//!   evaluated in the log domain through a Cholesky triangular solve
//!   (O(D²) per table, never an explicit inverse).
//! - The per-document sampler retracts and resamples each token's
//!   assignment from a locally renormalised categorical distribution over
//!   tables, smoothed by the Dirichlet concentration α.
//!
//! Global table statistics stay frozen during inference: a document's own
//! tokens are assumed to contribute negligibly against the training corpus.
//! This is a deliberate property of the model, not an approximation this
//! crate is free to tighten.
//!
//! ## Quick start
//!
//! ```ignore
//! use gaussian_lda::io::native;
//!
//! let model = native::load("trained-model/")?;
//! // One assignment in 0..K per token, reproducible for a fixed seed.
//! let topics = model.sample_with_seed(&[3, 17, 42, 17], 20, 7)?;
//! ```
//!
//! Independent documents can be sampled concurrently: `sample` takes
//! `&self` and an explicit random source, so threads share the read-only
//! model without locks and stay independently reproducible.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod model;
mod params;
mod prior;
mod sampler;

pub mod io;

pub use error::{Error, Result};
pub use model::GaussianLda;
pub use params::TableParams;
pub use prior::NiwPrior;
