//! Model persistence.
//!
//! Two loaders produce the same in-memory model: [`native`] reads the
//! crate's own dump (structured record + binary array store), and
//! [`legacy`] parses the text files written by the original Java trainer.
//! The density and sampling core never branches on storage format; both
//! paths end in the same [`crate::GaussianLda`] constructor.

pub mod legacy;
pub mod native;
