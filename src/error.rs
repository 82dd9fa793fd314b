use bellpepper_core::SynthesisError;
use thiserror::Error;

use crate::field::LurkField;
use crate::trie;

#[derive(Error, Debug)]
pub enum ProofError<F: LurkField> {
    #[error("Trie error: {0}")]
    Trie(#[from] trie::Error<F>),
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),
    #[error("Unsatisfied constraint: {0}")]
    Unsatisfied(String),
}
