//! Packaging trie insertions for a folding backend.
//!
//! An `InsertProver` turns a run of insertions into `InsertStep`s, each a `StepCircuit` whose public state is the
//! trie root. Running the steps through a folding scheme is left to the caller; `dry_run` checks a run against a
//! test constraint system instead.

pub mod nova;

use ::nova::traits::circuit::StepCircuit;
use bellpepper_core::{num::AllocatedNum, test_cs::TestConstraintSystem, ConstraintSystem, SynthesisError};
use tracing::info;

use crate::{config::trie_config, error::ProofError, field::LurkField, trie::Trie};

pub use self::nova::{InsertSlot, InsertStep};

/// Builds insertion steps of a fixed batch size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertProver {
    batch_size: usize,
}

impl Default for InsertProver {
    /// A prover batching as many insertions per step as configured.
    fn default() -> Self {
        Self::new(trie_config(None, None).batch_size)
    }
}

impl InsertProver {
    /// A zero batch size is treated as one.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Performs `insertions` on `trie`, returning the steps proving them.
    pub fn steps<F: LurkField, const ARITY: usize>(
        &self,
        trie: &mut Trie<'_, F, ARITY>,
        insertions: &[(F, F)],
    ) -> Result<Vec<InsertStep<F, ARITY>>, ProofError<F>> {
        InsertStep::from_insertions(trie, insertions, self.batch_size)
    }

    /// Synthesizes every step in sequence starting from root `z0`, checking each constraint system is satisfied.
    /// Returns the final root.
    pub fn dry_run<F: LurkField, const ARITY: usize>(
        &self,
        steps: &[InsertStep<F, ARITY>],
        z0: F,
    ) -> Result<F, ProofError<F>> {
        let mut z = z0;
        for (i, step) in steps.iter().enumerate() {
            let mut cs = TestConstraintSystem::<F>::new();
            let root = AllocatedNum::alloc_infallible(cs.namespace(|| "z0"), || z);
            let out = step.synthesize(&mut cs, &[root])?;

            if let Some(unsatisfied) = cs.which_is_unsatisfied() {
                return Err(ProofError::Unsatisfied(format!("step {i}: {unsatisfied}")));
            }
            z = out
                .first()
                .and_then(AllocatedNum::get_value)
                .ok_or(SynthesisError::AssignmentMissing)?;
        }
        info!("dry run of {} steps succeeded", steps.len());

        Ok(z)
    }
}
