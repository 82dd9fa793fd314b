use std::sync::Arc;

use bellpepper_core::{
    boolean::{AllocatedBit, Boolean},
    num::AllocatedNum,
    ConstraintSystem, SynthesisError,
};
use nova::traits::circuit::StepCircuit;
use tracing::{debug, warn};

use crate::{
    circuit::gadgets::constraints::pick,
    error::ProofError,
    field::LurkField,
    hash::HashConstants,
    trie::{circuit::synthesize_insert_path, key_path, Error as TrieError, Trie},
};

/// One insertion proved by an `InsertStep`. Every field is `None` in a blank step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertSlot<F: LurkField, const ARITY: usize> {
    pub key: Option<F>,
    pub value: Option<F>,
    /// The key's path under the root the slot starts from, root first.
    pub preimage_path: Option<Vec<[F; ARITY]>>,
    /// Inactive slots pad a step: the root passes through unchanged.
    pub active: Option<bool>,
}

impl<F: LurkField, const ARITY: usize> InsertSlot<F, ARITY> {
    fn blank() -> Self {
        Self {
            key: None,
            value: None,
            preimage_path: None,
            active: None,
        }
    }

    fn padding(trie: &Trie<'_, F, ARITY>) -> Result<Self, ProofError<F>> {
        let proof = trie.prove_lookup(F::ZERO)?;
        Ok(Self {
            key: Some(F::ZERO),
            value: Some(F::ONE),
            preimage_path: Some(proof.preimage_path().to_vec()),
            active: Some(false),
        })
    }
}

/// A folding step applying a fixed number of insertions. Its only public state is the trie root.
#[derive(Clone, Debug)]
pub struct InsertStep<F: LurkField, const ARITY: usize> {
    height: usize,
    slots: Vec<InsertSlot<F, ARITY>>,
    hash_constants: Arc<HashConstants<F>>,
    old_root: Option<F>,
    new_root: Option<F>,
}

impl<F: LurkField, const ARITY: usize> InsertStep<F, ARITY> {
    /// A step with the shape, but none of the witness, of `batch_size` insertions into a trie of `height`.
    pub fn blank(height: usize, batch_size: usize, hash_constants: Arc<HashConstants<F>>) -> Self {
        Self {
            height,
            slots: vec![InsertSlot::blank(); batch_size],
            hash_constants,
            old_root: None,
            new_root: None,
        }
    }

    /// Performs `insertions` on `trie`, packing them `batch_size` at a time into steps. The last step is padded
    /// with inactive slots.
    ///
    /// On error the trie is left at the root it started from.
    #[tracing::instrument(skip_all, fields(insertions = insertions.len(), batch_size = batch_size))]
    pub fn from_insertions(
        trie: &mut Trie<'_, F, ARITY>,
        insertions: &[(F, F)],
        batch_size: usize,
    ) -> Result<Vec<Self>, ProofError<F>> {
        for (key, value) in insertions {
            if *value == F::ZERO {
                return Err(TrieError::ReservedValue.into());
            }
            key_path::<F, ARITY>(*key, trie.height())?;
        }

        let start = trie.root();
        Self::pack(trie, insertions, batch_size.max(1)).map_err(|e| {
            warn!("packing failed, restoring root {}", start.hex_digits());
            trie.reset_root(start);
            e
        })
    }

    fn pack(
        trie: &mut Trie<'_, F, ARITY>,
        insertions: &[(F, F)],
        batch_size: usize,
    ) -> Result<Vec<Self>, ProofError<F>> {
        let hash_constants = Arc::new(trie.hash_constants().clone());

        let mut steps = Vec::with_capacity(insertions.len().div_ceil(batch_size));
        for chunk in insertions.chunks(batch_size) {
            let old_root = trie.root();
            let mut slots = Vec::with_capacity(batch_size);
            for (key, value) in chunk {
                let (proof, _) = trie.prove_insert(*key, *value)?;
                slots.push(InsertSlot {
                    key: Some(*key),
                    value: Some(*value),
                    preimage_path: Some(proof.old_proof().preimage_path().to_vec()),
                    active: Some(true),
                });
            }
            while slots.len() < batch_size {
                slots.push(InsertSlot::padding(trie)?);
            }

            steps.push(Self {
                height: trie.height(),
                slots,
                hash_constants: hash_constants.clone(),
                old_root: Some(old_root),
                new_root: Some(trie.root()),
            });
        }
        debug!("packed {} steps", steps.len());

        Ok(steps)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn slots(&self) -> &[InsertSlot<F, ARITY>] {
        &self.slots
    }

    /// The root this step starts from, if known.
    pub fn old_root(&self) -> Option<F> {
        self.old_root
    }

    /// The root this step ends at, if known.
    pub fn new_root(&self) -> Option<F> {
        self.new_root
    }
}

impl<F: LurkField, const ARITY: usize> StepCircuit<F> for InsertStep<F, ARITY> {
    fn arity(&self) -> usize {
        1
    }

    #[tracing::instrument(skip_all, name = "<InsertStep as StepCircuit>::synthesize")]
    fn synthesize<CS>(
        &self,
        cs: &mut CS,
        z: &[AllocatedNum<F>],
    ) -> Result<Vec<AllocatedNum<F>>, SynthesisError>
    where
        CS: ConstraintSystem<F>,
    {
        let [root] = z else {
            return Err(SynthesisError::Unsatisfiable);
        };

        let mut root = root.clone();
        for (i, slot) in self.slots.iter().enumerate() {
            let mut cs = cs.namespace(|| format!("slot {i}"));

            let key = AllocatedNum::alloc(cs.namespace(|| "key"), || {
                slot.key.ok_or(SynthesisError::AssignmentMissing)
            })?;
            let value = AllocatedNum::alloc(cs.namespace(|| "value"), || {
                slot.value.ok_or(SynthesisError::AssignmentMissing)
            })?;
            let active = Boolean::from(AllocatedBit::alloc(
                cs.namespace(|| "active"),
                slot.active,
            )?);

            let new_root = synthesize_insert_path(
                &mut cs.namespace(|| "insert"),
                &self.hash_constants,
                &root,
                &key,
                &value,
                self.height,
                slot.preimage_path.as_deref(),
            )?;

            root = pick(cs.namespace(|| "next root"), &active, &new_root, &root)?;
        }

        Ok(vec![root])
    }
}
