//! Circuits proving trie lookups and insertions.
//!
//! A lookup circuit allocates every preimage on the key's path, proves that each hashes to the child its parent
//! selects (the first hashing to the claimed root) and exposes the selected leaf. An insertion additionally rebuilds
//! the path bottom-up with the new value in place of the old leaf, keeping every sibling, and exposes the new root.

use bellpepper_core::{boolean::Boolean, num::AllocatedNum, ConstraintSystem, SynthesisError};
use tracing::warn;

use super::{arity_bits, full_height, key_path, Trie};
use crate::circuit::gadgets::constraints::{
    alloc_num_bits_le, digit_selectors, enforce_nonzero, equal, pick, select,
};
use crate::field::LurkField;
use crate::hash::{HashArity, HashConstants};

/// The allocated preimages on a key's path, root first, with the key digit selecting a child at each level.
pub struct AllocatedPath<F: LurkField> {
    pub preimages: Vec<Vec<AllocatedNum<F>>>,
    pub digits: Vec<Vec<Boolean>>,
    pub leaf: AllocatedNum<F>,
}

/// Proves that `key` leads from `root` to some leaf through `height` levels. `preimage_path` supplies the witness,
/// root first; it may be `None` when only the constraint shape is needed.
pub fn synthesize_lookup_path<F: LurkField, CS: ConstraintSystem<F>, const ARITY: usize>(
    cs: &mut CS,
    hash_constants: &HashConstants<F>,
    root: &AllocatedNum<F>,
    key: &AllocatedNum<F>,
    height: usize,
    preimage_path: Option<&[[F; ARITY]]>,
) -> Result<AllocatedPath<F>, SynthesisError> {
    let arity = HashArity::from_arity(ARITY).ok_or(SynthesisError::Unsatisfiable)?;
    let max_height = full_height::<F, ARITY>().map_err(|_| SynthesisError::Unsatisfiable)?;
    if height == 0 || height > max_height {
        return Err(SynthesisError::Unsatisfiable);
    }
    if preimage_path.is_some_and(|path| path.len() != height) {
        return Err(SynthesisError::Unsatisfiable);
    }

    let arity_bits = arity_bits(ARITY);
    let bits = alloc_num_bits_le(cs.namespace(|| "key bits"), key, height * arity_bits)?;
    let digits = (0..height)
        .map(|level| {
            let start = (height - 1 - level) * arity_bits;
            bits[start..start + arity_bits].to_vec()
        })
        .collect::<Vec<_>>();

    let constants = hash_constants.constants(arity);

    let mut preimages = Vec::with_capacity(height);
    let mut next = root.clone();
    for (level, digit) in digits.iter().enumerate() {
        let preimage = (0..ARITY)
            .map(|i| {
                AllocatedNum::alloc(cs.namespace(|| format!("level {level} child {i}")), || {
                    preimage_path
                        .map(|path| path[level][i])
                        .ok_or(SynthesisError::AssignmentMissing)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let commitment = constants.hash(
            &mut cs.namespace(|| format!("level {level} hash")),
            preimage.clone(),
        )?;
        equal(
            cs,
            || format!("level {level} commitment matches"),
            &commitment,
            &next,
        );

        next = select(
            cs.namespace(|| format!("level {level} select")),
            &preimage,
            digit,
        )?;
        preimages.push(preimage);
    }

    Ok(AllocatedPath {
        preimages,
        digits,
        leaf: next,
    })
}

/// Proves the insertion of `value` at `key` into the trie committed to by `root`, returning the new root.
pub fn synthesize_insert_path<F: LurkField, CS: ConstraintSystem<F>, const ARITY: usize>(
    cs: &mut CS,
    hash_constants: &HashConstants<F>,
    root: &AllocatedNum<F>,
    key: &AllocatedNum<F>,
    value: &AllocatedNum<F>,
    height: usize,
    preimage_path: Option<&[[F; ARITY]]>,
) -> Result<AllocatedNum<F>, SynthesisError> {
    let arity = HashArity::from_arity(ARITY).ok_or(SynthesisError::Unsatisfiable)?;
    let path = synthesize_lookup_path(
        &mut cs.namespace(|| "old path"),
        hash_constants,
        root,
        key,
        height,
        preimage_path,
    )?;

    enforce_nonzero(cs.namespace(|| "value is nonzero"), value)?;

    let constants = hash_constants.constants(arity);
    let mut new_child = value.clone();
    for (level, (preimage, digit)) in path.preimages.iter().zip(&path.digits).enumerate().rev() {
        let selectors = digit_selectors(cs.namespace(|| format!("level {level} selectors")), digit)?;
        let new_preimage = preimage
            .iter()
            .zip(&selectors)
            .enumerate()
            .map(|(i, (sibling, selector))| {
                pick(
                    cs.namespace(|| format!("level {level} new child {i}")),
                    selector,
                    &new_child,
                    sibling,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        new_child = constants.hash(
            &mut cs.namespace(|| format!("level {level} new hash")),
            new_preimage,
        )?;
    }

    Ok(new_child)
}

impl<'a, F: LurkField, const ARITY: usize> Trie<'a, F, ARITY> {
    /// Finds the witness for a path under the *claimed* root, without touching the caches.
    fn witness_path(
        &self,
        root: &AllocatedNum<F>,
        key: &AllocatedNum<F>,
    ) -> Result<Option<Vec<[F; ARITY]>>, SynthesisError> {
        let (Some(root), Some(key)) = (root.get_value(), key.get_value()) else {
            return Ok(None);
        };

        let path = key_path::<F, ARITY>(key, self.height).map_err(|e| {
            warn!("no witness path: {e}");
            SynthesisError::AssignmentMissing
        })?;
        let proof = Self::prove_lookup_aux(root, self.children, &path).map_err(|e| {
            warn!("no witness path: {e}");
            SynthesisError::AssignmentMissing
        })?;

        Ok(Some(proof.preimage_path().to_vec()))
    }

    /// Synthesizes the insertion of `value` at `key` under `root`, returning the allocated new root.
    #[tracing::instrument(skip_all)]
    pub fn synthesize_insert<CS: ConstraintSystem<F>>(
        &self,
        cs: &mut CS,
        hash_constants: &HashConstants<F>,
        root: &AllocatedNum<F>,
        key: &AllocatedNum<F>,
        value: &AllocatedNum<F>,
    ) -> Result<AllocatedNum<F>, SynthesisError> {
        let witness = self.witness_path(root, key)?;

        synthesize_insert_path(
            cs,
            hash_constants,
            root,
            key,
            value,
            self.height,
            witness.as_deref(),
        )
    }

    /// Synthesizes a lookup of `key` under `root`, returning the allocated payload (zero when empty).
    #[tracing::instrument(skip_all)]
    pub fn synthesize_lookup<CS: ConstraintSystem<F>>(
        &self,
        cs: &mut CS,
        hash_constants: &HashConstants<F>,
        root: &AllocatedNum<F>,
        key: &AllocatedNum<F>,
    ) -> Result<AllocatedNum<F>, SynthesisError> {
        let witness = self.witness_path(root, key)?;

        let path = synthesize_lookup_path(
            cs,
            hash_constants,
            root,
            key,
            self.height,
            witness.as_deref(),
        )?;
        Ok(path.leaf)
    }
}
