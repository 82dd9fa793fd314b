//! Merkle proofs of trie operations.
//!
//! Verification needs nothing but a forward `PoseidonCache`: a verifier never has to know any preimage it was not
//! handed.

use itertools::izip;

use super::{key_path, PreimagePath};
use crate::field::LurkField;
use crate::hash::PoseidonCache;

/// The preimages of every node visited by a lookup, root first. The final preimage holds the payloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupProof<F: LurkField, const ARITY: usize> {
    preimage_path: PreimagePath<F, ARITY>,
}

impl<F: LurkField, const ARITY: usize> LookupProof<F, ARITY> {
    pub(crate) fn new(preimage_path: PreimagePath<F, ARITY>) -> Self {
        Self { preimage_path }
    }

    pub fn preimage_path(&self) -> &[[F; ARITY]] {
        &self.preimage_path
    }

    pub fn height(&self) -> usize {
        self.preimage_path.len()
    }

    pub(crate) fn payload_at(&self, path: &[usize]) -> F {
        match (self.preimage_path.last(), path.last()) {
            (Some(preimage), Some(k)) => preimage[*k],
            _ => F::ZERO,
        }
    }

    /// The leaf payload this proof claims for `key`, zero when empty. `None` if `key` has no path at this height.
    pub fn payload(&self, key: F) -> Option<F> {
        let path = key_path::<F, ARITY>(key, self.height()).ok()?;
        Some(self.payload_at(&path))
    }

    /// Re-hashes the path bottom-up, substituting each computed commitment for the child it replaces.
    /// Returns the root the proof commits to, or `None` if `key` has no path or the arity cannot be hashed.
    pub fn recompute_root(&self, key: F, hash_cache: &PoseidonCache<F>) -> Option<F> {
        let path = key_path::<F, ARITY>(key, self.height()).ok()?;
        let (last, rest) = self.preimage_path.split_last()?;

        let mut next = hash_cache.hash(last)?;
        for (k, preimage) in path.iter().zip(rest).rev() {
            let mut preimage = *preimage;
            preimage[*k] = next;
            next = hash_cache.hash(&preimage)?;
        }
        Some(next)
    }

    /// Verify a `LookupProof`. Note that this verification is exactly what must be proved in the circuit.
    pub fn verify(&self, root: F, key: F, value: F, hash_cache: &PoseidonCache<F>) -> bool {
        self.payload(key) == Some(value) && self.recompute_root(key, hash_cache) == Some(root)
    }
}

/// Proof that an insertion turned one root into another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertProof<F: LurkField, const ARITY: usize> {
    old_proof: LookupProof<F, ARITY>,
    new_proof: LookupProof<F, ARITY>,
}

impl<F: LurkField, const ARITY: usize> InsertProof<F, ARITY> {
    pub(crate) fn new(old_proof: LookupProof<F, ARITY>, new_proof: LookupProof<F, ARITY>) -> Self {
        Self {
            old_proof,
            new_proof,
        }
    }

    pub fn old_proof(&self) -> &LookupProof<F, ARITY> {
        &self.old_proof
    }

    pub fn new_proof(&self) -> &LookupProof<F, ARITY> {
        &self.new_proof
    }

    /// Verify an `InsertProof`. Note that this verification is exactly what must be proved in the circuit.
    ///
    /// Besides both lookups verifying, every level's siblings must be untouched: only the child on the key's path
    /// may change.
    pub fn verify(
        &self,
        old_root: F,
        new_root: F,
        key: F,
        old_value: Option<F>,
        new_value: F,
        hash_cache: &PoseidonCache<F>,
    ) -> bool {
        if new_value == F::ZERO || self.old_proof.height() != self.new_proof.height() {
            return false;
        }
        let Ok(path) = key_path::<F, ARITY>(key, self.old_proof.height()) else {
            return false;
        };

        let old_verified =
            self.old_proof
                .verify(old_root, key, old_value.unwrap_or(F::ZERO), hash_cache);
        let new_verified = self.new_proof.verify(new_root, key, new_value, hash_cache);

        let siblings_unchanged = izip!(
            &path,
            &self.old_proof.preimage_path,
            &self.new_proof.preimage_path
        )
        .all(|(k, old, new)| {
            old.iter()
                .zip(new)
                .enumerate()
                .all(|(i, (a, b))| i == *k || a == b)
        });

        old_verified && new_verified && siblings_unchanged
    }
}
