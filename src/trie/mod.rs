//! Sparse Poseidon tries of fixed arity `2^N` and fixed height `H`.
//!
//! A key addresses a leaf through its low `N * H` bits, read `N` at a time from the most significant digit (which
//! picks the root's child) down. Leaves hold payloads; zero marks an empty leaf and can never be inserted. Empty
//! subtrees are shared: the commitment of an empty subtree of each height is computed once, so an empty trie of any
//! capacity costs `H` hashes.
//!
//! A `Trie` owns no nodes. Every node exists only as a preimage registered in an `InversePoseidonCache`, and the trie
//! itself is nothing more than a root, a height and the empty-subtree commitments. Several tries (e.g. views of past
//! and present roots) can therefore share the same caches.
//!
//! Native operations return Merkle paths alongside their results because the circuits do not perform lookups or
//! insertions themselves: they verify a path that the native side found.

use thiserror::Error;
use tracing::{debug, trace};

use crate::field::LurkField;
use crate::hash::{HashArity, HashConstants, InversePoseidonCache, PoseidonCache};

pub mod circuit;
pub mod proof;

pub use proof::{InsertProof, LookupProof};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error<F: LurkField> {
    #[error("no preimage is known for commitment {}", .0.hex_digits())]
    MissingPreimage(F),
    #[error("zero is reserved for empty leaves and cannot be inserted")]
    ReservedValue,
    #[error("a trie of arity {arity} cannot have height {height}")]
    CapacityExceeded { arity: usize, height: usize },
    #[error("unsupported trie arity: {0}")]
    UnsupportedArity(usize),
    #[error("key {} does not fit in a trie of height {height}", .key.hex_digits())]
    KeyOutOfRange { key: F, height: usize },
}

/// Preimages visited by a traversal, root first.
pub type PreimagePath<F, const ARITY: usize> = Vec<[F; ARITY]>;

pub type ChildMap<F> = InversePoseidonCache<F>;

/// A sparse Trie.
#[derive(Debug)]
pub struct Trie<'a, F: LurkField, const ARITY: usize> {
    root: F,
    height: usize,
    empty_roots: Vec<F>,
    hash_cache: &'a PoseidonCache<F>,
    children: &'a ChildMap<F>,
}

const fn arity_bits(arity: usize) -> usize {
    arity.trailing_zeros() as usize
}

fn check_arity<F: LurkField, const ARITY: usize>() -> Result<HashArity, Error<F>> {
    HashArity::from_arity(ARITY).ok_or(Error::UnsupportedArity(ARITY))
}

/// The height at which every element of `F` has its own path.
pub fn full_height<F: LurkField, const ARITY: usize>() -> Result<usize, Error<F>> {
    check_arity::<F, ARITY>()?;
    let arity_bits = arity_bits(ARITY);
    let field_significant_bits = F::NUM_BITS as usize;
    Ok(field_significant_bits / arity_bits + usize::from(field_significant_bits % arity_bits != 0))
}

/// Decomposes `key` into `height` child indices, most significant digit (the root's) first.
///
/// Only the low `height * log2(ARITY)` bits of the key are addressable: a key with any higher bit set has no path.
pub fn key_path<F: LurkField, const ARITY: usize>(
    key: F,
    height: usize,
) -> Result<Vec<usize>, Error<F>> {
    let arity_bits = arity_bits(ARITY);
    let bits_needed = arity_bits * height;
    let bits = key.to_le_bits();

    if bits.iter().skip(bits_needed).any(|bit| *bit) {
        return Err(Error::KeyOutOfRange { key, height });
    }

    let bit = |i: usize| bits.get(i).map(|b| *b).unwrap_or(false);

    let path = (0..height)
        .rev()
        .map(|digit| {
            let start = digit * arity_bits;
            (0..arity_bits).fold(0, |acc, i| acc | (usize::from(bit(start + i)) << i))
        })
        .collect::<Vec<_>>();
    Ok(path)
}

fn compute_hash<F: LurkField, const ARITY: usize>(
    hash_cache: &PoseidonCache<F>,
    preimage: &[F; ARITY],
) -> Result<F, Error<F>> {
    hash_cache
        .hash(preimage)
        .ok_or(Error::UnsupportedArity(ARITY))
}

impl<'a, F: LurkField, const ARITY: usize> Trie<'a, F, ARITY> {
    pub fn root(&self) -> F {
        self.root
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The Poseidon constants this trie hashes with, shared with circuit synthesis.
    pub fn hash_constants(&self) -> &'a HashConstants<F> {
        &self.hash_cache.constants
    }

    /// How many leaves does this `Trie` have? Saturates at `usize::MAX`.
    pub fn leaves(&self) -> usize {
        self.row_size(0)
    }

    /// How many nodes does the `row`th row have? Row 0 holds the leaves, row `height` the root.
    /// Saturates at `usize::MAX`.
    pub fn row_size(&self, row: usize) -> usize {
        debug_assert!(row <= self.height);
        ARITY.saturating_pow(self.height.saturating_sub(row) as u32)
    }

    fn register_hash(&self, preimage: [F; ARITY]) -> Result<F, Error<F>> {
        let hash = compute_hash(self.hash_cache, &preimage)?;

        let registered = self.children.insert(hash, &preimage);
        debug_assert!(registered, "arity {ARITY} hashed but could not be registered");
        Ok(hash)
    }

    fn get_hash_preimage(children: &ChildMap<F>, hash: F) -> Option<[F; ARITY]> {
        children.invert(hash)
    }

    fn init_empty(&mut self) -> Result<(), Error<F>> {
        let mut empty_roots = Vec::with_capacity(self.height);
        let mut preimage = [F::ZERO; ARITY];

        for _ in 0..self.height {
            let hash = self.register_hash(preimage)?;
            empty_roots.push(hash);
            preimage = [hash; ARITY];
        }

        self.empty_roots = empty_roots;
        self.root = self.empty_root();
        debug!(
            arity = ARITY,
            height = self.height,
            "initialized empty trie {}",
            self.root.hex_digits()
        );
        Ok(())
    }

    /// The commitment of the trie with no entries. Independent of any insertion.
    pub fn empty_root(&self) -> F {
        self.empty_roots[self.height - 1]
    }

    /// Creates a new `Trie`, saving preimage data in `children`.
    /// The height is exactly the minimum required for every element of `F` to have a unique path.
    pub fn new(hash_cache: &'a PoseidonCache<F>, children: &'a ChildMap<F>) -> Result<Self, Error<F>> {
        let height = full_height::<F, ARITY>()?;
        Self::new_aux(hash_cache, children, height)
    }

    /// Creates a new `Trie`, saving preimage data in `children`.
    /// The height is the minimum required to store `size` elements.
    pub fn new_with_capacity(
        hash_cache: &'a PoseidonCache<F>,
        children: &'a ChildMap<F>,
        size: usize,
    ) -> Result<Self, Error<F>> {
        check_arity::<F, ARITY>()?;

        let mut height = 1;
        let mut capacity = ARITY;
        while capacity < size {
            height += 1;
            capacity = capacity.saturating_mul(ARITY);
        }

        Self::new_with_height(hash_cache, children, height)
    }

    /// Creates a new `Trie` of exactly `height` rows above the leaves, saving preimage data in `children`.
    /// The height must be non-zero and may not exceed the height needed to address every element of `F`.
    pub fn new_with_height(
        hash_cache: &'a PoseidonCache<F>,
        children: &'a ChildMap<F>,
        height: usize,
    ) -> Result<Self, Error<F>> {
        let max_height = full_height::<F, ARITY>()?;
        if height == 0 || height > max_height {
            return Err(Error::CapacityExceeded {
                arity: ARITY,
                height,
            });
        }

        Self::new_aux(hash_cache, children, height)
    }

    fn new_aux(
        hash_cache: &'a PoseidonCache<F>,
        children: &'a ChildMap<F>,
        height: usize,
    ) -> Result<Self, Error<F>> {
        let mut new = Self {
            root: F::ZERO,
            empty_roots: Vec::new(),
            height,
            hash_cache,
            children,
        };

        new.init_empty()?;

        Ok(new)
    }

    /// Reopens this `Trie` at a known `root`, e.g. one returned by an earlier insertion.
    pub fn with_root(mut self, root: F) -> Self {
        self.root = root;
        self
    }

    /// Moves this `Trie` back to `root`, discarding later insertions from its view.
    pub(crate) fn reset_root(&mut self, root: F) {
        self.root = root;
    }

    fn path(&self, key: F) -> Result<Vec<usize>, Error<F>> {
        key_path::<F, ARITY>(key, self.height)
    }

    // Returns the value associated with `key`, if any.
    // We could alternately return `F::ZERO` for missing values, but instead return an `Option` to more clearly
    // signal intent -- since the encoding of 'missing' values as zero is significant.
    pub fn lookup(&self, key: F) -> Result<Option<F>, Error<F>> {
        self.lookup_aux(key)
            .map(|payload| (payload != F::ZERO).then_some(payload))
    }

    fn lookup_aux(&self, key: F) -> Result<F, Error<F>> {
        let path = self.path(key)?;
        let proof = Self::prove_lookup_aux(self.root, self.children, &path)?;

        Ok(proof.payload_at(&path))
    }

    /// Returns a slice of preimages, corresponding to the path.
    /// Final preimage contains payloads.
    pub fn prove_lookup(&self, key: F) -> Result<LookupProof<F, ARITY>, Error<F>> {
        let path = self.path(key)?;
        Self::prove_lookup_aux(self.root, self.children, &path)
    }

    /// Walks `path` down from `root`, collecting the preimage of every node visited.
    fn prove_lookup_aux(
        root: F,
        children: &ChildMap<F>,
        path: &[usize],
    ) -> Result<LookupProof<F, ARITY>, Error<F>> {
        let mut preimages = Vec::with_capacity(path.len());

        path.iter().try_fold(root, |next, k| {
            if let Some(preimage) = Self::get_hash_preimage(children, next) {
                trace!("descending through {} at {k}", next.hex_digits());
                preimages.push(preimage);
                Ok(preimage[*k])
            } else {
                Err(Error::MissingPreimage(next))
            }
        })?;

        Ok(LookupProof::new(preimages))
    }

    /// Inserts `value` at `key`, returning `true` iff the trie changed.
    pub fn insert(&mut self, key: F, value: F) -> Result<bool, Error<F>> {
        let (_insert_proof, inserted) = self.prove_insert(key, value)?;

        Ok(inserted)
    }

    pub fn prove_insert(
        &mut self,
        key: F,
        value: F,
    ) -> Result<(InsertProof<F, ARITY>, bool), Error<F>> {
        if value == F::ZERO {
            return Err(Error::ReservedValue);
        }
        let path = self.path(key)?;
        self.prove_insert_aux(&path, value)
    }

    fn prove_insert_aux(
        &mut self,
        path: &[usize],
        value: F,
    ) -> Result<(InsertProof<F, ARITY>, bool), Error<F>> {
        let old_proof = Self::prove_lookup_aux(self.root, self.children, path)?;

        if old_proof.payload_at(path) == value {
            debug!("value already present, trie unchanged");
            let new_proof = old_proof.clone();
            return Ok((InsertProof::new(old_proof, new_proof), false));
        }

        let mut new_value = value;
        let mut proof = Vec::with_capacity(path.len());
        for (path_index, existing_preimage) in path.iter().zip(old_proof.preimage_path()).rev() {
            let mut new_preimage = *existing_preimage;
            new_preimage[*path_index] = new_value;
            new_value = self.register_hash(new_preimage)?;
            proof.push(new_preimage);
        }

        proof.reverse();

        self.root = new_value;
        debug!("inserted, new root {}", self.root.hex_digits());

        let new_proof = LookupProof::new(proof);

        Ok((InsertProof::new(old_proof, new_proof), true))
    }
}
