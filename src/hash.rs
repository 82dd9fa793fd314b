use std::hash::Hash;

use dashmap::DashMap;
use fxhash::FxBuildHasher;
use generic_array::typenum::{U16, U2, U4, U8};
use neptune::{poseidon::PoseidonConstants, Poseidon};
use once_cell::sync::OnceCell;

use crate::field::{FWrap, LurkField};

/// The Poseidon arities a trie node can have. Trie arities must be powers of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashArity {
    A2,
    A4,
    A8,
    A16,
}

impl HashArity {
    /// Returns the `HashArity` for `n` children, if Poseidon is supported at that width.
    pub const fn from_arity(n: usize) -> Option<Self> {
        match n {
            2 => Some(Self::A2),
            4 => Some(Self::A4),
            8 => Some(Self::A8),
            16 => Some(Self::A16),
            _ => None,
        }
    }

    pub const fn arity(self) -> usize {
        match self {
            Self::A2 => 2,
            Self::A4 => 4,
            Self::A8 => 8,
            Self::A16 => 16,
        }
    }
}

pub enum HashConst<'a, F: LurkField> {
    A2(&'a PoseidonConstants<F, U2>),
    A4(&'a PoseidonConstants<F, U4>),
    A8(&'a PoseidonConstants<F, U8>),
    A16(&'a PoseidonConstants<F, U16>),
}

/// Holds the constants needed for poseidon hashing.
#[derive(Clone, Debug)]
pub struct HashConstants<F: LurkField> {
    c2: OnceCell<PoseidonConstants<F, U2>>,
    c4: OnceCell<PoseidonConstants<F, U4>>,
    c8: OnceCell<PoseidonConstants<F, U8>>,
    c16: OnceCell<PoseidonConstants<F, U16>>,
}

impl<F: LurkField> Default for HashConstants<F> {
    fn default() -> Self {
        Self {
            c2: OnceCell::new(),
            c4: OnceCell::new(),
            c8: OnceCell::new(),
            c16: OnceCell::new(),
        }
    }
}

impl<F: LurkField> HashConstants<F> {
    pub fn c2(&self) -> &PoseidonConstants<F, U2> {
        self.c2.get_or_init(|| PoseidonConstants::new())
    }

    pub fn c4(&self) -> &PoseidonConstants<F, U4> {
        self.c4.get_or_init(|| PoseidonConstants::new())
    }

    pub fn c8(&self) -> &PoseidonConstants<F, U8> {
        self.c8.get_or_init(|| PoseidonConstants::new())
    }

    pub fn c16(&self) -> &PoseidonConstants<F, U16> {
        self.c16.get_or_init(|| PoseidonConstants::new())
    }

    pub fn constants(&self, arity: HashArity) -> HashConst<'_, F> {
        match arity {
            HashArity::A2 => HashConst::A2(self.c2()),
            HashArity::A4 => HashConst::A4(self.c4()),
            HashArity::A8 => HashConst::A8(self.c8()),
            HashArity::A16 => HashConst::A16(self.c16()),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
struct CacheKey<F: LurkField, const N: usize>([F; N]);

#[allow(clippy::derived_hash_with_manual_eq)]
impl<F: LurkField, const N: usize> Hash for CacheKey<F, N> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for el in &self.0 {
            el.to_repr().as_ref().hash(state);
        }
    }
}

type ForwardMap<F, const N: usize> = DashMap<CacheKey<F, N>, F, FxBuildHasher>;

/// Memoizes Poseidon hashes of fixed-arity preimages.
///
/// Hashing is a pure function of the preimage, so a cache can be shared freely: concurrent evaluations of the same
/// preimage race to write the same digest.
/// The permutation runs outside the shard lock: racing writers of one preimage store the same digest.
fn memoized<F: LurkField, const N: usize>(
    map: &ForwardMap<F, N>,
    preimage: &[F; N],
    hash: impl FnOnce() -> F,
) -> F {
    if let Some(digest) = map.get(&CacheKey(*preimage)) {
        return *digest;
    }
    let digest = hash();
    map.insert(CacheKey(*preimage), digest);
    digest
}

#[derive(Clone, Default, Debug)]
pub struct PoseidonCache<F: LurkField> {
    a2: ForwardMap<F, 2>,
    a4: ForwardMap<F, 4>,
    a8: ForwardMap<F, 8>,
    a16: ForwardMap<F, 16>,

    pub constants: HashConstants<F>,
}

impl<F: LurkField> PoseidonCache<F> {
    pub fn hash2(&self, preimage: &[F; 2]) -> F {
        memoized(&self.a2, preimage, || {
            Poseidon::new_with_preimage(preimage, self.constants.c2()).hash()
        })
    }

    pub fn hash4(&self, preimage: &[F; 4]) -> F {
        memoized(&self.a4, preimage, || {
            Poseidon::new_with_preimage(preimage, self.constants.c4()).hash()
        })
    }

    pub fn hash8(&self, preimage: &[F; 8]) -> F {
        memoized(&self.a8, preimage, || {
            Poseidon::new_with_preimage(preimage, self.constants.c8()).hash()
        })
    }

    pub fn hash16(&self, preimage: &[F; 16]) -> F {
        memoized(&self.a16, preimage, || {
            Poseidon::new_with_preimage(preimage, self.constants.c16()).hash()
        })
    }

    /// Hashes a preimage of any supported arity. Returns `None` iff `ARITY` is not a supported Poseidon width.
    pub fn hash<const ARITY: usize>(&self, preimage: &[F; ARITY]) -> Option<F> {
        macro_rules! hash {
            ($hash_name:ident) => {
                Some(self.$hash_name(preimage.as_slice().try_into().ok()?))
            };
        }
        match HashArity::from_arity(ARITY)? {
            HashArity::A2 => hash!(hash2),
            HashArity::A4 => hash!(hash4),
            HashArity::A8 => hash!(hash8),
            HashArity::A16 => hash!(hash16),
        }
    }

    /// The number of memoized preimages, over all arities.
    pub fn len(&self) -> usize {
        self.a2.len() + self.a4.len() + self.a8.len() + self.a16.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type InverseMap<F, const N: usize> = DashMap<FWrap<F>, [F; N], FxBuildHasher>;

/// Maps Poseidon digests back to the preimages that produced them.
///
/// Only preimages explicitly registered are known: a digest absent from this cache is opaque, and traversing through
/// it is impossible.
#[derive(Clone, Default, Debug)]
pub struct InversePoseidonCache<F: LurkField> {
    a2: InverseMap<F, 2>,
    a4: InverseMap<F, 4>,
    a8: InverseMap<F, 8>,
    a16: InverseMap<F, 16>,
}

impl<F: LurkField> InversePoseidonCache<F> {
    /// Records that `digest` is the hash of `preimage`. Registering the same mapping twice is harmless.
    /// Returns `false` iff `ARITY` is not a supported Poseidon width.
    pub fn insert<const ARITY: usize>(&self, digest: F, preimage: &[F; ARITY]) -> bool {
        macro_rules! insert {
            ($map:ident) => {
                match preimage.as_slice().try_into() {
                    Ok(preimage) => {
                        self.$map.insert(FWrap(digest), preimage);
                        true
                    }
                    Err(_) => false,
                }
            };
        }
        match HashArity::from_arity(ARITY) {
            Some(HashArity::A2) => insert!(a2),
            Some(HashArity::A4) => insert!(a4),
            Some(HashArity::A8) => insert!(a8),
            Some(HashArity::A16) => insert!(a16),
            None => false,
        }
    }

    /// Returns the preimage previously registered for `digest`, if any.
    pub fn invert<const ARITY: usize>(&self, digest: F) -> Option<[F; ARITY]> {
        macro_rules! invert {
            ($map:ident) => {
                self.$map
                    .get(&FWrap(digest))
                    .and_then(|preimage| preimage.as_slice().try_into().ok())
            };
        }
        match HashArity::from_arity(ARITY)? {
            HashArity::A2 => invert!(a2),
            HashArity::A4 => invert!(a4),
            HashArity::A8 => invert!(a8),
            HashArity::A16 => invert!(a16),
        }
    }

    pub fn len(&self) -> usize {
        self.a2.len() + self.a4.len() + self.a8.len() + self.a16.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
