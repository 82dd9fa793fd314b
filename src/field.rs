#![deny(missing_docs)]
//! The finite fields a trie can be keyed and committed over.
//!
//! `LurkField` extends `ff`'s `PrimeField` with the small, explicit conversions the trie needs. Every conversion
//! that can lose information is fallible, so a key or payload is never silently truncated.

use ff::{PrimeField, PrimeFieldBits};
use std::hash::Hash;

/// The fields supported by the trie.
///
/// Besides the `PrimeField` operations, the trie relies on the little-endian bit decomposition of `PrimeFieldBits`
/// to turn keys into paths.
pub trait LurkField: PrimeField + PrimeFieldBits {
    /// The number of bytes in the canonical representation of an element.
    const NUM_BYTES: usize;

    /// Attempts to read a field element from its canonical little-endian bytes.
    fn from_bytes(bs: &[u8]) -> Option<Self> {
        let mut def: Self::Repr = Self::default().to_repr();
        if def.as_ref().len() != bs.len() {
            return None;
        }
        def.as_mut().copy_from_slice(bs);
        Self::from_repr(def).into()
    }

    /// Returns the canonical little-endian bytes of this element.
    fn to_bytes(self) -> Vec<u8> {
        let repr = self.to_repr();
        repr.as_ref().to_vec()
    }

    /// Renders the element as big-endian hex, prefixed with `0x`.
    fn hex_digits(self) -> String {
        let mut s = String::from("0x");
        for b in self.to_bytes().iter().rev() {
            s.push_str(&format!("{b:02x}"));
        }
        s
    }

    /// Returns the element as a `u64`, if it is small enough to be one.
    fn to_u64(&self) -> Option<u64> {
        let repr = self.to_repr();
        let bytes = repr.as_ref();
        if bytes[8..].iter().any(|x| *x != 0) {
            return None;
        }
        let mut byte_array = [0u8; 8];
        byte_array.copy_from_slice(&bytes[0..8]);
        Some(u64::from_le_bytes(byte_array))
    }

    /// Returns the element as a `usize`, if it is small enough to be one.
    fn to_usize(&self) -> Option<usize> {
        self.to_u64().and_then(|x| usize::try_from(x).ok())
    }

    /// Embeds a `u64` into the field. Total, since every supported field is wider than 64 bits.
    fn from_u64(x: u64) -> Self {
        x.into()
    }
}

impl LurkField for pasta_curves::Fp {
    const NUM_BYTES: usize = 32;
}

impl LurkField for pasta_curves::Fq {
    const NUM_BYTES: usize = 32;
}

impl LurkField for halo2curves::bn256::Fr {
    const NUM_BYTES: usize = 32;
}

/// For working around the orphan trait impl rule: field elements don't implement `Hash`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FWrap<F: LurkField>(pub F);

#[allow(clippy::derived_hash_with_manual_eq)]
impl<F: LurkField> Hash for FWrap<F> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_repr().as_ref().hash(state);
    }
}

#[cfg(test)]
impl<F: LurkField> proptest::arbitrary::Arbitrary for FWrap<F> {
    type Parameters = ();
    type Strategy = proptest::strategy::BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        use proptest::prelude::*;
        use rand_core::SeedableRng;

        any::<[u8; 16]>()
            .prop_map(|seed| FWrap(F::random(rand_xorshift::XorShiftRng::from_seed(seed))))
            .no_shrink()
            .boxed()
    }
}
