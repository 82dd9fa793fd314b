use bellpepper_core::{num::AllocatedNum, ConstraintSystem, SynthesisError};

use neptune::circuit2::poseidon_hash_allocated as poseidon_hash;
use neptune::circuit2_witness::poseidon_hash_allocated_witness;

use crate::field::LurkField;
use crate::hash::HashConst;

impl<'a, F: LurkField> HashConst<'a, F> {
    pub fn arity(&self) -> usize {
        match self {
            HashConst::A2(_) => 2,
            HashConst::A4(_) => 4,
            HashConst::A8(_) => 8,
            HashConst::A16(_) => 16,
        }
    }

    /// Hashes `preimage` in circuit. The preimage must have exactly as many elements as the constants' arity.
    pub fn hash<CS: ConstraintSystem<F>>(
        &self,
        cs: &mut CS,
        preimage: Vec<AllocatedNum<F>>,
    ) -> Result<AllocatedNum<F>, SynthesisError> {
        if preimage.len() != self.arity() {
            return Err(SynthesisError::Unsatisfiable);
        }

        macro_rules! hash {
            ($c:ident) => {
                if cs.is_witness_generator() {
                    poseidon_hash_allocated_witness(cs, &preimage, $c)
                } else {
                    poseidon_hash(cs, preimage, $c)
                }
            };
        }
        match self {
            HashConst::A2(c) => hash!(c),
            HashConst::A4(c) => hash!(c),
            HashConst::A8(c) => hash!(c),
            HashConst::A16(c) => hash!(c),
        }
    }
}
