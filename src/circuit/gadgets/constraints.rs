// Initially taken from: rust-fil-proofs/storage-proofs-core/src/gadgets/

use bellpepper_core::{
    boolean::{AllocatedBit, Boolean},
    num::AllocatedNum,
    ConstraintSystem, SynthesisError,
};
use ff::PrimeField;

use crate::field::LurkField;

/// Adds a constraint to CS, enforcing an equality relationship between the allocated numbers a and b.
///
/// a == b
pub fn equal<F: PrimeField, A, AR, CS: ConstraintSystem<F>>(
    cs: &mut CS,
    annotation: A,
    a: &AllocatedNum<F>,
    b: &AllocatedNum<F>,
) where
    A: FnOnce() -> AR,
    AR: Into<String>,
{
    // a * 1 = b
    cs.enforce(
        annotation,
        |lc| lc + a.get_variable(),
        |lc| lc + CS::one(),
        |lc| lc + b.get_variable(),
    );
}

/// Selects one of `from` by the little-endian `path_bits`. `from` must have exactly `2^path_bits.len()` elements.
pub fn select<F: PrimeField, CS: ConstraintSystem<F>>(
    mut cs: CS,
    from: &[AllocatedNum<F>],
    path_bits: &[Boolean],
) -> Result<AllocatedNum<F>, SynthesisError> {
    let pathlen = path_bits.len();
    if from.len() != 1 << pathlen {
        return Err(SynthesisError::Unsatisfiable);
    }

    let mut state = from.to_vec();
    let mut half_size = from.len() / 2;

    // We reverse the path bits because the contained algorithm consumes most significant bit first.
    for (i, bit) in path_bits.iter().rev().enumerate() {
        let mut new_state = Vec::with_capacity(half_size);
        for j in 0..half_size {
            new_state.push(pick(
                cs.namespace(|| format!("pick {i}, {j}")),
                bit,
                &state[half_size + j],
                &state[j],
            )?);
        }
        state = new_state;
        half_size /= 2;
    }

    Ok(state.remove(0))
}

/// Takes two allocated numbers (`a`, `b`) and returns `a` if the condition is true, and `b` otherwise.
pub fn pick<F: PrimeField, CS: ConstraintSystem<F>>(
    mut cs: CS,
    condition: &Boolean,
    a: &AllocatedNum<F>,
    b: &AllocatedNum<F>,
) -> Result<AllocatedNum<F>, SynthesisError>
where
    CS: ConstraintSystem<F>,
{
    let c = AllocatedNum::alloc(cs.namespace(|| "pick result"), || {
        if condition
            .get_value()
            .ok_or(SynthesisError::AssignmentMissing)?
        {
            Ok(a.get_value().ok_or(SynthesisError::AssignmentMissing)?)
        } else {
            Ok(b.get_value().ok_or(SynthesisError::AssignmentMissing)?)
        }
    })?;

    // Constrain (b - a) * condition = (b - c), ensuring c = a iff
    // condition is true, otherwise c = b.
    cs.enforce(
        || "pick",
        |lc| lc + b.get_variable() - a.get_variable(),
        |_| condition.lc(CS::one(), F::ONE),
        |lc| lc + b.get_variable() - c.get_variable(),
    );

    Ok(c)
}

/// Enforces `num != 0` by exhibiting its inverse.
pub fn enforce_nonzero<F: PrimeField, CS: ConstraintSystem<F>>(
    mut cs: CS,
    num: &AllocatedNum<F>,
) -> Result<(), SynthesisError> {
    // Zero has no inverse: allocate zero and let the constraint fail.
    let inverse = AllocatedNum::alloc(cs.namespace(|| "inverse"), || {
        let value = num.get_value().ok_or(SynthesisError::AssignmentMissing)?;
        Ok(Option::from(value.invert()).unwrap_or(F::ZERO))
    })?;

    // num * inverse = 1
    cs.enforce(
        || "num is nonzero",
        |lc| lc + num.get_variable(),
        |lc| lc + inverse.get_variable(),
        |lc| lc + CS::one(),
    );
    Ok(())
}

/// Decomposes `num` into `n` little-endian bits.
///
/// When `n` is narrower than the field, the packing constraint also proves `num < 2^n`. Otherwise the decomposition
/// is the strict (canonical) one, padded with constant zeros.
pub fn alloc_num_bits_le<F: LurkField, CS: ConstraintSystem<F>>(
    mut cs: CS,
    num: &AllocatedNum<F>,
    n: usize,
) -> Result<Vec<Boolean>, SynthesisError> {
    if n >= F::NUM_BITS as usize {
        let mut bits = num.to_bits_le_strict(cs.namespace(|| "strict bits"))?;
        bits.resize(n, Boolean::Constant(false));
        return Ok(bits);
    }

    let values: Option<Vec<bool>> = num.get_value().map(|v| {
        let bits = v.to_le_bits();
        (0..n).map(|i| bits[i]).collect()
    });

    let bits = (0..n)
        .map(|i| {
            AllocatedBit::alloc(
                cs.namespace(|| format!("bit {i}")),
                values.as_ref().map(|v| v[i]),
            )
            .map(Boolean::from)
        })
        .collect::<Result<Vec<_>, _>>()?;

    cs.enforce(
        || "pack bits",
        |mut lc| {
            let mut coeff = F::ONE;
            for bit in &bits {
                lc = lc + &bit.lc(CS::one(), coeff);
                coeff = coeff.double();
            }
            lc
        },
        |lc| lc + CS::one(),
        |lc| lc + num.get_variable(),
    );

    Ok(bits)
}

/// Returns `2^bits.len()` booleans, exactly one of them true: the one indexed by the little-endian `bits`.
pub fn digit_selectors<F: PrimeField, CS: ConstraintSystem<F>>(
    mut cs: CS,
    bits: &[Boolean],
) -> Result<Vec<Boolean>, SynthesisError> {
    let mut selectors = vec![Boolean::Constant(true)];

    for (i, bit) in bits.iter().enumerate() {
        let mut unset = Vec::with_capacity(selectors.len());
        let mut set = Vec::with_capacity(selectors.len());
        for (j, selector) in selectors.iter().enumerate() {
            unset.push(Boolean::and(
                cs.namespace(|| format!("bit {i} unset, selector {j}")),
                selector,
                &bit.not(),
            )?);
            set.push(Boolean::and(
                cs.namespace(|| format!("bit {i} set, selector {j}")),
                selector,
                bit,
            )?);
        }
        unset.extend(set);
        selectors = unset;
    }

    Ok(selectors)
}
