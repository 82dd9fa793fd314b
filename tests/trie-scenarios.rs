use bellpepper_core::{num::AllocatedNum, test_cs::TestConstraintSystem, ConstraintSystem};
use ff::Field;
use lurk_trie::{
    field::LurkField,
    hash::{InversePoseidonCache, PoseidonCache},
    trie::{circuit::synthesize_insert_path, Error},
    Trie,
};
use pasta_curves::pallas::Scalar as Fr;
use proptest::prelude::*;
use rayon::prelude::*;

fn alloc<CS: ConstraintSystem<Fr>>(cs: &mut CS, name: &str, value: Fr) -> AllocatedNum<Fr> {
    AllocatedNum::alloc_infallible(cs.namespace(|| name), || value)
}

fn fr(n: u64) -> Fr {
    Fr::from_u64(n)
}

#[test]
fn binary_trie_scenario() {
    let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
    let mut t: Trie<'_, Fr, 2> = Trie::new_with_height(&p, &c, 3).unwrap();
    assert_eq!(8, t.leaves());
    let empty = t.root();
    assert_eq!(empty, t.empty_root());

    assert!(t.insert(fr(3), fr(42)).unwrap());
    let root = t.root();
    assert_ne!(empty, root);

    assert_eq!(Some(fr(42)), t.lookup(fr(3)).unwrap());
    assert_eq!(None, t.lookup(fr(5)).unwrap());

    assert!(!t.insert(fr(3), fr(42)).unwrap());
    assert_eq!(root, t.root());

    assert_eq!(Err(Error::ReservedValue), t.insert(fr(3), Fr::ZERO));
    assert_eq!(root, t.root());
}

#[test]
fn capacity_boundary() {
    let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());

    let mut t: Trie<'_, Fr, 4> = Trie::new_with_capacity(&p, &c, 64).unwrap();
    assert_eq!(3, t.height());
    assert!(t.insert(fr(63), fr(1)).unwrap());
    assert_eq!(Some(fr(1)), t.lookup(fr(63)).unwrap());
    assert_eq!(
        Err(Error::KeyOutOfRange {
            key: fr(64),
            height: 3
        }),
        t.insert(fr(64), fr(1))
    );

    let t: Trie<'_, Fr, 4> = Trie::new_with_capacity(&p, &c, 65).unwrap();
    assert_eq!(4, t.height());
    assert_eq!(None, t.lookup(fr(64)).unwrap());
}

#[test]
fn full_height_trie_addresses_every_key() {
    let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
    let mut t: Trie<'_, Fr, 16> = Trie::new(&p, &c).unwrap();
    let big = -Fr::ONE;

    assert!(t.insert(big, fr(5)).unwrap());
    assert!(t.insert(fr(0), fr(6)).unwrap());
    assert_eq!(Some(fr(5)), t.lookup(big).unwrap());
    assert_eq!(Some(fr(6)), t.lookup(fr(0)).unwrap());
    assert_eq!(None, t.lookup(fr(1)).unwrap());
}

#[test]
fn full_height_circuit_matches_native() {
    let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
    let mut t: Trie<'_, Fr, 16> = Trie::new(&p, &c).unwrap();
    // 64 hex digits cover 256 bits, one more than the field has.
    assert_eq!(64, t.height());
    t.insert(fr(0), fr(6)).unwrap();
    let big = -Fr::ONE;

    let mut cs = TestConstraintSystem::<Fr>::new();
    let root = alloc(&mut cs, "root", t.root());
    let key = alloc(&mut cs, "key", big);
    let value = alloc(&mut cs, "value", fr(5));
    let new_root = t
        .synthesize_insert(&mut cs, &p.constants, &root, &key, &value)
        .unwrap();
    assert!(cs.is_satisfied());

    t.insert(big, fr(5)).unwrap();
    assert_eq!(Some(t.root()), new_root.get_value());

    let mut cs = TestConstraintSystem::<Fr>::new();
    let root = alloc(&mut cs, "root", t.root());
    let key = alloc(&mut cs, "key", big);
    let leaf = t.synthesize_lookup(&mut cs, &p.constants, &root, &key).unwrap();
    assert!(cs.is_satisfied());
    assert_eq!(Some(fr(5)), leaf.get_value());
}

#[test]
fn other_fields() {
    use halo2curves::bn256::Fr as Bn;
    use pasta_curves::Fq;

    let (p, c) = (PoseidonCache::<Bn>::default(), InversePoseidonCache::default());
    let mut t: Trie<'_, Bn, 8> = Trie::new_with_height(&p, &c, 2).unwrap();
    assert!(t.insert(Bn::from_u64(9), Bn::from_u64(10)).unwrap());
    assert_eq!(Some(Bn::from_u64(10)), t.lookup(Bn::from_u64(9)).unwrap());

    let (p, c) = (PoseidonCache::<Fq>::default(), InversePoseidonCache::default());
    let mut t: Trie<'_, Fq, 2> = Trie::new_with_height(&p, &c, 4).unwrap();
    assert!(t.insert(Fq::from_u64(9), Fq::from_u64(10)).unwrap());
    assert_eq!(Some(Fq::from_u64(10)), t.lookup(Fq::from_u64(9)).unwrap());
}

#[test]
fn tries_share_caches_across_threads() {
    let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());

    let roots = (0..8u64)
        .into_par_iter()
        .map(|i| {
            let mut t: Trie<'_, Fr, 4> = Trie::new_with_height(&p, &c, 3).unwrap();
            for k in 0..8 {
                t.insert(fr(k * 3), fr(i + k + 1)).unwrap();
            }
            t.root()
        })
        .collect::<Vec<_>>();

    let (p2, c2) = (PoseidonCache::default(), InversePoseidonCache::default());
    for (i, root) in roots.iter().enumerate() {
        let mut t: Trie<'_, Fr, 4> = Trie::new_with_height(&p2, &c2, 3).unwrap();
        for k in 0..8 {
            t.insert(fr(k * 3), fr(i as u64 + k + 1)).unwrap();
        }
        assert_eq!(t.root(), *root);

        // Every concurrently built trie is traversable from the shared caches.
        let view: Trie<'_, Fr, 4> = Trie::new_with_height(&p, &c, 3).unwrap().with_root(*root);
        assert_eq!(Some(fr(i as u64 + 1)), view.lookup(fr(0)).unwrap());
    }
}

/// Sets up a binary trie of height 3 holding 6 -> 7 and returns the witness for inserting at key 1.
fn insertion_witness<'a>(
    p: &'a PoseidonCache<Fr>,
    c: &'a InversePoseidonCache<Fr>,
) -> (Trie<'a, Fr, 2>, Vec<[Fr; 2]>) {
    let mut t: Trie<'_, Fr, 2> = Trie::new_with_height(p, c, 3).unwrap();
    t.insert(fr(6), fr(7)).unwrap();
    let witness = t.prove_lookup(fr(1)).unwrap().preimage_path().to_vec();
    (t, witness)
}

fn synthesize_insert(
    p: &PoseidonCache<Fr>,
    root: Fr,
    key: Fr,
    value: Fr,
    witness: &[[Fr; 2]],
) -> (TestConstraintSystem<Fr>, Option<Fr>) {
    let mut cs = TestConstraintSystem::<Fr>::new();
    let root = alloc(&mut cs, "root", root);
    let key = alloc(&mut cs, "key", key);
    let value = alloc(&mut cs, "value", value);
    let new_root =
        synthesize_insert_path(&mut cs, &p.constants, &root, &key, &value, 3, Some(witness))
            .unwrap();
    (cs, new_root.get_value())
}

#[test]
fn circuit_accepts_honest_insertion() {
    let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
    let (mut t, witness) = insertion_witness(&p, &c);

    let (cs, new_root) = synthesize_insert(&p, t.root(), fr(1), fr(9), &witness);
    assert!(cs.is_satisfied());

    t.insert(fr(1), fr(9)).unwrap();
    assert_eq!(Some(t.root()), new_root);
}

#[test]
fn circuit_rejects_wrong_root() {
    let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
    let (t, witness) = insertion_witness(&p, &c);

    let (cs, _) = synthesize_insert(&p, t.empty_root(), fr(1), fr(9), &witness);
    assert!(!cs.is_satisfied());
}

#[test]
fn circuit_rejects_zero_value() {
    let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
    let (t, witness) = insertion_witness(&p, &c);

    let (cs, _) = synthesize_insert(&p, t.root(), fr(1), Fr::ZERO, &witness);
    assert!(!cs.is_satisfied());
}

#[test]
fn circuit_rejects_tampered_sibling() {
    let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
    let (t, mut witness) = insertion_witness(&p, &c);

    // Key 1 has path [0, 0, 1]: the sibling at the middle level is child 1.
    witness[1][1] = fr(1234);
    let (cs, _) = synthesize_insert(&p, t.root(), fr(1), fr(9), &witness);
    assert!(!cs.is_satisfied());
}

#[test]
fn circuit_rejects_mismatched_key() {
    let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
    let (t, witness) = insertion_witness(&p, &c);

    // Key 4 has path [1, 0, 0], the digits of key 1 read in the other order.
    let (cs, _) = synthesize_insert(&p, t.root(), fr(4), fr(9), &witness);
    assert!(!cs.is_satisfied());
}

#[test]
fn circuit_rejects_out_of_range_key() {
    let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
    let (t, witness) = insertion_witness(&p, &c);

    // 9 agrees with 1 on the three addressable bits.
    let (cs, _) = synthesize_insert(&p, t.root(), fr(9), fr(9), &witness);
    assert!(!cs.is_satisfied());
}

proptest! {
    #[test]
    fn prop_round_trip(key in 0u64..256, value in 1u64..) {
        let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
        let mut t: Trie<'_, Fr, 4> = Trie::new_with_height(&p, &c, 4).unwrap();

        prop_assert!(t.insert(fr(key), fr(value)).unwrap());
        prop_assert_eq!(Some(fr(value)), t.lookup(fr(key)).unwrap());
    }

    #[test]
    fn prop_absence(entries in prop::collection::btree_map(0u64..64, 1u64..1000, 0..8), probe in 0u64..64) {
        let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
        let mut t: Trie<'_, Fr, 2> = Trie::new_with_height(&p, &c, 6).unwrap();
        for (k, v) in &entries {
            t.insert(fr(*k), fr(*v)).unwrap();
        }

        let expected = entries.get(&probe).map(|v| fr(*v));
        prop_assert_eq!(expected, t.lookup(fr(probe)).unwrap());
    }

    #[test]
    fn prop_idempotence(key in 0u64..512, value in 1u64..) {
        let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
        let mut t: Trie<'_, Fr, 8> = Trie::new_with_height(&p, &c, 3).unwrap();
        t.insert(fr(key), fr(value)).unwrap();
        let root = t.root();

        prop_assert!(!t.insert(fr(key), fr(value)).unwrap());
        prop_assert_eq!(root, t.root());
    }

    #[test]
    fn prop_proof_consistency(
        entries in prop::collection::vec((0u64..256, 1u64..1000), 1..6),
        probe in 0u64..256,
    ) {
        let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
        let mut t: Trie<'_, Fr, 16> = Trie::new_with_height(&p, &c, 2).unwrap();
        let fresh = PoseidonCache::<Fr>::default();

        for (k, v) in &entries {
            let old_root = t.root();
            let old_value = t.lookup(fr(*k)).unwrap();
            let (proof, _) = t.prove_insert(fr(*k), fr(*v)).unwrap();
            prop_assert!(proof.verify(old_root, t.root(), fr(*k), old_value, fr(*v), &fresh));
        }

        let value = t.lookup(fr(probe)).unwrap().unwrap_or(Fr::ZERO);
        let proof = t.prove_lookup(fr(probe)).unwrap();
        prop_assert!(proof.verify(t.root(), fr(probe), value, &fresh));
        prop_assert!(!proof.verify(t.root(), fr(probe), value + Fr::ONE, &fresh));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_synthesis_matches_native(entries in prop::collection::vec((0u64..64, 1u64..1000), 1..4)) {
        let (p, c) = (PoseidonCache::default(), InversePoseidonCache::default());
        let mut t: Trie<'_, Fr, 8> = Trie::new_with_height(&p, &c, 2).unwrap();

        for (k, v) in &entries {
            let mut cs = TestConstraintSystem::<Fr>::new();
            let root = alloc(&mut cs, "root", t.root());
            let key = alloc(&mut cs, "key", fr(*k));
            let value = alloc(&mut cs, "value", fr(*v));
            let new_root = t
                .synthesize_insert(&mut cs, &p.constants, &root, &key, &value)
                .unwrap();

            t.insert(fr(*k), fr(*v)).unwrap();
            prop_assert!(cs.is_satisfied());
            prop_assert_eq!(Some(t.root()), new_root.get_value());

            let mut cs = TestConstraintSystem::<Fr>::new();
            let root = alloc(&mut cs, "root", t.root());
            let key = alloc(&mut cs, "key", fr(*k));
            let leaf = t.synthesize_lookup(&mut cs, &p.constants, &root, &key).unwrap();
            prop_assert!(cs.is_satisfied());
            prop_assert_eq!(Some(fr(*v)), leaf.get_value());
        }
    }
}
