use std::time::Instant;

use anyhow::Result;
use lurk_trie::{
    field::LurkField,
    hash::{InversePoseidonCache, PoseidonCache},
    proof::InsertProver,
    Trie,
};
use pasta_curves::pallas::Scalar as Fr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};
use tracing_texray::TeXRayLayer;

/// Run the example in this file with
/// `cargo run --release --example trie_ivc <n>`
/// where `n` is the number of insertions to prove
fn main() -> Result<()> {
    let subscriber = Registry::default()
        .with(fmt::layer().pretty())
        .with(EnvFilter::from_default_env())
        .with(TeXRayLayer::new());
    tracing::subscriber::set_global_default(subscriber)?;

    let args = std::env::args().collect::<Vec<_>>();
    let n: u64 = args.get(1).map(|n| n.parse()).transpose()?.unwrap_or(10);

    let (hashes, preimages) = (PoseidonCache::default(), InversePoseidonCache::default());
    let mut trie: Trie<'_, Fr, 8> = Trie::new_with_capacity(&hashes, &preimages, 1 << 12)?;
    let z0 = trie.root();

    // Squares of the first `n` integers, keyed by their index.
    let insertions = (1..=n)
        .map(|i| (Fr::from_u64(i), Fr::from_u64(i * i)))
        .collect::<Vec<_>>();

    let prover = InsertProver::default();
    println!(
        "Packing {n} insertions into steps of {}...",
        prover.batch_size()
    );
    let steps = prover.steps(&mut trie, &insertions)?;

    println!("Checking {} steps...", steps.len());
    let start = Instant::now();
    let zi = tracing_texray::examine(tracing::info_span!("dry run"))
        .in_scope(|| prover.dry_run(&steps, z0))?;
    println!("Dry run took {:?}", start.elapsed());

    assert_eq!(trie.root(), zi);
    println!("Final root: {}", zi.hex_digits());
    Ok(())
}
