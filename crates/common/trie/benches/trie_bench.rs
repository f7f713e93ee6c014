use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

use hasher::HasherKeccak;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use cita_trie::MemoryDB;
use cita_trie::{PatriciaTrie, Trie as CitaTrie};
use gmpt_trie::accelerator::{SoftwareBatchBuilder, TrieKind, derive_sha_batched_parallel};
use gmpt_trie::config::ParallelConfig;
use gmpt_trie::derive_sha::derive_sha;
use gmpt_trie::stack_trie::StackTrie;
use gmpt_trie::{InMemoryTrieDB, Trie};

fn insert_benchmark(c: &mut Criterion) {
    let (keys, values) = black_box(random_data(10_000));

    let mut group = c.benchmark_group("Trie insert random data");
    group.measurement_time(Duration::from_secs(15));

    group.bench_function("gmpt-trie insert 10k", |b| {
        b.iter_batched_ref(
            || Trie::new(Box::new(InMemoryTrieDB::new_empty())),
            |trie| {
                for (key, value) in keys.iter().zip(values.iter()) {
                    trie.insert(key.clone(), value.clone()).unwrap();
                }
                black_box(trie.hash().unwrap());
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("cita-trie insert 10k", |b| {
        b.iter_batched_ref(
            || {
                PatriciaTrie::new(
                    Arc::new(MemoryDB::new(false)),
                    Arc::new(HasherKeccak::new()),
                )
            },
            |trie| {
                for (key, value) in keys.iter().zip(values.iter()) {
                    trie.insert(key.clone(), value.clone()).unwrap();
                }
                black_box(trie.root().unwrap());
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("gmpt-trie hash_no_commit 10k", |b| {
        b.iter_batched_ref(
            || {
                let mut trie = Trie::stateless();
                for (key, value) in keys.iter().zip(values.iter()) {
                    trie.insert(key.clone(), value.clone()).unwrap();
                }
                trie
            },
            |trie| black_box(trie.hash_no_commit()),
            BatchSize::LargeInput,
        );
    });
}

fn lookup_benchmark(c: &mut Criterion) {
    let (keys, values) = black_box(random_data(10_000));
    let db = InMemoryTrieDB::new_empty();
    let mut trie = Trie::new(Box::new(db.clone()));
    for (key, value) in keys.iter().zip(values.iter()) {
        trie.insert(key.clone(), value.clone()).unwrap();
    }
    let root = trie.hash().unwrap();
    let trie = Trie::open(Box::new(db), root);

    let mut group = c.benchmark_group("Trie lookup");
    group.bench_function("sequential get 10k", |b| {
        b.iter(|| {
            for key in keys.iter() {
                black_box(trie.get(key).unwrap());
            }
        })
    });
    group.bench_function("parallel get 10k", |b| {
        b.iter(|| black_box(trie.parallel_get(&keys).unwrap()))
    });
}

fn derive_sha_benchmark(c: &mut Criterion) {
    let (_, items) = black_box(random_data(5_000));
    let config = ParallelConfig::from_env();

    let mut group = c.benchmark_group("Ordered list root");
    group.bench_function("stack trie 5k", |b| {
        b.iter(|| black_box(derive_sha(&items, &mut StackTrie::new()).unwrap()))
    });
    group.bench_function("trie 5k", |b| {
        b.iter(|| black_box(derive_sha(&items, &mut Trie::stateless()).unwrap()))
    });
    group.bench_function("parallel batch 5k", |b| {
        b.iter(|| {
            black_box(
                derive_sha_batched_parallel(
                    &items,
                    TrieKind::Transaction,
                    &SoftwareBatchBuilder,
                    &config,
                )
                .unwrap(),
            )
        })
    });
}

fn random_data(n: usize) -> (Vec<Vec<u8>>, Vec<Vec<u8>>) {
    let mut rng = StdRng::seed_from_u64(0xdeadbeef);
    let mut keys = Vec::with_capacity(n);
    let mut values = Vec::with_capacity(n);
    for _ in 0..n {
        let mut k = vec![0u8; 32];
        rng.fill_bytes(&mut k);
        let mut v = vec![0u8; 32];
        rng.fill_bytes(&mut v);
        keys.push(k);
        values.push(v);
    }
    (keys, values)
}

criterion_group!(
    benches,
    insert_benchmark,
    lookup_benchmark,
    derive_sha_benchmark
);
criterion_main!(benches);
