use std::str::FromStr;

use alloy::primitives::{Address, U256};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use tidepool::amm::Pool;
use tidepool::config::Config;
use tidepool::token::TokenBank;
use tidepool::utils::clock::ManualClock;
use tidepool::utils::logger::setup_logger;

type BenchPool = Pool<TokenBank, ManualClock>;

fn address(suffix: &str) -> Address {
    Address::from_str(&format!("0x{suffix:0>40}")).unwrap()
}

/// A pool seeded with `reserve` of both tokens and a trader holding `reserve` of both
fn seeded_pool(reserve: u64) -> (BenchPool, Address) {
    let (token_a, token_b, pool_address) = (address("A"), address("B"), address("F1"));
    let (provider, trader) = (address("A1"), address("7AD"));
    let mut bank = TokenBank::new(address("E7"));
    for account in [provider, trader] {
        for token in [token_a, token_b] {
            bank.mint(token, account, U256::from(reserve)).unwrap();
            bank.approve(token, account, pool_address, U256::MAX);
        }
    }

    let mut pool = Pool::new(
        pool_address,
        token_a,
        token_b,
        &Config::default(),
        bank,
        ManualClock::new(0),
    )
    .unwrap();
    pool.add_liquidity(
        U256::from(reserve),
        U256::from(reserve),
        U256::ZERO,
        U256::ZERO,
        provider,
    )
    .unwrap();
    (pool, trader)
}

fn bench_swap(c: &mut Criterion) {
    let mut group = c.benchmark_group("swap");
    for reserve in [1_000_000_u64, 1_000_000_000_000] {
        group.bench_with_input(BenchmarkId::from_parameter(reserve), &reserve, |b, &reserve| {
            b.iter_batched(
                || seeded_pool(reserve),
                |(mut pool, trader)| {
                    let token_a = pool.token_a();
                    let amount = U256::from(reserve / 1_000);
                    black_box(pool.swap(token_a, amount, U256::from(1), trader).unwrap())
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_liquidity(c: &mut Criterion) {
    c.bench_function("add_then_remove_liquidity", |b| {
        b.iter_batched(
            || seeded_pool(1_000_000_000),
            |(mut pool, trader)| {
                let amount = U256::from(1_000_000);
                let minted = pool
                    .add_liquidity(amount, amount, U256::ZERO, U256::ZERO, trader)
                    .unwrap();
                black_box(
                    pool.remove_liquidity(minted, U256::ZERO, U256::ZERO, trader)
                        .unwrap(),
                )
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_quote(c: &mut Criterion) {
    let (pool, _) = seeded_pool(1_000_000_000_000);
    let token_a = pool.token_a();
    c.bench_function("preview_swap", |b| {
        b.iter(|| black_box(pool.preview_swap(token_a, black_box(U256::from(12_345_678))).unwrap()));
    });
}

fn setup(c: &mut Criterion) {
    // Per-operation info logs would dominate the measurements
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "warn");
    }
    let _ = setup_logger();
    bench_swap(c);
    bench_liquidity(c);
    bench_quote(c);
}

criterion_group!(benches, setup);
criterion_main!(benches);
