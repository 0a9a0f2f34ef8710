use criterion::{Criterion, criterion_group, criterion_main};
use ledger::{
    CartFilter, CartLine, CartStore, HistoryEntry, HistoryLedger, InMemoryLedger, LineState,
    ProductId, StockLedger, TransactionId, UserId,
};

fn bench_decrement(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InMemoryLedger::new();
    let product = ProductId::new();
    rt.block_on(ledger.insert_stock(product, u32::MAX));

    c.bench_function("ledger/decrement_if_sufficient", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger.decrement_if_sufficient(product, 1).await.unwrap();
            });
        });
    });
}

fn bench_upsert_line(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InMemoryLedger::new();
    let user = UserId::new();
    let product = ProductId::new();

    c.bench_function("ledger/upsert_line", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger
                    .upsert_line(CartLine::new(user, product, 1, LineState::CheckedOut))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_sweep_confirmed_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("ledger/sweep_confirmed_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let ledger = InMemoryLedger::new();
                let user = UserId::new();
                for _ in 0..10 {
                    ledger
                        .upsert_line(CartLine::new(
                            user,
                            ProductId::new(),
                            1,
                            LineState::Confirmed,
                        ))
                        .await
                        .unwrap();
                }

                let filter = CartFilter::confirmed_for(user);
                let tx = TransactionId::new();
                let lines = ledger.find_lines(filter).await.unwrap();
                let entries = lines
                    .iter()
                    .map(|line| HistoryEntry::from_line(tx, line))
                    .collect();
                ledger.append_batch(entries).await.unwrap();
                ledger.delete_lines(filter).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_decrement,
    bench_upsert_line,
    bench_sweep_confirmed_10
);
criterion_main!(benches);
