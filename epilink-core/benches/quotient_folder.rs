//! Benchmarks the database-wide argmax fold ([`QuotientFolder`]) at a few
//! database sizes, mirroring the dimension that dominates a real linkage
//! cycle: the SIMD batch folded down is one element per database row.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use epilink_core::backend::local::Party;
use epilink_core::gadgets::{FoldOp, Quotient, QuotientFolder};
use epilink_core::share::{ArithShare, BoolShare, ShareKind};

fn fold_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("quotient_folder_argmax");
    for &size in &[16usize, 256, 4096] {
        group.bench_function(format!("bool_space/{size}"), |b| {
            b.iter(|| {
                let party = Party::new(1);
                let nums: Vec<u64> = (0..size as u64).collect();
                let dens: Vec<u64> = vec![size as u64; size];
                let idx: Vec<u64> = (0..size as u64).collect();
                let num = BoolShare::from_clear(&party, &nums, 32, ShareKind::Gmw);
                let den = BoolShare::from_clear(&party, &dens, 32, ShareKind::Gmw);
                let target = BoolShare::from_clear(&party, &idx, 32, ShareKind::Gmw);
                let mut folder = QuotientFolder::new(Quotient { num, den }, vec![target]);
                folder.set_fold_operation(FoldOp::MaxTie);
                black_box(folder.fold())
            });
        });
        group.bench_function(format!("arith_space/{size}"), |b| {
            b.iter(|| {
                let party = Party::new(1);
                let nums: Vec<u64> = (0..size as u64).collect();
                let dens: Vec<u64> = vec![size as u64; size];
                let idx: Vec<u64> = (0..size as u64).collect();
                let num = ArithShare::from_clear(&party, &nums, 32);
                let den = ArithShare::from_clear(&party, &dens, 32);
                let target = BoolShare::from_clear(&party, &idx, 32, ShareKind::Gmw);
                let mut folder = QuotientFolder::new(Quotient { num, den }, vec![target]);
                folder.set_fold_operation(FoldOp::MaxTie);
                black_box(folder.fold())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, fold_bench);
criterion_main!(benches);
