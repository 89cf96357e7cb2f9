//! Benchmarks for the compilation pipeline.
//!
//! Programs are generated with the AST builder in several sizes, each
//! subroutine mixing arithmetic that folds away, loops, conditionals and
//! calls.
//!
//! ## Profiling with Puffin
//!
//! Run with the `profile-with-puffin` feature to collect stage timings:
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use octet::prelude::*;
use std::hint::black_box;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

/// A block `main` with `subroutines` worker subroutines called from
/// `main.start`.
fn generate_program(subroutines: usize) -> Ast {
    let mut b = AstBuilder::new("bench.oct");
    let mut main_statements = Vec::new();
    let mut calls = Vec::new();

    for n in 0..subroutines {
        let name = format!("work{n}");
        let total = format!("total{n}");
        main_statements.push(b.var(DataType::UWord, &total, None));

        // total = 3 * 4 + 0
        let three = b.int(3);
        let four = b.int(4);
        let product = b.binary(three, BinaryOp::Mul, four);
        let zero = b.int(0);
        let sum = b.binary(product, BinaryOp::Add, zero);
        let target = b.target_var(&total);
        let init = b.assign(target, sum);

        // for i in 0 to 9 { total += i }
        let i = b.var(DataType::UByte, "i", None);
        let target = b.target_var(&total);
        let value = b.ident("i");
        let add = b.aug_assign(target, BinaryOp::Add, value);
        let count = b.for_range("i", 0, 9, vec![add]);

        // if total > 100 { total -= 1 } else { total = total * 1 }
        let left = b.ident(&total);
        let limit = b.int(100);
        let condition = b.binary(left, BinaryOp::Greater, limit);
        let target = b.target_var(&total);
        let decr = b.decr(target);
        let target = b.target_var(&total);
        let same = b.ident(&total);
        let one = b.int(1);
        let times_one = b.binary(same, BinaryOp::Mul, one);
        let neutral = b.assign(target, times_one);
        let branch = b.if_else(condition, vec![decr], vec![neutral]);

        // while total != 0 { total-- }
        let left = b.ident(&total);
        let zero = b.int(0);
        let condition = b.binary(left, BinaryOp::NotEqual, zero);
        let target = b.target_var(&total);
        let decr = b.decr(target);
        let drain = b.while_loop(condition, vec![decr]);

        let body = vec![i, init, count, branch, drain];
        main_statements.push(b.subroutine(&name, vec![], vec![], body));
        calls.push(b.call_stmt(&name, vec![]));
    }

    main_statements.push(b.subroutine("start", vec![], vec![], calls));
    let main = b.block("main", main_statements);
    b.module("bench", vec![main])
}

fn bench_pipeline(c: &mut Criterion) {
    setup_profiler();
    let mut group = c.benchmark_group("pipeline");
    let options = CompilerOptions::default();

    for size in [1, 10, 100, 500] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("compile", size), &size, |bench, &size| {
            bench.iter_batched(
                || generate_program(size),
                |mut ast| {
                    let result = Compiler::compile(&mut ast, &options);
                    end_profiling_frame();
                    black_box(result)
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_without_optimizer(c: &mut Criterion) {
    let options = CompilerOptions::default().with_optimize(false);
    c.bench_function("compile_unoptimized_100", |bench| {
        bench.iter_batched(
            || generate_program(100),
            |mut ast| black_box(Compiler::compile(&mut ast, &options)),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_pipeline, bench_without_optimizer);
criterion_main!(benches);
