use criterion::{
    BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main,
};
use esi_capnp::{GasketCache, TypeSchema, build_decoder, build_encoder};
use esi_ir::{Context, Type, TypeParser};

const TYPES: &[&str] = &[
    "ui8",
    "!hw.array<16xsi12>",
    "!hw.struct<a: ui8, b: ui32, c: !hw.array<8xi1>, d: si64>",
];

fn synthesis_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesis");
    for name in TYPES {
        let ty = TypeParser::parse_type(name).unwrap();
        group.bench_with_input(BenchmarkId::new("encoder", name), &ty, |b, ty| {
            b.iter_batched(
                || TypeSchema::new(ty.clone()),
                |schema| build_encoder(&schema).unwrap(),
                BatchSize::SmallInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("decoder", name), &ty, |b, ty| {
            b.iter_batched(
                || TypeSchema::new(ty.clone()),
                |schema| build_decoder(&schema).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn cache_bench(c: &mut Criterion) {
    let types: Vec<Type> = TYPES
        .iter()
        .map(|t| TypeParser::parse_type(t).unwrap())
        .collect();
    c.bench_function("cache/repeated-requests", |b| {
        b.iter_batched(
            || (GasketCache::new(), Context::new()),
            |(cache, mut ctx)| {
                for _ in 0..16 {
                    for ty in &types {
                        cache.encoder_module(&mut ctx, ty).unwrap();
                        cache.decoder_module(&mut ctx, ty).unwrap();
                    }
                }
                ctx
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group! {
    name = gaskets;
    config = Criterion::default().sample_size(20);
    targets = synthesis_bench, cache_bench
}
criterion_main!(gaskets);
