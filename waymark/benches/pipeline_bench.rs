//! Benchmarks for pipeline execution overhead.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use waymark::prelude::*;

fn skip_heavy_pipeline(stages: usize) -> Pipeline {
    let mut builder = PipelineBuilder::new("bench");
    for i in 0..stages {
        builder = builder
            .stage(Stage::new(
                format!("stage{i}"),
                Arc::new(Always),
                Arc::new(FnAction::new("noop", |_| Ok(()))),
            ))
            .unwrap();
    }
    builder.build().unwrap()
}

fn pipeline_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let pipeline = skip_heavy_pipeline(8);
    c.bench_function("run_all_skipped", |b| {
        b.iter(|| {
            let ctx = WorkContext::new(dir.path(), "bench");
            let report = rt.block_on(pipeline.run(&ctx));
            black_box(report)
        });
    });

    let checkpointed = {
        let mut builder = PipelineBuilder::new("bench-fs");
        for i in 0..8 {
            builder = builder
                .stage(Stage::new(
                    format!("stage{i}"),
                    Arc::new(OutputFile::new(format!("{{subject}}_{i}.dat"))),
                    Arc::new(FnAction::new("noop", |_| Ok(()))),
                ))
                .unwrap();
        }
        builder.build().unwrap()
    };
    for i in 0..8 {
        std::fs::write(dir.path().join(format!("bench_{i}.dat")), b"x").unwrap();
    }

    c.bench_function("run_all_skipped_fs_checkpoints", |b| {
        b.iter(|| {
            let ctx = WorkContext::new(dir.path(), "bench");
            let report = rt.block_on(checkpointed.run(&ctx));
            black_box(report)
        });
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
