//! Compilation performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stylec::*;
use std::fs;
use tempfile::TempDir;

fn options() -> CompilerOptions {
    CompilerOptions {
        targets: BrowserTargets::Disabled,
        ..CompilerOptions::default()
    }
}

fn component_file(count: usize) -> String {
    let mut content = String::from("import { styled, css, keyframes } from 'stylec';\n\n");
    for i in 0..count {
        content.push_str(&format!(
            "export const Box{i} = styled.div`\n  padding: {i}px;\n  &:hover {{ color: red; }}\n`;\n\
             const spacing{i} = css`margin: {i}px;`;\n\
             function render{i}() {{ return Box{i}; }}\n"
        ));
    }
    content.push_str("const fade = keyframes`from { opacity: 0; } to { opacity: 1; }`;\n");
    content
}

fn bench_simple_compilation(c: &mut Criterion) {
    let source = "import { styled } from 'stylec';\nconst Button = styled.button`padding: 1rem;`;\n";
    let options = options();

    c.bench_function("simple_compilation", |b| {
        b.iter(|| {
            compile_source_with_options(black_box(source), black_box("Button.tsx"), &options).unwrap()
        })
    });
}

fn bench_large_file_compilation(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let input_path = temp_dir.path().join("large.tsx");
    fs::write(&input_path, component_file(200)).unwrap();
    let options = options();

    c.bench_function("large_file_compilation", |b| {
        b.iter(|| {
            compile_file_with_options(black_box(input_path.to_str().unwrap()), &options).unwrap()
        })
    });
}

fn bench_untouched_file(c: &mut Criterion) {
    let mut source = String::from("import { useState } from 'react';\n");
    for i in 0..500 {
        source.push_str(&format!("export const value{i} = {i} * 2;\n"));
    }
    let options = options();

    c.bench_function("untouched_file", |b| {
        b.iter(|| compile_source_with_options(black_box(&source), "plain.ts", &options).unwrap())
    });
}

fn bench_vendor_prefixing(c: &mut Criterion) {
    let source = component_file(20);
    let prefixed = CompilerOptions {
        targets: BrowserTargets::Queries(vec!["safari 12".to_string(), "defaults".to_string()]),
        ..CompilerOptions::default()
    };

    c.bench_function("vendor_prefixing", |b| {
        b.iter(|| compile_source_with_options(black_box(&source), "prefixed.tsx", &prefixed).unwrap())
    });
}

fn bench_parallel_session(c: &mut Criterion) {
    let files: Vec<(String, String)> = (0..32)
        .map(|i| (format!("src/component{}.tsx", i), component_file(10)))
        .collect();

    c.bench_function("parallel_session", |b| {
        b.iter(|| {
            let mut session = CompilationSession::new(options()).unwrap();
            session.compile_many(black_box(&files))
        })
    });
}

criterion_group!(
    benches,
    bench_simple_compilation,
    bench_large_file_compilation,
    bench_untouched_file,
    bench_vendor_prefixing,
    bench_parallel_session
);
criterion_main!(benches);
