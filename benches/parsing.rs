//! Template Parsing Benchmarks
//!
//! Measures full parses and code generation over templates of growing size.
//!
//! Run with: cargo bench --bench parsing

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use razorblade::{HostConfig, RazorParser, TemplateEngine};

// ============================================================================
// Test Data
// ============================================================================

mod data {
    const ROW: &str = "<tr>\n    <td>@item.Name</td>\n    <td>@(item.Price * item.Quantity)</td>\n    @if (item.OnSale) {\n        <td class=\"sale\">@item.Discount%</td>\n    }\n</tr>\n";

    pub fn page(rows: usize) -> String {
        let mut page = String::from("@model Order\n@using Shop.Models\n<table>\n@foreach (var item in Model.Items) {\n");
        for _ in 0..rows {
            page.push_str(ROW);
        }
        page.push_str("}\n</table>\n@section Footer {\n<p>@Model.Total</p>\n}\n");
        page
    }

    pub fn basic_page(rows: usize) -> String {
        let mut page = String::from("@ModelType Order\n@For Each item In Model.Items\n");
        for _ in 0..rows {
            page.push_str("  <li>@item.Name</li>\n");
        }
        page.push_str("Next\n");
        page
    }
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_parse(c: &mut Criterion) {
    let parser = RazorParser::c_like();
    let mut g = c.benchmark_group("parse");
    for rows in [1, 10, 100] {
        let input = data::page(rows);
        g.throughput(Throughput::Bytes(input.len() as u64));
        g.bench_with_input(BenchmarkId::new("c_like", rows), &input, |b, input| {
            b.iter(|| parser.parse_str(black_box(input)))
        });
    }

    let parser = RazorParser::basic_like();
    for rows in [1, 10, 100] {
        let input = data::basic_page(rows);
        g.throughput(Throughput::Bytes(input.len() as u64));
        g.bench_with_input(BenchmarkId::new("basic_like", rows), &input, |b, input| {
            b.iter(|| parser.parse_str(black_box(input)))
        });
    }
    g.finish();
}

fn bench_generate(c: &mut Criterion) {
    let runtime = TemplateEngine::default();
    let design_time = TemplateEngine::new(
        RazorParser::c_like(),
        HostConfig::new().with_design_time(true),
    );
    let input = data::page(50);

    let mut g = c.benchmark_group("generate");
    g.throughput(Throughput::Bytes(input.len() as u64));
    g.bench_function("runtime", |b| {
        b.iter(|| runtime.generate_code(black_box(&input)))
    });
    g.bench_function("design_time", |b| {
        b.iter(|| design_time.generate_code(black_box(&input)))
    });
    g.finish();
}

criterion_group!(benches, bench_parse, bench_generate);
criterion_main!(benches);
