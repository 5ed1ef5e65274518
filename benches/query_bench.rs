use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use entity_query::compiler::{compile, compile_sort};
use entity_query::lexer::Lexer;
use entity_query::parser::{parse_sort, Parser};
use entity_query::{
    FieldRegistry, QueryAssembler, QueryRequest, SqlCompiler, Value, ValueType, ViewRegistry,
};

struct Ticket {
    id: u32,
    title: String,
    priority: u32,
    status: &'static str,
}

struct TicketDto;

const STATUSES: &[&str] = &["open", "review", "closed"];

const FILTERS: &[(&str, &str)] = &[
    ("simple", "status = 'open'"),
    ("medium", "status in ('open', 'review') and priority > 2"),
    (
        "complex",
        "(title contains 'release' or title startsWith 'v1') and not (priority <= 1 or status = 'closed') and id != 42",
    ),
];

fn ticket_fields() -> FieldRegistry<Ticket> {
    FieldRegistry::builder()
        .field("id", ValueType::Number, |t: &Ticket| Value::from(t.id))
        .field("title", ValueType::String, |t: &Ticket| Value::from(t.title.as_str()))
        .field("priority", ValueType::Number, |t: &Ticket| Value::from(t.priority))
        .field("status", ValueType::Enum(STATUSES), |t: &Ticket| {
            Value::Enum(t.status.to_string())
        })
        .build()
}

fn ticket_views() -> ViewRegistry<Ticket, TicketDto> {
    let mut views = ViewRegistry::new();
    views.register("list", ["id", "title", "status"]);
    views.set_default("list").expect("list 视图已注册");
    views
}

fn tickets(count: u32) -> Vec<Ticket> {
    (0..count)
        .map(|i| Ticket {
            id: i,
            title: if i % 3 == 0 {
                format!("release notes {}", i)
            } else {
                format!("v1 task {}", i)
            },
            priority: i % 5,
            status: STATUSES[(i % 3) as usize],
        })
        .collect()
}

// 基准测试：词法分析性能
fn benchmark_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_performance");

    for &(name, filter) in FILTERS {
        group.bench_with_input(BenchmarkId::new("tokenize", name), &filter, |b, &filter| {
            b.iter(|| {
                let tokens: Vec<_> = Lexer::new(black_box(filter)).collect();
                black_box(tokens)
            })
        });
    }

    group.finish();
}

// 基准测试：语法分析性能
fn benchmark_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_performance");

    for &(name, filter) in FILTERS {
        group.bench_with_input(BenchmarkId::new("parse", name), &filter, |b, &filter| {
            b.iter(|| match Parser::new(black_box(filter)).parse() {
                Ok(ast) => black_box(ast),
                Err(_) => panic!("解析失败"),
            })
        });
    }

    group.finish();
}

// 基准测试：谓词和排序编译性能
fn benchmark_compile(c: &mut Criterion) {
    let fields = ticket_fields();
    let mut group = c.benchmark_group("compile_performance");

    for &(name, filter) in FILTERS {
        let ast = Parser::new(filter).parse().expect("解析应该成功");
        group.bench_with_input(BenchmarkId::new("predicate", name), &ast, |b, ast| {
            b.iter(|| match compile(black_box(ast), &fields) {
                Ok(predicate) => black_box(predicate.is_match_all()),
                Err(_) => panic!("编译失败"),
            })
        });
    }

    let specs = parse_sort("priority:desc, title, id:asc").expect("排序解析应该成功");
    group.bench_function("sort", |b| {
        b.iter(|| match compile_sort(black_box(&specs), &fields) {
            Ok(comparator) => black_box(comparator.is_unordered()),
            Err(_) => panic!("排序编译失败"),
        })
    });

    group.finish();
}

// 基准测试：在内存数据上执行过滤和排序
fn benchmark_evaluate(c: &mut Criterion) {
    let fields = ticket_fields();
    let views = ticket_views();
    let assembler = QueryAssembler::new(&fields, &views);
    let mut group = c.benchmark_group("evaluate_performance");

    for size in [100u32, 1_000, 10_000] {
        let data = tickets(size);
        let request = QueryRequest::new().filter(FILTERS[2].1).sort("priority:desc,id");
        let intent = assembler.assemble(&request).expect("组装应该成功");

        group.bench_with_input(BenchmarkId::new("apply", size), &data, |b, data| {
            b.iter(|| black_box(intent.apply(black_box(data)).len()))
        });
    }

    group.finish();
}

// 基准测试：完整的端到端处理
fn benchmark_end_to_end(c: &mut Criterion) {
    let fields = ticket_fields();
    let views = ticket_views();
    let assembler = QueryAssembler::new(&fields, &views);
    let compiler = SqlCompiler::new("tickets");
    let mut group = c.benchmark_group("end_to_end_performance");

    for &(name, filter) in FILTERS {
        let request = QueryRequest::new().filter(filter).sort("priority:desc");
        group.bench_with_input(BenchmarkId::new("assemble_to_sql", name), &request, |b, request| {
            b.iter(|| {
                let intent = assembler.assemble(black_box(request)).expect("组装应该成功");
                black_box(compiler.compile(&intent))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_lexer,
    benchmark_parser,
    benchmark_compile,
    benchmark_evaluate,
    benchmark_end_to_end
);
criterion_main!(benches);
