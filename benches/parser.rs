//! Parser benchmarks
//!
//! Run with: cargo bench --bench parser
//! Profile with: cargo flamegraph --bench parser -- --bench

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use jsrun::config::ParseOptions;
use jsrun::ir::lower_program;
use jsrun::parser::Parser;
use jsrun::string_dict::StringDict;

/// Simple expressions
const SIMPLE_EXPR: &str = "1 + 2 * 3 - 4 / 5";

/// Binary expression tree (deep nesting)
fn generate_binary_expr(depth: usize) -> String {
    if depth == 0 {
        "x".to_string()
    } else {
        format!(
            "({} + {})",
            generate_binary_expr(depth - 1),
            generate_binary_expr(depth - 1)
        )
    }
}

/// Variable declarations
const VARIABLES: &str = r#"
let x = 1;
const y = 2;
var z = 3;
let a = x + y + z;
const b = a * 2;
let { foo, bar: baz } = obj;
const [first, second, ...rest] = arr;
"#;

/// Class definition
const CLASS_DEF: &str = r#"
class Counter extends Base {
    constructor(name, initialValue = 0) {
        super();
        this.name = name;
        this.count = initialValue;
        Counter.instances = (Counter.instances || 0) + 1;
    }

    get value() {
        return this.count;
    }

    set value(n) {
        if (n >= 0) {
            this.count = n;
        }
    }

    increment() {
        this.count++;
        return this;
    }

    *[Symbol.iterator]() {
        for (let i = 0; i < this.count; i++) yield i;
    }

    static create(name) {
        return new Counter(name);
    }
}
"#;

/// Function with various parameter patterns
const FUNCTIONS: &str = r#"
function simple(a, b) { return a + b; }
function defaultParams(x = 1, y = 2) { return x + y; }
function restParams(...args) { return args.reduce((a, b) => a + b, 0); }
function destructured({ x, y }, [a, b]) { return x + y + a + b; }
const arrow = (x) => x * 2;
const arrowBlock = (x) => { return x * 2; };
function* generator() { yield 1; yield* [2, 3]; }
"#;

/// Control flow
const CONTROL_FLOW: &str = r#"
if (condition) {
    doSomething();
} else if (otherCondition) {
    doSomethingElse();
} else {
    doDefault();
}

outer: for (let i = 0; i < 10; i++) {
    for (const item of items) {
        if (item === i) continue outer;
        process(item);
    }
}

for (const key in object) {
    if (object.hasOwnProperty(key)) {
        print(key, object[key]);
    }
}

while (running) {
    tick();
}

do {
    attempt();
} while (shouldRetry);

switch (value) {
    case 1:
        handleOne();
        break;
    case 2:
    case 3:
        handleTwoOrThree();
        break;
    default:
        handleDefault();
}

try {
    riskyOperation();
} catch (error) {
    handleError(error);
} finally {
    cleanup();
}
"#;

/// JSON-like object literals
const OBJECTS: &str = r#"
const config = {
    name: "MyApp",
    version: "1.0.0",
    settings: {
        debug: true,
        logLevel: "info",
        features: ["auth", "api", "cache"],
    },
    endpoints: [
        { path: "/api/users", method: "GET" },
        { path: "/api/users", method: "POST" },
        { path: "/api/users/:id", method: "PUT" },
    ],
    get summary() { return this.name + "@" + this.version; },
    [computedKey]: computedValue ?? fallback,
};
"#;

/// Array operations with method chaining
const ARRAYS: &str = r#"
const numbers = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
const doubled = numbers.map(n => n * 2);
const evens = numbers.filter(n => n % 2 === 0);
const sorted = [...numbers].sort((a, b) => b - a);
const result = numbers
    .filter(n => n > 2)
    .map(n => n ** 2)
    .reduce((acc, n) => acc + n, 0);
"#;

/// Template literals with expressions
const TEMPLATES: &str = r#"
const simple = `Hello, World!`;
const interpolated = `Hello, ${name}!`;
const nested = `outer ${`inner ${value}`} outer`;
const tagged = html`<div class="${className}">${content}</div>`;
const complex = `Result: ${items.map(i => `${i.name}: ${i.value}`).join(', ')}`;
"#;

/// Large realistic file
fn generate_large_source(size: usize) -> String {
    let mut source = String::with_capacity(size);
    let patterns = [CLASS_DEF, FUNCTIONS, CONTROL_FLOW, OBJECTS, ARRAYS, TEMPLATES];

    let mut i = 0;
    while source.len() < size {
        if let Some(pattern) = patterns.get(i % patterns.len()) {
            // Wrap each copy so lexical declarations do not collide
            source.push_str("{\n");
            source.push_str(pattern);
            source.push_str("\n}\n");
        }
        i += 1;
    }
    source
}

fn parse(source: &str) -> bool {
    let mut dict = StringDict::new();
    Parser::new(source, &mut dict, ParseOptions::default())
        .parse_program()
        .is_ok()
}

fn bench_parser_individual(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/individual");

    let cases = [
        ("simple_expr", SIMPLE_EXPR),
        ("variables", VARIABLES),
        ("class_def", CLASS_DEF),
        ("functions", FUNCTIONS),
        ("control_flow", CONTROL_FLOW),
        ("objects", OBJECTS),
        ("arrays", ARRAYS),
        ("templates", TEMPLATES),
    ];

    for (name, source) in cases {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("bytes", name), source, |b, s| {
            b.iter(|| black_box(parse(black_box(s))));
        });
    }

    group.finish();
}

fn bench_parser_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/throughput");

    for size in [1_000, 10_000, 100_000] {
        let source = generate_large_source(size);
        let actual_size = source.len();

        group.throughput(Throughput::Bytes(actual_size as u64));
        group.bench_with_input(
            BenchmarkId::new("large_source", format!("{}KB", actual_size / 1024)),
            &source,
            |b, s| {
                b.iter(|| black_box(parse(black_box(s))));
            },
        );
    }

    group.finish();
}

fn bench_parser_expression_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/expression_depth");

    for depth in [5, 10, 15] {
        let source = generate_binary_expr(depth);
        group.bench_with_input(BenchmarkId::new("binary", depth), &source, |b, s| {
            b.iter(|| black_box(parse(black_box(s))));
        });
    }

    group.finish();
}

/// Parse plus lowering to function templates
fn bench_lowering(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/lowering");
    let source = generate_large_source(10_000);

    group.throughput(Throughput::Bytes(source.len() as u64));
    group.bench_function("parse_and_lower", |b| {
        b.iter(|| {
            let mut dict = StringDict::new();
            let lowered = Parser::new(black_box(&source), &mut dict, ParseOptions::default())
                .parse_program()
                .and_then(|program| lower_program(&program, &source));
            black_box(lowered.is_ok())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parser_individual,
    bench_parser_throughput,
    bench_parser_expression_depth,
    bench_lowering
);
criterion_main!(benches);
