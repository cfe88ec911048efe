//! Lexer throughput benchmark.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mythos_lex::Lexer;
use mythos_util::Handler;

fn bench_lexer(c: &mut Criterion) {
    let source = r#"
function fib(n) {
    if n < 2 {
        return n
    }
    return fib(n - 1) + fib(n - 2)
}

total = 0
for i in range(0, 20) {
    total += fib(i)   # accumulate
}
print("total: " + string(total))
"#
    .repeat(50);

    c.bench_function("lex_fib_program", |b| {
        b.iter(|| {
            let handler = Handler::new();
            let tokens = Lexer::new(black_box(&source), &handler).tokenize();
            black_box(tokens.len())
        })
    });
}

criterion_group!(benches, bench_lexer);
criterion_main!(benches);
