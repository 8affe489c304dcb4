//! Lexer throughput benchmark.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use luapre_lex::tokenize;

fn mixed_chunk() -> String {
    let unit = "\
local function greet(name)\n\
    -- format and emit\n\
    print((\"Hello, %s!\\n\"):format(name))\n\
end\n\
!for i = 1, 3 do\n\
    greet(!(\"user\" .. 1))\n\
!end\n\
local s = [==[\nmulti\nline\n]==]\n";
    unit.repeat(200)
}

fn bench_tokenize(c: &mut Criterion) {
    let source = mixed_chunk();
    c.bench_function("tokenize_mixed_chunk", |b| {
        b.iter(|| tokenize(black_box(&source)).expect("benchmark input must lex"))
    });
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
