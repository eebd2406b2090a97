use criterion::{black_box, criterion_group, criterion_main, Criterion};
use formgate::{BlocklistConfig, DomainBlocklistValidator, MatchPolicy};

fn bench_scenarios(c: &mut Criterion) {
    // Large list so the accept path exercises the prefilter and the reject
    // path pays for a full ordered scan.
    let raw: String = (0..200)
        .map(|i| format!("blocked-{i:03}.example\n"))
        .collect();
    let long_list = BlocklistConfig::parse(&raw);
    let short_list = BlocklistConfig::parse("baddomain.com\nscam.net");

    let substring = DomainBlocklistValidator::default();
    let boundary = DomainBlocklistValidator::new(MatchPolicy::DomainBoundary);

    c.bench_function("accept_short_list", |b| {
        b.iter(|| substring.validate(black_box("user@gooddomain.com"), &short_list))
    });
    c.bench_function("accept_long_list", |b| {
        b.iter(|| substring.validate(black_box("user@gooddomain.com"), &long_list))
    });
    c.bench_function("reject_first_entry", |b| {
        b.iter(|| substring.validate(black_box("user@blocked-000.example"), &long_list))
    });
    c.bench_function("reject_last_entry", |b| {
        b.iter(|| substring.validate(black_box("user@blocked-199.example"), &long_list))
    });
    c.bench_function("reject_last_entry_boundary_policy", |b| {
        b.iter(|| boundary.validate(black_box("user@blocked-199.example"), &long_list))
    });
    c.bench_function("parse_200_entries", |b| {
        b.iter(|| BlocklistConfig::parse(black_box(&raw)))
    });
}

criterion_group!(validate_group, bench_scenarios);
criterion_main!(validate_group);
