use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use coloc::{
    ConflictReporter, EventRecord, GraphWriter, InMemoryStores, LinkInferencer, MatchTypeOrder,
    NodeLabel, PairSide, PairTable, RecordKind, RelKind, SimilarityScorer, Source,
};

const TOPICS: [&str; 8] = [
    "Semantic Web",
    "Very Large Data Bases",
    "Knowledge Engineering",
    "Information Retrieval",
    "Linked Data",
    "Machine Learning",
    "Digital Libraries",
    "Software Engineering",
];

fn record(source: Source, kind: RecordKind, i: usize) -> EventRecord {
    let topic = TOPICS[i % TOPICS.len()];
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let year = 2000 + (i % 20) as i32;
    EventRecord::builder(source, kind)
        .id(format!("{kind}-{i}"))
        .title(format!("{i}th International Conference on {topic} {year}"))
        .year(year)
        .country("DEU")
        .build()
        .unwrap()
}

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");
    for size in [64usize, 256] {
        let working: Vec<EventRecord> = (0..size)
            .map(|i| record(Source::CeurWs, RecordKind::Workshop, i))
            .collect();
        let targets: Vec<EventRecord> = (0..size)
            .map(|i| record(Source::Wikidata, RecordKind::Conference, i))
            .collect();
        let scorer = SimilarityScorer::new(0.7, 0.7).unwrap();

        group.throughput(Throughput::Elements(u64::try_from(size * size).unwrap_or(u64::MAX)));
        group.bench_function(format!("score_{size}x{size}"), |b| {
            b.iter(|| black_box(scorer.score(&working, &targets)));
        });
    }
    group.finish();
}

fn bench_match_engine(c: &mut Criterion) {
    let working: Vec<EventRecord> = (0..256)
        .map(|i| record(Source::CeurWs, RecordKind::Workshop, i))
        .collect();
    let targets: Vec<EventRecord> = (0..256)
        .map(|i| record(Source::Wikidata, RecordKind::Conference, i))
        .collect();
    let engine = coloc::MatchEngine::new(MatchTypeOrder::default(), 0.7, 0.7).unwrap();

    c.bench_function("match_records_256", |b| {
        b.iter(|| black_box(engine.match_records(&working, &targets)));
    });
}

fn bench_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("inference");
    group.throughput(Throughput::Elements(1));

    group.bench_function("run_300_workshops", |b| {
        b.iter_custom(|iters| {
            let mut total = std::time::Duration::ZERO;
            for _ in 0..iters {
                let stores = InMemoryStores::new();
                let writer = GraphWriter::new(stores.graph.clone());
                let mut matches = PairTable::new();
                let mut links = PairTable::new();
                for a in 0..300 {
                    let target = a / 3;
                    matches.push(PairSide::new(a.to_string()), PairSide::new(format!("Q{target}")));
                    links.push(
                        PairSide::new(a.to_string()),
                        PairSide::new(format!("conf/{target}")),
                    );
                }
                let ceur = NodeLabel::new(Source::CeurWs, RecordKind::Workshop);
                let wikidata = NodeLabel::new(Source::Wikidata, RecordKind::Conference);
                let dblp = NodeLabel::new(Source::Dblp, RecordKind::Conference);
                writer
                    .add_matched_nodes(&matches, ceur, wikidata, &RelKind::Matches)
                    .unwrap();
                writer
                    .add_matched_nodes(&links, ceur, dblp, &RelKind::Linked)
                    .unwrap();
                let reporter = ConflictReporter::new(stores.conflicts.clone());
                let inferencer = LinkInferencer::new(stores.graph.clone(), reporter, 3).unwrap();

                let start = Instant::now();
                black_box(inferencer.run().unwrap());
                total += start.elapsed();
            }
            total
        })
    });
    group.finish();
}

criterion_group!(similarity, bench_similarity, bench_match_engine, bench_inference);
criterion_main!(similarity);
