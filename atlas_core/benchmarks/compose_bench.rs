use atlas_core::{Engine, InputEvent, Modifiers, StyleConfig};
use atlas_schema::{CellKey, Document, Link, LinkType, Panel, PathPoint, Record};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

const OWNERS: [&str; 4] = ["A", "B", "C", "D"];

fn grid_panel(size: i32) -> Panel {
    let mut records = Vec::with_capacity((size * size) as usize);
    for q in 0..size {
        for r in 0..size {
            let owner = OWNERS[((q / 4 + r / 4) % OWNERS.len() as i32) as usize];
            let msus = (0..(q + r) % 5).map(|n| format!("m{q}_{r}_{n}"));
            records.push(Record::new(q, r, Some(owner)).with_msus(msus));
            if (q + r) % 7 == 0 {
                records.push(Record::new(q, r, Some("E")));
            }
        }
    }
    Panel {
        name: format!("grid {size}"),
        records,
        claims: Vec::new(),
    }
}

/// One road per row, so group selection floods a row at a time.
fn row_roads(size: i32) -> Vec<Link> {
    (0..size)
        .map(|r| Link {
            id: Some(format!("row-{r}")),
            kind: LinkType::Road,
            path: (0..size)
                .map(|q| PathPoint {
                    panel: Some(0),
                    q,
                    r,
                })
                .collect(),
            panel: None,
            panel_from: None,
            panel_to: None,
        })
        .collect()
}

fn build_engine(size: i32) -> Engine {
    let document = Document {
        title: "bench".to_string(),
        subspaces: vec![grid_panel(size), grid_panel(size)],
        links: row_roads(size),
        ..Document::default()
    };
    Engine::new(document, StyleConfig::builtin())
}

fn bench_color_maps(c: &mut Criterion) {
    let mut group = c.benchmark_group("color_maps");

    for size in [16i32, 32, 64] {
        group.bench_with_input(BenchmarkId::new("idle", size), &size, |b, &size| {
            let engine = build_engine(size);
            b.iter(|| engine.color_maps());
        });

        group.bench_with_input(
            BenchmarkId::new("selected_with_focus", size),
            &size,
            |b, &size| {
                let mut engine = build_engine(size);
                engine.set_country_focus(Some("B"));
                engine.handle(InputEvent::click(
                    Some(CellKey::new(0, 0, size / 2)),
                    Modifiers::empty(),
                ));
                engine.handle(InputEvent::PointerMove {
                    cell: Some(CellKey::new(0, 1, 1)),
                });
                b.iter(|| engine.color_maps());
            },
        );
    }

    group.finish();
}

fn bench_group_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_selection");

    for size in [16i32, 32, 64] {
        group.bench_with_input(BenchmarkId::new("row_click", size), &size, |b, &size| {
            b.iter_batched(
                || build_engine(size),
                |mut engine| {
                    engine.handle(InputEvent::click(
                        Some(CellKey::new(0, size / 2, size / 2)),
                        Modifiers::SHIFT,
                    ));
                    engine
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_color_maps, bench_group_selection);
criterion_main!(benches);
