// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for retained-tree rasterization and hit testing.
//!
//! By default this uses a deterministic synthetic tree intended to approximate a UI widget
//! gallery's shape and geometry. To benchmark a real scene, set `UI_RETAINED_JSON` to the
//! path of a JSON dump matching the expected schema.

use core::time::Duration;
use criterion::measurement::WallTime;
use criterion::{
    BatchSize, BenchmarkGroup, BenchmarkId, Criterion, black_box, criterion_group, criterion_main,
};
use kurbo::{Affine, Point, Rect};
use peniko::Color;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use understory_retained::{
    DecorationContext, DecorationSettings, Decorator, Draw, Element, ElementFlags, ElementId,
    ElementStates, ElementTransform, ElementTree, FuzzyHitTest, HitTestOptions, HitTester,
    LayoutTable, RasterPass, Rasterizer, RenderBackend, RenderTarget, Renderer,
};

const ENV_JSON_PATH: &str = "UI_RETAINED_JSON";

#[allow(dead_code, reason = "Only observed through `Debug` output.")]
#[derive(Clone, Copy, Debug, Default)]
struct BuildStats {
    elements: usize,
    clips: usize,
    composited: usize,
    max_depth: u16,
}

#[derive(Clone, Copy, Debug, Deserialize)]
struct DumpRect {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl DumpRect {
    fn to_rect(self) -> Rect {
        Rect::new(self.x0, self.y0, self.x1, self.y1)
    }
}

#[derive(Clone, Debug, Deserialize)]
struct DumpElement {
    rect: DumpRect,
    #[serde(default)]
    clip: bool,
    #[serde(default)]
    opacity: Option<f32>,
    #[serde(default)]
    transform: Option<[f64; 6]>,
    #[serde(default)]
    display_order: i32,
    children: Vec<DumpElement>,
}

#[derive(Debug)]
struct Fill;

impl Decorator for Fill {
    fn rasterize(&self, _: &DecorationContext, r: &mut Renderer<'_>, s: &DecorationSettings) {
        match s.pass {
            RasterPass::Content => r.fill_rect(s.rect, Color::from_rgb8(0x30, 0x60, 0x90)),
            RasterPass::Above if s.state.contains(ElementStates::FOCUSED) => {
                r.fill_rect(s.rect.inflate(2.0, 2.0), Color::WHITE);
            }
            _ => {}
        }
    }
}

/// Counts draws without doing anything with them.
#[derive(Debug, Default)]
struct NullBackend {
    targets: usize,
    draws: usize,
}

impl RenderBackend for NullBackend {
    fn begin_target(&mut self, _: RenderTarget) {
        self.targets += 1;
    }

    fn draw(&mut self, draw: &Draw, view: Affine) {
        black_box((draw, view));
        self.draws += 1;
    }
}

struct Scene {
    tree: ElementTree,
    layout: LayoutTable,
    ids: Vec<ElementId>,
    stats: BuildStats,
}

impl Scene {
    fn new() -> Self {
        Self {
            tree: ElementTree::new(),
            layout: LayoutTable::new(),
            ids: Vec::new(),
            stats: BuildStats::default(),
        }
    }

    fn insert(
        &mut self,
        parent: Option<ElementId>,
        rect: Rect,
        mut element: Element,
        depth: u16,
    ) -> ElementId {
        if element.flags.contains(ElementFlags::CLIP_CHILDREN) {
            self.stats.clips += 1;
        }
        if element.opacity.value(0.0) < 1.0 || element.transform.is_some() {
            self.stats.composited += 1;
        }
        element = element
            .with_layout(self.layout.insert_rect(rect))
            .with_decorator(Arc::new(Fill));
        let id = match parent {
            Some(p) => self
                .tree
                .insert(p, element)
                .unwrap_or_else(|e| panic!("insert failed: {e}")),
            None => self.tree.insert_root(element),
        };
        self.ids.push(id);
        self.stats.elements += 1;
        self.stats.max_depth = self.stats.max_depth.max(depth);
        id
    }
}

fn build_scene_from_dump(dump: &DumpElement) -> Scene {
    let mut scene = Scene::new();
    build_subtree_from_dump(&mut scene, None, dump, 1);
    scene
}

fn build_subtree_from_dump(
    scene: &mut Scene,
    parent: Option<ElementId>,
    node: &DumpElement,
    depth: u16,
) {
    let mut element = Element::container().with_display_order(node.display_order);
    if node.clip {
        element.flags |= ElementFlags::CLIP_CHILDREN;
    }
    if let Some(opacity) = node.opacity {
        element = element.with_opacity(opacity);
    }
    if let Some(m) = node.transform {
        element = element.with_transform(ElementTransform::new(Affine::new(m)));
    }
    let id = scene.insert(parent, node.rect.to_rect(), element, depth);
    for child in &node.children {
        build_subtree_from_dump(scene, Some(id), child, depth.saturating_add(1));
    }
}

/// Synthetic tree intended to match a UI-ish gallery.
///
/// Rough target shape:
/// - ~520 elements
/// - max depth ~8
/// - a 10 × 10 grid of cards with icon, label, and badge
/// - a few faded or rotated cards that go through scratch surfaces
/// - clipped scroll area and a handful of clipped nested subtrees
fn build_synthetic_scene() -> Scene {
    let mut s = Scene::new();
    let root = s.insert(
        None,
        Rect::new(0.0, 0.0, 1200.0, 800.0),
        Element::container(),
        1,
    );
    let sidebar = s.insert(
        Some(root),
        Rect::new(0.0, 0.0, 200.0, 800.0),
        Element::container(),
        2,
    );
    for i in 0..12 {
        let y = 60.0 + f64::from(i) * 40.0;
        s.insert(
            Some(sidebar),
            Rect::new(8.0, y, 192.0, y + 32.0),
            Element::leaf(),
            3,
        );
    }
    let _header = s.insert(
        Some(root),
        Rect::new(200.0, 0.0, 1200.0, 60.0),
        Element::container(),
        2,
    );
    let scroll = s.insert(
        Some(root),
        Rect::new(200.0, 60.0, 1200.0, 800.0),
        Element::container().with_flags(ElementFlags::default() | ElementFlags::CLIP_CHILDREN),
        2,
    );

    let (cols, rows) = (10_u32, 10_u32);
    let (cell_w, cell_h, gap, pad) = (96.0, 64.0, 4.0, 8.0);
    for row in 0..rows {
        for col in 0..cols {
            let idx = row * cols + col;
            let x = 200.0 + pad + (cell_w + gap) * f64::from(col);
            let y = 60.0 + pad + (cell_h + gap) * f64::from(row);
            let rect = Rect::new(x, y, x + cell_w, y + cell_h);

            let mut card = Element::container();
            if idx % 17 == 0 {
                card = card.with_opacity(0.6);
            }
            if idx % 23 == 0 {
                card = card.with_transform(ElementTransform::new(Affine::rotate(0.05)));
            }
            if idx % 7 == 0 {
                card = card.with_display_order(1);
            }
            let card = s.insert(Some(scroll), rect, card, 3);
            s.insert(
                Some(card),
                Rect::new(x + 8.0, y + 8.0, x + 40.0, y + 40.0),
                Element::leaf(),
                4,
            );
            s.insert(
                Some(card),
                Rect::new(x + 8.0, y + cell_h - 24.0, x + cell_w - 8.0, y + cell_h - 8.0),
                Element::leaf(),
                4,
            );
            s.insert(
                Some(card),
                Rect::new(x + cell_w - 20.0, y + 4.0, x + cell_w - 4.0, y + 20.0),
                Element::leaf(),
                4,
            );

            // A few deeper subtrees with clips.
            if idx % 25 == 0 {
                let clip = ElementFlags::default() | ElementFlags::CLIP_CHILDREN;
                let mut parent = card;
                for d in 0..4_u16 {
                    let inset = f64::from(d) * 2.0;
                    parent = s.insert(
                        Some(parent),
                        rect.inset(-inset),
                        Element::container().with_flags(clip),
                        5 + d,
                    );
                }
            }
        }
    }
    s
}

fn points() -> Vec<Point> {
    let mut out = Vec::new();
    for iy in 0..=8 {
        for ix in 0..=12 {
            out.push(Point::new(f64::from(ix) * 100.0, f64::from(iy) * 100.0));
        }
    }
    out.extend([
        Point::new(0.0, 0.0),
        Point::new(1199.0, 0.0),
        Point::new(0.0, 799.0),
        Point::new(1199.0, 799.0),
        Point::new(600.0, 400.0),
    ]);
    out
}

fn load_dump_from_env() -> Option<DumpElement> {
    let path = std::env::var(ENV_JSON_PATH).ok()?;
    let bytes =
        fs::read(Path::new(&path)).unwrap_or_else(|e| panic!("failed to read {path:?}: {e}"));
    let dump: DumpElement =
        serde_json::from_slice(&bytes).unwrap_or_else(|e| panic!("invalid JSON {path:?}: {e}"));
    Some(dump)
}

fn build_scene(dump: Option<&DumpElement>) -> Scene {
    match dump {
        Some(dump) => build_scene_from_dump(dump),
        None => build_synthetic_scene(),
    }
}

fn bench_rasterize(g: &mut BenchmarkGroup<'_, WallTime>, name: &str, dump: Option<&DumpElement>) {
    let mut scene = build_scene(dump);
    let mut r = Rasterizer::default();
    g.bench_with_input(BenchmarkId::new("rasterize_frame", name), &name, |b, _| {
        let mut now = 0.0;
        b.iter(|| {
            now += 1.0 / 60.0;
            black_box(r.rasterize_frame(&mut scene.tree, &scene.layout, now))
        });
    });
}

fn bench_rasterize_and_submit(
    g: &mut BenchmarkGroup<'_, WallTime>,
    name: &str,
    dump: Option<&DumpElement>,
) {
    let mut scene = build_scene(dump);
    let mut r = Rasterizer::default();
    g.bench_with_input(
        BenchmarkId::new("rasterize_and_submit", name),
        &name,
        |b, _| {
            b.iter(|| {
                r.rasterize_frame(&mut scene.tree, &scene.layout, 0.0);
                let mut backend = NullBackend::default();
                r.submit(&scene.tree, &mut backend);
                black_box((backend.targets, backend.draws))
            });
        },
    );
}

fn bench_hit_test(g: &mut BenchmarkGroup<'_, WallTime>, name: &str, dump: Option<&DumpElement>) {
    let scene = build_scene(dump);
    let pts = points();
    let options = HitTestOptions::mouse();
    let mut tester = HitTester::new();
    g.bench_with_input(BenchmarkId::new("hit_test_point", name), &name, |b, _| {
        b.iter(|| {
            for &p in &pts {
                black_box(tester.hit_test(&scene.tree, &scene.layout, black_box(p), &options, 0.0));
            }
        });
    });
}

fn bench_fuzzy(g: &mut BenchmarkGroup<'_, WallTime>, name: &str, dump: Option<&DumpElement>) {
    let scene = build_scene(dump);
    let pts = points();
    let mut fuzzy = FuzzyHitTest::default();
    g.bench_with_input(BenchmarkId::new("fuzzy_hit_test", name), &name, |b, _| {
        b.iter(|| {
            for &p in &pts {
                black_box(fuzzy.run_default(&scene.tree, &scene.layout, black_box(p)).len());
            }
        });
    });
}

fn bench_build(g: &mut BenchmarkGroup<'_, WallTime>, name: &str, dump: Option<&DumpElement>) {
    g.bench_with_input(BenchmarkId::new("build", name), &name, |b, _| {
        b.iter_batched(
            || (),
            |()| {
                let scene = build_scene(dump);
                black_box((scene.ids.len(), scene.stats))
            },
            BatchSize::SmallInput,
        );
    });
}

fn retained_ui(c: &mut Criterion) {
    let dump = load_dump_from_env();
    let name = if dump.is_some() { "dump" } else { "synthetic" };

    // Keep these short: they rebuild a sizable tree once per benchmark.
    let mut g = c.benchmark_group("retained_ui");
    g.warm_up_time(Duration::from_secs(1));
    g.measurement_time(Duration::from_secs(3));

    bench_rasterize(&mut g, name, dump.as_ref());
    bench_rasterize_and_submit(&mut g, name, dump.as_ref());
    bench_hit_test(&mut g, name, dump.as_ref());
    bench_fuzzy(&mut g, name, dump.as_ref());
    bench_build(&mut g, name, dump.as_ref());

    g.finish();
}

criterion_group!(benches, retained_ui);
criterion_main!(benches);
