use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use givens_nn::{AnyLayer, Init, Layer, LayerKind};

const SIZE_IN: usize = 128;
const SIZE_OUT: usize = 64;

fn layer(kind: LayerKind) -> AnyLayer {
    let mut rng = StdRng::seed_from_u64(0);
    AnyLayer::random(kind, SIZE_IN, SIZE_OUT, Init::Xavier, &mut rng).unwrap()
}

fn forward_bench(c: &mut Criterion) {
    let input = vec![0.1_f64; SIZE_IN];
    for kind in [LayerKind::Dense, LayerKind::Rotation, LayerKind::Reflection] {
        let l = layer(kind);
        c.bench_function(&format!("{kind}_forward_{SIZE_IN}_{SIZE_OUT}"), |b| {
            b.iter(|| black_box(l.forward(black_box(&input))))
        });
    }
}

fn backward_bench(c: &mut Criterion) {
    let input = vec![0.1_f64; SIZE_IN];
    let upstream = vec![0.01_f64; SIZE_OUT];
    for kind in [LayerKind::Dense, LayerKind::Rotation, LayerKind::Reflection] {
        let l = layer(kind);
        let train = l.forward_on_train(&input);
        c.bench_function(&format!("{kind}_backward_{SIZE_IN}_{SIZE_OUT}"), |b| {
            b.iter(|| {
                let mut u = upstream.clone();
                let mut z = train.clone();
                black_box(l.backward_calc_gradient(&mut u, black_box(&input), &mut z))
            })
        });
    }
}

criterion_group!(benches, forward_bench, backward_bench);
criterion_main!(benches);
