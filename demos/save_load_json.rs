#[cfg(not(feature = "serde"))]
fn main() {
    println!("enable the `serde` feature: cargo run --example save_load_json --features serde");
}

#[cfg(feature = "serde")]
fn main() -> givens_nn::Result<()> {
    use givens_nn::{Activation, Dataset, FitConfig, LayerKind, Network, NetworkBuilder};
    use givens_nn::{Optimizer, Shuffle};

    let xs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
    let train = Dataset::from_rows(&xs, &ys)?;

    let mut net = NetworkBuilder::new(2)?
        .add_layer(LayerKind::Rotation, 8, Activation::Tanh)?
        .add_layer(LayerKind::Reflection, 4, Activation::Tanh)?
        .add_layer(LayerKind::Dense, 1, Activation::Sigmoid)?
        .build_with_seed(0)?;

    net.fit_with(
        &train,
        &FitConfig {
            epochs: 200,
            batch_size: 4,
            step: 0.1,
            shuffle: Shuffle::Seeded(0),
            optimizer: Optimizer::Adam {
                beta1: 0.9,
                beta2: 0.999,
                eps: 1e-8,
            },
            ..FitConfig::default()
        },
    )?;

    let path = "target/tmp_givens_nn.json";
    net.save_json(path)?;

    let loaded = Network::load_json(path)?;
    for x in &xs {
        println!("{x:?} -> {:?} / {:?}", net.predict(x), loaded.predict(x));
    }
    println!("saved and loaded model: {path}");
    Ok(())
}
