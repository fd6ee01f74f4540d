//! Learn `x0 + x1` on a 4x4 grid, first with one rotation layer, then with a
//! rotation hidden layer of width 3.

use givens_nn::{Activation, Dataset, FitConfig, Loss, Network, RotationLayer};

fn sum_data() -> givens_nn::Result<Dataset> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for a in 1..=4 {
        for b in 1..=4 {
            xs.push(vec![a as f64, b as f64]);
            ys.push(vec![(a + b) as f64]);
        }
    }
    Dataset::from_rows(&xs, &ys)
}

fn run(name: &str, net: &mut Network, data: &Dataset, cfg: &FitConfig) -> givens_nn::Result<()> {
    let before = net.loss(data, cfg.loss)?;
    let report = net.fit_with(data, cfg)?;
    let elapsed: std::time::Duration = report.epochs.iter().map(|e| e.elapsed).sum();

    println!("{name}");
    println!("    loss before: {before:.6}");
    println!("    loss after:  {:.6}", report.final_loss);
    println!("    fit time:    {} ms", elapsed.as_millis());
    println!(
        "    epochs: {}, batch size: {}, step: {}",
        cfg.epochs, cfg.batch_size, cfg.step
    );
    Ok(())
}

fn main() -> givens_nn::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let data = sum_data()?;

    let mut single = Network::new(
        RotationLayer::from_weights(&[0.3, 0.2, 0.1], 2, 1)?,
        Activation::leaky_relu(),
    )?;
    let cfg = FitConfig {
        epochs: 1000,
        batch_size: 16,
        step: 0.05,
        loss: Loss::Euclid,
        ..FitConfig::default()
    };
    run("SUM", &mut single, &data, &cfg)?;

    let hidden =
        RotationLayer::from_weights(&[0.3, 0.2, 0.1, -0.2, 0.4, 0.1, 0.5, 0.3, -0.1], 2, 3)?;
    let out = RotationLayer::from_weights(&[0.4, 0.3, 0.2, 0.1], 3, 1)?;
    let mut multi = Network::new(hidden, Activation::leaky_relu())?
        .with_layer(out, Activation::leaky_relu())?;
    let cfg = FitConfig {
        epochs: 300,
        batch_size: 4,
        step: 0.005,
        loss: Loss::Euclid,
        ..FitConfig::default()
    };
    run("SUM MULTI LAYERS", &mut multi, &data, &cfg)?;

    Ok(())
}
