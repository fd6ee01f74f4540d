//! Learn the identity map on the scalars 1..=8 with a single rotation layer.

use givens_nn::{Activation, Dataset, Loss, Network, RotationLayer, TrainUnit};

fn main() -> givens_nn::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let units: Vec<TrainUnit> = (1..=8)
        .map(|i| TrainUnit::new(vec![i as f64], vec![i as f64]))
        .collect();
    let data = Dataset::from_units(&units)?;

    let layer = RotationLayer::from_weights(&[0.5, 0.2], 1, 1)?;
    let mut net = Network::new(layer, Activation::leaky_relu())?;

    let before = net.loss(&data, Loss::Euclid)?;
    let report = net.fit(&data, Loss::Euclid, 100, 1, 0.02)?;
    let elapsed: std::time::Duration = report.epochs.iter().map(|e| e.elapsed).sum();

    println!("ECHO");
    println!("    loss before: {before:.6}");
    println!("    loss after:  {:.6}", report.final_loss);
    println!("    fit time:    {} ms", elapsed.as_millis());
    println!("    epochs: 100, batch size: 1, step: 0.02");
    for x in [2.5, 7.0] {
        println!("    f({x}) = {:.4}", net.predict(&[x])[0]);
    }
    Ok(())
}
