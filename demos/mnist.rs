//! MNIST digits with a 784 -> 256 -> 10 rotation network.
//!
//! Usage:
//!
//! ```text
//! cargo run --release --example mnist -- \
//!     train-images.idx3-ubyte train-labels.idx1-ubyte \
//!     t10k-images.idx3-ubyte t10k-labels.idx1-ubyte [epochs]
//! ```

use givens_nn::data::read_idx;
use givens_nn::{Activation, Error, LayerKind, Loss, NetworkBuilder};

const CLASSES: usize = 10;

fn main() -> givens_nn::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 4 {
        return Err(Error::InvalidConfig(
            "usage: mnist <train-images> <train-labels> <test-images> <test-labels> [epochs]"
                .to_owned(),
        ));
    }
    let epochs = match args.get(4) {
        Some(s) => s
            .parse::<usize>()
            .map_err(|e| Error::InvalidConfig(format!("bad epoch count {s:?}: {e}")))?,
        None => 10,
    };

    let train = read_idx(&args[0], &args[1], CLASSES)?;
    let test = read_idx(&args[2], &args[3], CLASSES)?;

    let mut net = NetworkBuilder::new(train.input_dim())?
        .add_layer(LayerKind::Rotation, 256, Activation::Sigmoid)?
        .add_layer(LayerKind::Rotation, CLASSES, Activation::Sigmoid)?
        .build_with_seed(0)?;

    for epoch in 0..epochs {
        let epoch_report = net.train_one_epoch(&train, Loss::Euclid, 6, 0.2)?;
        let report = net.classification_report(&train, &test, Loss::Euclid)?;
        println!(
            "MNIST epoch {epoch} ({} ms)\n{report}",
            epoch_report.elapsed.as_millis()
        );
        println!("    gradient norms: {:?}", epoch_report.grad_sq_norms);
    }
    Ok(())
}
