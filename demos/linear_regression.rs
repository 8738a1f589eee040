use std::sync::mpsc;

use ferrite_trainer::data::{linear_samples, split_samples, Sample};
use ferrite_trainer::{mse_loss, ChannelSink, LinearModel, Model, ShuffledBatches, Sgd, Trainer};

fn main() -> ferrite_trainer::Result<()> {
    let samples = linear_samples(600, &[1.5, -0.75], 0.25, 0.05);
    let (train, valid, _) = split_samples(samples, 25, 0);

    let (tx, rx) = mpsc::channel();

    let mut trainer = Trainer::builder(LinearModel::new(2, 1), Sgd::new(0.1))
        .epochs(15)
        .clip_threshold(5.0)
        .forward(|_, model: &mut LinearModel, batch: &Vec<Sample>| {
            let inputs: Vec<Vec<f64>> = batch.iter().map(|(x, _)| x.clone()).collect();
            model.forward(&inputs)
        })
        .loss(|_, batch: &Vec<Sample>, output: &Vec<Vec<f64>>| {
            let targets: Vec<Vec<f64>> = batch.iter().map(|(_, y)| y.clone()).collect();
            mse_loss(output, &targets)
        })
        .train_source(ShuffledBatches::new(train, 16))
        .valid_source(ShuffledBatches::new(valid, 64).sequential())
        .sink(ChannelSink::new(tx))
        .build()?;

    trainer.run()?;

    for report in rx.try_iter() {
        println!(
            "Epoch {:>3}: train = {:.6}  valid = {:.6}",
            report.epoch,
            report.train_loss,
            report.valid_loss.unwrap_or(f64::NAN)
        );
    }

    let model = trainer.model();
    println!(
        "Learned w = [{:.3}, {:.3}], b = {:.3} (training mode restored: {})",
        model.weight(0, 0),
        model.weight(1, 0),
        model.biases[0],
        model.is_training()
    );
    Ok(())
}
