use log::debug;

use crate::{
    ParamSet, Result,
    arch::{Model, loss::LossFn},
    optimization::Optimizer,
    provider::SampleProvider,
};

/// What a single local epoch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochOutcome {
    /// The trained parameters.
    pub params: ParamSet,
    /// The mean of the per-batch losses, `0.0` if there were no batches.
    pub loss: f32,
    pub batches: usize,
    pub samples: usize,
}

/// Trains a model for one epoch over a client's samples.
///
/// A fresh optimizer is built through `optimizer_factory` at the start of every epoch, so no
/// optimizer state leaks between rounds.
pub struct LocalTrainer<M, L, F> {
    model: M,
    loss_fn: L,
    optimizer_factory: F,
}

impl<M, L, F> LocalTrainer<M, L, F> {
    /// Creates a new `LocalTrainer`.
    ///
    /// # Arguments
    /// * `model` - The architecture to train.
    /// * `loss_fn` - The loss function to minimize.
    /// * `optimizer_factory` - Builds the optimizer for a given starting state.
    pub fn new(model: M, loss_fn: L, optimizer_factory: F) -> Self {
        Self {
            model,
            loss_fn,
            optimizer_factory,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M, L, F, O> LocalTrainer<M, L, F>
where
    M: Model,
    L: LossFn,
    F: Fn(&ParamSet) -> O,
    O: Optimizer,
{
    /// Runs one epoch of local training.
    ///
    /// # Arguments
    /// * `params` - The starting state, it is cloned and never modified.
    /// * `provider` - The source of this client's batches.
    ///
    /// # Returns
    /// The trained state and the average batch loss, or a `ShapeMismatch` if `params` doesn't
    /// fit the model.
    pub fn train_one_epoch<P>(&self, params: &ParamSet, provider: &P) -> Result<EpochOutcome>
    where
        P: SampleProvider + ?Sized,
    {
        let mut params = params.clone();
        let mut optimizer = (self.optimizer_factory)(&params);

        let mut total_loss = 0.;
        let mut batches = 0;
        let mut samples = 0;

        for (x, y) in provider.batches() {
            samples += x.nrows();

            let (loss, grads) = self.model.backprop(&params, x.view(), y.view(), &self.loss_fn)?;
            optimizer.step(&mut params, &grads)?;

            total_loss += loss;
            batches += 1;
        }

        let loss = if batches == 0 {
            0.
        } else {
            total_loss / batches as f32
        };

        debug!(batches = batches, samples = samples, loss = loss; "local epoch finished");

        Ok(EpochOutcome {
            params,
            loss,
            batches,
            samples,
        })
    }

    /// Computes the mean loss of `params` over every batch of `provider`, without training.
    pub fn evaluate<P>(&self, params: &ParamSet, provider: &P) -> Result<f32>
    where
        P: SampleProvider + ?Sized,
    {
        let mut total = 0.;
        let mut batches = 0;

        for (x, y) in provider.batches() {
            let y_pred = self.model.forward(params, x.view())?;
            total += self.loss_fn.loss(y_pred.view(), y.view());
            batches += 1;
        }

        Ok(if batches == 0 { 0. } else { total / batches as f32 })
    }
}
