use std::{collections::VecDeque, fmt, mem, sync::Arc};

use chrono::{DateTime, Utc};
use incentives::{TokenLedger, calculate_reward};
use log::{debug, error, info};
use machine_learning::{
    ParamSet,
    arch::{Model, loss::LossFn},
    initialization::{ConstParamGen, RandParamGen, init_params},
    optimization::Optimizer,
    provider::SampleProvider,
    training::LocalTrainer,
};
use rand::{SeedableRng, rngs::StdRng, seq::index};
use rayon::prelude::*;

use crate::{
    FedErr, Result,
    aggregation::{Aggregator, ClientUpdate, MeanAggregator, WeightedAggregator},
    config::{AggregationKind, ClientSelection, SimulationConfig},
    handle::ModelHandle,
    record::{InMemoryRecordStore, RecordStore, SimulationRecord, SimulationStatus},
};

const REWARD_DESCRIPTION: &str = "Reward for simulation performance improvement";

/// A sample provider that can be shared between clients training concurrently.
pub type SharedProvider = Arc<dyn SampleProvider + Send + Sync>;

/// Where the clients get their training batches from.
#[derive(Clone)]
pub enum SampleSource {
    /// Every client trains on the same provider.
    Shared(SharedProvider),
    /// Client `i` trains on the `i`-th provider.
    Partitioned(Vec<SharedProvider>),
}

impl SampleSource {
    pub fn shared<P>(provider: P) -> Self
    where
        P: SampleProvider + Send + Sync + 'static,
    {
        Self::Shared(Arc::new(provider))
    }

    pub fn partitioned<I, P>(providers: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: SampleProvider + Send + Sync + 'static,
    {
        let providers = providers
            .into_iter()
            .map(|p| Arc::new(p) as SharedProvider)
            .collect();

        Self::Partitioned(providers)
    }

    fn provider(&self, client: usize) -> &(dyn SampleProvider + Send + Sync) {
        match self {
            Self::Shared(provider) => provider.as_ref(),
            Self::Partitioned(providers) => providers[client].as_ref(),
        }
    }
}

/// The outcome of a completed round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResult {
    /// 1-based.
    pub round: usize,
    /// The clients that trained this round, in increasing order.
    pub clients: Vec<usize>,
    /// The average loss of each client, aligned with `clients`.
    pub client_losses: Vec<f32>,
    pub average_loss: f32,
}

/// The progress of a simulation, its `Display` is the human readable log line.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    Started { at: DateTime<Utc> },
    InitialModel { tensors: usize, parameters: usize },
    RoundStarted { round: usize },
    ClientTrained { round: usize, client: usize, loss: f32 },
    RoundCompleted(RoundResult),
    TrainingCompleted,
    Finished { at: DateTime<Utc> },
    RewardCalculated { reward: f64 },
    BalanceUpdated { user_id: u64, balance: f64 },
    RecordSaved { id: u64 },
    RecordFailed { message: String },
}

fn iso(at: &DateTime<Utc>) -> impl fmt::Display {
    at.format("%Y-%m-%dT%H:%M:%S%.6f")
}

impl fmt::Display for SimulationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { at } => write!(f, "Starting simulation at {}Z", iso(at)),
            Self::InitialModel {
                tensors,
                parameters,
            } => write!(
                f,
                "Initial global model: {tensors} tensors, {parameters} parameters"
            ),
            Self::RoundStarted { round } => write!(f, "=== Round {round} ==="),
            Self::ClientTrained { client, loss, .. } => {
                write!(f, "Client {client} average loss: {loss:.4}")
            }
            Self::RoundCompleted(result) => write!(
                f,
                "Average loss for round {}: {:.4}",
                result.round, result.average_loss
            ),
            Self::TrainingCompleted => write!(f, "Training loop completed."),
            Self::Finished { at } => write!(f, "Finishing simulation at {}Z", iso(at)),
            Self::RewardCalculated { reward } => write!(f, "Calculated reward: {reward:.4}"),
            Self::BalanceUpdated { user_id, balance } => {
                write!(f, "Updated token balance for user {user_id}: {balance:.2}")
            }
            Self::RecordSaved { id } => write!(f, "Simulation record saved with ID: {id}"),
            Self::RecordFailed { message } => {
                write!(f, "Error saving simulation record: {message}")
            }
        }
    }
}

enum Phase {
    NotStarted,
    Broadcasting {
        round: usize,
    },
    ClientTraining {
        round: usize,
        snapshot: ParamSet,
        selected: Vec<usize>,
        updates: Vec<ClientUpdate>,
    },
    Aggregating {
        round: usize,
        updates: Vec<ClientUpdate>,
    },
    Completing,
    Finishing,
    Rewarding,
    Persisting,
    Finished,
}

/// A federated training run driven by its consumer.
///
/// Every call to `next` advances the run by one step and yields what that step produced, so a
/// consumer that stops pulling stops the run at the last completed step. The global parameters
/// only change once per round, when the aggregated delta gets added to them.
pub struct Simulation<M, L, F> {
    config: SimulationConfig,
    trainer: LocalTrainer<M, L, F>,
    samples: SampleSource,
    aggregator: Box<dyn Aggregator>,
    ledger: Arc<TokenLedger>,
    store: Arc<dyn RecordStore>,
    handle: ModelHandle,
    rng: StdRng,
    global: ParamSet,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    phase: Phase,
    pending: VecDeque<SimulationEvent>,
    failure: Option<FedErr>,
}

impl<M, L, F> Simulation<M, L, F> {
    /// Starts building a new `Simulation`.
    ///
    /// # Arguments
    /// * `config` - The parameters of the run.
    /// * `trainer` - Trains a client for one epoch.
    pub fn builder(
        config: SimulationConfig,
        trainer: LocalTrainer<M, L, F>,
    ) -> SimulationBuilder<M, L, F> {
        SimulationBuilder::new(config, trainer)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Returns the current global parameters.
    pub fn global(&self) -> &ParamSet {
        &self.global
    }

    pub fn ledger(&self) -> &Arc<TokenLedger> {
        &self.ledger
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }
}

impl<M, L, F, O> Simulation<M, L, F>
where
    M: Model + Sync,
    L: LossFn + Sync,
    F: Fn(&ParamSet) -> O + Sync,
    O: Optimizer,
{
    /// Maps every event to its log line.
    pub fn lines(self) -> impl Iterator<Item = Result<String>> {
        self.map(|event| event.map(|e| e.to_string()))
    }

    fn emit(&mut self, event: SimulationEvent) {
        self.pending.push_back(event);
    }

    fn after_round(&self, round: usize) -> Phase {
        if round < self.config.num_rounds {
            Phase::Broadcasting { round: round + 1 }
        } else {
            Phase::Completing
        }
    }

    fn select_clients(&mut self) -> Vec<usize> {
        let num_clients = self.config.num_clients;

        match self.config.selection {
            ClientSelection::All => (0..num_clients).collect(),
            ClientSelection::Fraction => {
                let amount = self.config.clients_per_round();
                let mut selected = index::sample(&mut self.rng, num_clients, amount).into_vec();
                selected.sort_unstable();
                selected
            }
        }
    }

    /// Runs the next step of the state machine, queueing the events it produces.
    fn advance(&mut self) -> Result<()> {
        match mem::replace(&mut self.phase, Phase::Finished) {
            Phase::NotStarted => {
                self.started_at = Utc::now();
                self.global = self.handle.snapshot();

                info!(
                    rounds = self.config.num_rounds,
                    clients = self.config.num_clients;
                    "simulation started"
                );

                self.emit(SimulationEvent::Started {
                    at: self.started_at,
                });
                self.emit(SimulationEvent::InitialModel {
                    tensors: self.global.len(),
                    parameters: self.global.num_values(),
                });
                self.phase = self.after_round(0);
            }
            Phase::Broadcasting { round } => {
                let snapshot = self.global.clone();
                let selected = self.select_clients();

                info!(round = round, clients = selected.len(); "round started");
                self.emit(SimulationEvent::RoundStarted { round });
                self.phase = Phase::ClientTraining {
                    round,
                    snapshot,
                    updates: Vec::with_capacity(selected.len()),
                    selected,
                };
            }
            Phase::ClientTraining {
                round,
                snapshot,
                selected,
                mut updates,
            } => {
                let remaining = &selected[updates.len()..];

                let trained = match remaining {
                    [] => Vec::new(),
                    _ if self.config.parallel_clients => remaining
                        .par_iter()
                        .map(|&client| {
                            train_client(&self.trainer, &self.samples, client, &snapshot)
                        })
                        .collect::<Result<Vec<_>>>()?,
                    [client, ..] => vec![train_client(
                        &self.trainer,
                        &self.samples,
                        *client,
                        &snapshot,
                    )?],
                };

                for update in trained {
                    self.emit(SimulationEvent::ClientTrained {
                        round,
                        client: update.client,
                        loss: update.loss,
                    });
                    updates.push(update);
                }

                self.phase = if updates.len() == selected.len() {
                    Phase::Aggregating { round, updates }
                } else {
                    Phase::ClientTraining {
                        round,
                        snapshot,
                        selected,
                        updates,
                    }
                };
            }
            Phase::Aggregating { round, updates } => {
                let aggregated = self.aggregator.aggregate(&updates)?;
                self.global.add_in_place(&aggregated)?;

                let client_losses: Vec<_> = updates.iter().map(|u| u.loss).collect();
                let average_loss = client_losses.iter().sum::<f32>() / updates.len() as f32;

                info!(round = round, average_loss = average_loss; "round completed");
                self.emit(SimulationEvent::RoundCompleted(RoundResult {
                    round,
                    clients: updates.iter().map(|u| u.client).collect(),
                    client_losses,
                    average_loss,
                }));
                self.phase = self.after_round(round);
            }
            Phase::Completing => {
                self.handle.load(self.global.clone());
                self.emit(SimulationEvent::TrainingCompleted);
                self.phase = Phase::Finishing;
            }
            Phase::Finishing => {
                self.finished_at = Utc::now();
                self.emit(SimulationEvent::Finished {
                    at: self.finished_at,
                });
                self.phase = Phase::Rewarding;
            }
            Phase::Rewarding => {
                let reward_config = &self.config.reward;
                let user_id = reward_config.user_id;
                let reward = calculate_reward(
                    reward_config.previous_metric,
                    reward_config.current_metric,
                    reward_config.scaling_factor,
                );
                let balance = self.ledger.credit(user_id, reward, REWARD_DESCRIPTION);

                self.emit(SimulationEvent::RewardCalculated { reward });
                self.emit(SimulationEvent::BalanceUpdated { user_id, balance });
                self.phase = Phase::Persisting;
            }
            Phase::Persisting => {
                let record = SimulationRecord {
                    num_rounds: self.config.num_rounds,
                    num_clients: self.config.num_clients,
                    fraction_fit: self.config.fraction_fit,
                    started_at: self.started_at,
                    finished_at: Some(self.finished_at),
                    status: SimulationStatus::Completed,
                };

                match self.store.append(record) {
                    Ok(id) => {
                        info!(id = id; "simulation record saved");
                        self.emit(SimulationEvent::RecordSaved { id });
                    }
                    Err(e) => {
                        error!("failed to save simulation record: {e}");
                        self.emit(SimulationEvent::RecordFailed {
                            message: e.to_string(),
                        });
                        self.failure = Some(FedErr::Persistence(e));
                    }
                }
            }
            Phase::Finished => {}
        }

        Ok(())
    }
}

impl<M, L, F, O> Iterator for Simulation<M, L, F>
where
    M: Model + Sync,
    L: LossFn + Sync,
    F: Fn(&ParamSet) -> O + Sync,
    O: Optimizer,
{
    type Item = Result<SimulationEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }

            if let Some(e) = self.failure.take() {
                return Some(Err(e));
            }

            if matches!(self.phase, Phase::Finished) {
                return None;
            }

            if let Err(e) = self.advance() {
                self.phase = Phase::Finished;
                return Some(Err(e));
            }
        }
    }
}

/// Trains one client starting from the round's snapshot.
fn train_client<M, L, F, O>(
    trainer: &LocalTrainer<M, L, F>,
    samples: &SampleSource,
    client: usize,
    snapshot: &ParamSet,
) -> Result<ClientUpdate>
where
    M: Model,
    L: LossFn,
    F: Fn(&ParamSet) -> O,
    O: Optimizer,
{
    let outcome = trainer.train_one_epoch(snapshot, samples.provider(client))?;
    let delta = outcome.params.subtract(snapshot)?;

    debug!(
        client = client,
        loss = outcome.loss,
        batches = outcome.batches;
        "client trained"
    );

    Ok(ClientUpdate {
        client,
        delta,
        loss: outcome.loss,
        samples: outcome.samples,
        batches: outcome.batches,
    })
}

/// Builds `Simulation`s, every collaborator but the trainer has a default.
pub struct SimulationBuilder<M, L, F> {
    config: SimulationConfig,
    trainer: LocalTrainer<M, L, F>,
    samples: Option<SampleSource>,
    aggregator: Option<Box<dyn Aggregator>>,
    ledger: Option<Arc<TokenLedger>>,
    store: Option<Arc<dyn RecordStore>>,
    handle: Option<ModelHandle>,
}

impl<M, L, F> SimulationBuilder<M, L, F> {
    /// Creates a new `SimulationBuilder`.
    pub fn new(config: SimulationConfig, trainer: LocalTrainer<M, L, F>) -> Self {
        Self {
            config,
            trainer,
            samples: None,
            aggregator: None,
            ledger: None,
            store: None,
            handle: None,
        }
    }

    /// Sets where the clients get their batches from, required.
    pub fn samples(mut self, samples: SampleSource) -> Self {
        self.samples = Some(samples);
        self
    }

    /// Overrides the aggregator picked by the config's `aggregation`.
    pub fn aggregator<A: Aggregator + 'static>(mut self, aggregator: A) -> Self {
        self.aggregator = Some(Box::new(aggregator));
        self
    }

    /// Sets the ledger the reward is credited to, a fresh one is used otherwise.
    pub fn ledger(mut self, ledger: Arc<TokenLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Sets the record store, an in memory store is used otherwise.
    pub fn record_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the handle holding the initial parameters, which receives the final ones.
    ///
    /// Without one, the parameters are initialized at random from the config's seed.
    pub fn model_handle(mut self, handle: ModelHandle) -> Self {
        self.handle = Some(handle);
        self
    }
}

impl<M: Model, L, F> SimulationBuilder<M, L, F> {
    /// Builds the `Simulation`.
    ///
    /// # Returns
    /// An `InvalidConfig` error if the config is invalid, there's no sample source or the amount
    /// of partitions doesn't match the amount of clients, or a `ShapeMismatch` if the initial
    /// parameters don't fit the trainer's model.
    pub fn build(self) -> Result<Simulation<M, L, F>> {
        let Self {
            config,
            trainer,
            samples,
            aggregator,
            ledger,
            store,
            handle,
        } = self;

        config.validate()?;

        let samples = samples
            .ok_or_else(|| FedErr::InvalidConfig("a sample source is required".into()))?;

        if let SampleSource::Partitioned(providers) = &samples {
            if providers.len() != config.num_clients {
                return Err(FedErr::InvalidConfig(format!(
                    "expected {} sample partitions, one per client, got {}",
                    config.num_clients,
                    providers.len()
                )));
            }
        }

        let handle = match handle {
            Some(handle) => handle,
            None => {
                let params = init_params(trainer.model(), &mut RandParamGen::seeded(config.seed))?;
                ModelHandle::new(params)
            }
        };

        let expected = init_params(trainer.model(), &mut ConstParamGen::new(0.))?;
        expected.check_compatible(&handle.snapshot())?;

        let aggregator = aggregator.unwrap_or_else(|| match config.aggregation {
            AggregationKind::Mean => Box::new(MeanAggregator),
            AggregationKind::Weighted => Box::new(WeightedAggregator),
        });

        let now = Utc::now();

        Ok(Simulation {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            trainer,
            samples,
            aggregator,
            ledger: ledger.unwrap_or_default(),
            store: store.unwrap_or_else(|| Arc::new(InMemoryRecordStore::new())),
            handle,
            global: ParamSet::new(),
            started_at: now,
            finished_at: now,
            phase: Phase::NotStarted,
            pending: VecDeque::new(),
            failure: None,
        })
    }
}
