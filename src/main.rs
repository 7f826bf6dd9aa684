use std::{env, sync::Arc};

use anyhow::{Context, Result, bail};
use federated_incentives::{
    settings::Settings,
    sink::{self, Framing},
    synthetic,
};
use federation::{
    InMemoryRecordStore, JsonLinesRecordStore, RecordStore, SampleSource, Simulation,
};
use futures::StreamExt;
use incentives::{IncentiveService, RewardRequest, TokenLedger};
use log::{error, info};
use machine_learning::{
    ParamSet,
    arch::{Sequential, activations::ActFn, layers::Layer, loss::CrossEntropy},
    optimization::Adam,
    provider::DataLoader,
    training::LocalTrainer,
};
use rand::{SeedableRng, rngs::StdRng};
use tokio::{
    io::{self, AsyncWriteExt},
    signal,
};

const FEATURES: usize = 4;
const CLASSES: usize = 3;
const CHANNEL_CAPACITY: usize = 64;

const USAGE: &str = "usage: fedsim <simulate|stream|reward <user> <previous> <current> [scaling]|records>";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let settings = Settings::load()?;

    match args.first().map(String::as_str).unwrap_or("simulate") {
        "simulate" => simulate(settings, Framing::Plain).await,
        "stream" => simulate(settings, Framing::Sse).await,
        "reward" => reward(&settings, &args[1..]),
        "records" => records(&settings),
        other => bail!("unknown mode {other:?}\n{USAGE}"),
    }
}

fn record_store(settings: &Settings) -> Arc<dyn RecordStore> {
    match &settings.records_path {
        Some(path) => Arc::new(JsonLinesRecordStore::new(path)),
        None => Arc::new(InMemoryRecordStore::new()),
    }
}

async fn simulate(settings: Settings, framing: Framing) -> Result<()> {
    info!(project = settings.project_name.as_str(); "starting simulation");

    let config = settings.simulation.clone();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let dataset = synthetic::blobs(settings.samples, FEATURES, CLASSES, &mut rng)?;

    let loader = |dataset, client: u64| {
        let loader = DataLoader::new(dataset, settings.batch_size);
        if settings.shuffle {
            loader.shuffled(config.seed.wrapping_add(client))
        } else {
            loader
        }
    };

    let samples = if settings.partition_data {
        let loaders = dataset
            .partition(config.num_clients, &mut rng)?
            .into_iter()
            .zip(0..)
            .map(|(part, client)| loader(part, client));

        SampleSource::partitioned(loaders)
    } else {
        SampleSource::shared(loader(dataset, 0))
    };

    let model = Sequential::new([
        Layer::dense((FEATURES, settings.hidden_size), Some(ActFn::relu())),
        Layer::dense((settings.hidden_size, CLASSES), None),
    ]);

    let lr = settings.learning_rate;
    let trainer = LocalTrainer::new(model, CrossEntropy::new(), move |params: &ParamSet| {
        Adam::with_defaults(params, lr)
    });

    let ledger = Arc::new(TokenLedger::new());
    let simulation = Simulation::builder(config, trainer)
        .samples(samples)
        .ledger(Arc::clone(&ledger))
        .record_store(record_store(&settings))
        .build()?;

    let (rx, producer) = sink::spawn_producer(simulation.lines(), CHANNEL_CAPACITY);
    let mut lines = Box::pin(sink::line_stream(rx));
    let mut stdout = io::stdout();

    let outcome: Result<()> = async {
        tokio::select! {
            ret = async {
                while let Some(line) = lines.next().await {
                    let line = line?;
                    stdout.write_all(framing.frame(&line).as_bytes()).await?;
                    stdout.flush().await?;
                }
                Ok::<_, anyhow::Error>(())
            } => ret,
            _ = signal::ctrl_c() => {
                info!("received SIGTERM, stopping the simulation");
                Ok(())
            }
        }
    }
    .await;

    drop(lines);
    producer.await.context("simulation producer panicked")?;

    if let Err(e) = &outcome {
        error!("simulation failed: {e}");
    }

    outcome
}

fn reward(settings: &Settings, args: &[String]) -> Result<()> {
    let [user_id, previous, current, rest @ ..] = args else {
        bail!("{USAGE}");
    };

    let request = RewardRequest {
        user_id: user_id.parse().context("invalid user id")?,
        previous_metric: previous.parse().context("invalid previous metric")?,
        current_metric: current.parse().context("invalid current metric")?,
        scaling_factor: rest
            .first()
            .map(|s| s.parse())
            .transpose()
            .context("invalid scaling factor")?,
    };

    let service = IncentiveService::new(
        Arc::new(TokenLedger::new()),
        settings.simulation.reward.scaling_factor,
    );

    let response = service.submit_reward(&request);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn records(settings: &Settings) -> Result<()> {
    let Some(path) = &settings.records_path else {
        bail!("RECORDS_PATH is not set, there are no stored records");
    };

    let stored = JsonLinesRecordStore::new(path).records()?;
    println!("{}", serde_json::to_string_pretty(&stored)?);
    Ok(())
}
