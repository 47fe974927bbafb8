//! The training program for the aster-dl project.

pub mod common;
pub mod config;
pub mod logging;
pub mod utils;

use crate::{common::*, config::TrainingConfig};

/// The number of events buffered for the logging worker.
const EVENT_CHANNEL_SIZE: usize = 64;

/// The entry of training program.
pub async fn start(config: Arc<config::Config>, num_epochs: usize) -> Result<Vec<EpochSummary>> {
    let start_time = Local::now();
    let logging_dir = config
        .logging
        .dir
        .join(format!("{}", start_time.format(utils::FILE_STRFTIME)));
    let checkpoint_dir = logging_dir.join("checkpoints");

    // create dirs and save config
    {
        tokio::fs::create_dir_all(&logging_dir).await?;
        tokio::fs::create_dir_all(&checkpoint_dir).await?;
        let path = logging_dir.join("config.json5");
        let text = serde_json::to_string_pretty(&*config)?;
        tokio::fs::write(&path, text).await?;
    }

    let TrainingConfig {
        batch_size,
        shuffle,
        seed,
        num_workers,
        prefetch,
        lr,
        device,
        ref load_checkpoint,
        save_checkpoint,
    } = config.training;

    // load dataset
    info!("loading dataset");
    let dataset = LabeledImageDataset::load(
        &config.dataset.image_dir,
        &config.dataset.label_dir,
        Some(default_transform(config.dataset.image_size.get())),
    )
    .await?;
    let loader = BatchLoaderInit {
        batch_size: batch_size.get(),
        shuffle,
        seed,
        num_workers: num_workers.map(|num| num.get()),
        prefetch: prefetch.get(),
    }
    .build(Arc::new(dataset))?;
    info!(
        "{} records in {} batches per epoch",
        loader.num_records(),
        loader.num_batches()
    );

    // init model
    info!("initializing model on {:?}", device);
    let mut vs = nn::VarStore::new(device);
    let detector = ScriptedDetector::load(&config.model.module_file, vs.root())?;
    utils::try_load_checkpoint(&mut vs, &config.logging.dir, load_checkpoint)?;
    let optimizer = nn::Adam::default().build(&vs, lr.raw())?;

    // start logger
    let (events_tx, events_rx) = broadcast::channel(EVENT_CHANNEL_SIZE);
    let logging_future = logging::logging_worker(&config, &logging_dir, events_rx).await?;

    // training worker
    let mut training = TrainingLoop::new(
        detector,
        loader,
        optimizer,
        ScriptedLoss,
        device,
        num_epochs,
    )
    .with_events(events_tx)
    .with_epoch_hook(move |summary: &EpochSummary| {
        if save_checkpoint {
            let path = utils::save_checkpoint(
                &vs,
                &checkpoint_dir,
                summary.epoch,
                summary.average_loss,
            )?;
            info!("saved checkpoint '{}'", path.display());
        }
        Ok(())
    });

    let training_future = async move {
        let summaries = training.run().await?;
        // closes the event channel so that the logging worker stops
        drop(training);
        Fallible::Ok(summaries)
    };

    let (summaries, ()) = futures::try_join!(training_future, logging_future)?;

    if let Some(last) = summaries.last() {
        info!(
            "training finished after {} epochs, average loss {:.4}",
            summaries.len(),
            last.average_loss
        );
    }

    Ok(summaries)
}
