use address_standardizer_lib::{logger, progress};
use address_standardizer_lib::{Geocoder, PipelineDriver, PipelineError, RunOutcome, Settings};

use std::process::ExitCode;
use log::{info, error};

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    logger::init();
    info!("Starting address standardization...");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), PipelineError> {
    let settings = Settings::from_env()?;
    let geocoder = Geocoder::new(&settings)?;
    let mut driver = PipelineDriver::new(&settings, geocoder);

    let summary = driver.run()?;
    if summary.outcome == RunOutcome::Completed {
        info!("Processed {} records in {} batches.", summary.processed, summary.batches_flushed);
        info!("All standardized addresses are in {:?}", settings.output_path);
        info!("Total time: {:.1} minutes", progress::minutes(summary.elapsed));
    }
    Ok(())
}
