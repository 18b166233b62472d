use std::fmt;
use std::time::Duration;

use log::{debug, error, info};

use crate::checkpoint_writer::CheckpointWriter;
use crate::config::Settings;
use crate::delay_manager::RateLimiter;
use crate::error::PipelineError;
use crate::geocoder::{AddressLookup, GeocodeOutcome};
use crate::input_loader::{self, ResultRecord};
use crate::progress::ProgressReporter;
use crate::resume_manager::ResumeState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Loading,
    Filtering,
    Processing,
    FlushingFinal,
    Done,
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Loading => "LOADING",
            PipelineState::Filtering => "FILTERING",
            PipelineState::Processing => "PROCESSING",
            PipelineState::FlushingFinal => "FLUSHING_FINAL",
            PipelineState::Done => "DONE",
            PipelineState::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Remaining records were processed and flushed.
    Completed,
    /// Output already covered every input id.
    NothingToDo,
}

/// Per-outcome counts for the records handled in this run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeTally {
    pub labels: usize,
    pub missing_address: usize,
    pub not_found: usize,
    pub request_errors: usize,
}

impl OutcomeTally {
    pub fn record(&mut self, outcome: &GeocodeOutcome) {
        match outcome {
            GeocodeOutcome::Label(_) => self.labels += 1,
            GeocodeOutcome::MissingAddress => self.missing_address += 1,
            GeocodeOutcome::NotFound => self.not_found += 1,
            GeocodeOutcome::RequestFailed => self.request_errors += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub total_input: usize,
    pub already_done: usize,
    pub processed: usize,
    pub batches_flushed: usize,
    pub tally: OutcomeTally,
    pub elapsed: Duration,
}

/// Runs one pass over the input: load, skip finished ids, geocode the
/// rest in order, append results in batches.
pub struct PipelineDriver<'a, L: AddressLookup> {
    settings: &'a Settings,
    lookup: L,
    writer: CheckpointWriter,
    limiter: RateLimiter,
    state: PipelineState,
}

impl<'a, L: AddressLookup> PipelineDriver<'a, L> {
    pub fn new(settings: &'a Settings, lookup: L) -> Self {
        PipelineDriver {
            settings,
            lookup,
            writer: CheckpointWriter::new(&settings.output_path),
            limiter: RateLimiter::new(settings.rate_limit_delay),
            state: PipelineState::Loading,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline {} -> {}", self.state, next);
        self.state = next;
    }

    pub fn run(&mut self) -> Result<RunSummary, PipelineError> {
        let result = self.run_inner();
        if let Err(e) = &result {
            error!("Aborting in {}: {}", self.state, e);
            self.transition(PipelineState::Aborted);
        }
        result
    }

    fn run_inner(&mut self) -> Result<RunSummary, PipelineError> {
        self.state = PipelineState::Loading;
        info!("Reading data from {:?}...", self.settings.input_path);
        let records = input_loader::load_records(&self.settings.input_path)?;

        self.transition(PipelineState::Filtering);
        let resume = ResumeState::load(&self.settings.output_path)?;
        let remaining = resume.remaining(&records);

        if remaining.is_empty() {
            info!("All addresses have already been processed. Nothing to do.");
            self.transition(PipelineState::Done);
            return Ok(RunSummary {
                outcome: RunOutcome::NothingToDo,
                total_input: records.len(),
                already_done: resume.len(),
                processed: 0,
                batches_flushed: 0,
                tally: OutcomeTally::default(),
                elapsed: Duration::ZERO,
            });
        }

        let total = remaining.len();
        info!("Processing {} remaining addresses...", total);

        self.transition(PipelineState::Processing);
        let batch_size = self.settings.batch_size;
        let progress = ProgressReporter::start(total);
        let mut buffer: Vec<ResultRecord> = Vec::with_capacity(batch_size);
        let mut tally = OutcomeTally::default();
        let mut batches_flushed = 0;
        let mut processed = 0;

        for record in remaining {
            let outcome = self
                .lookup
                .lookup(record.property_address.as_deref(), &record.property_id);
            tally.record(&outcome);
            buffer.push(ResultRecord::new(record, outcome));
            processed += 1;

            self.limiter.pause();

            if buffer.len() >= batch_size {
                progress.report(processed);
                info!("  ...saving progress...");
                self.writer.flush(&buffer)?;
                buffer.clear();
                batches_flushed += 1;
            }
        }

        self.transition(PipelineState::FlushingFinal);
        if !buffer.is_empty() {
            progress.report(processed);
            info!("Saving final batch of results...");
            self.writer.flush(&buffer)?;
            batches_flushed += 1;
        }

        self.transition(PipelineState::Done);
        let elapsed = progress.elapsed();
        info!(
            "Processing complete. {} labels, {} missing addresses, {} not found, {} request errors.",
            tally.labels, tally.missing_address, tally.not_found, tally.request_errors
        );

        Ok(RunSummary {
            outcome: RunOutcome::Completed,
            total_input: records.len(),
            already_done: resume.len(),
            processed,
            batches_flushed,
            tally,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct EchoLookup {
        calls: RefCell<Vec<String>>,
    }

    impl AddressLookup for EchoLookup {
        fn lookup(&self, address: Option<&str>, record_id: &str) -> GeocodeOutcome {
            self.calls.borrow_mut().push(record_id.to_string());
            match address {
                Some(a) => GeocodeOutcome::Label(a.to_uppercase()),
                None => GeocodeOutcome::MissingAddress,
            }
        }
    }

    fn settings(dir: &std::path::Path) -> Settings {
        let mut s = Settings::new(dir.join("in.csv"), dir.join("out.csv"));
        s.batch_size = 2;
        s.rate_limit_delay = Duration::ZERO;
        s
    }

    #[test]
    fn test_missing_input_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let lookup = EchoLookup { calls: RefCell::new(Vec::new()) };
        let mut driver = PipelineDriver::new(&settings, &lookup);

        assert!(matches!(driver.run(), Err(PipelineError::InputNotFound(_))));
        assert_eq!(driver.state(), PipelineState::Aborted);
        assert!(!settings.output_path.exists());
        assert!(lookup.calls.borrow().is_empty());
    }

    #[test]
    fn test_run_and_tally() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        std::fs::write(
            &settings.input_path,
            "property_id,property_address\n1,1 main st\n2,\n3,3 elm st\n",
        )
        .unwrap();
        let lookup = EchoLookup { calls: RefCell::new(Vec::new()) };
        let mut driver = PipelineDriver::new(&settings, &lookup);

        let summary = driver.run().unwrap();
        assert_eq!(driver.state(), PipelineState::Done);
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.batches_flushed, 2);
        assert_eq!(
            summary.tally,
            OutcomeTally { labels: 2, missing_address: 1, not_found: 0, request_errors: 0 }
        );
        assert_eq!(*lookup.calls.borrow(), vec!["1", "2", "3"]);

        let out = std::fs::read_to_string(&settings.output_path).unwrap();
        assert_eq!(
            out,
            "property_id,property_address,standardized_address\n\
             1,1 main st,1 MAIN ST\n\
             2,,Missing Address\n\
             3,3 elm st,3 ELM ST\n"
        );
    }
}
