use crate::prelude::*;

use crate::datalog_writer::DatalogWriter;
use crate::solax::live_data::ErrorCodeString;
use crate::solax::query::QueryHandler;
use crate::solax::transport::{SerialTransport, SimulatedInverter};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// The poll loop. Owns the transport, the query handler and the sample
/// history, and publishes a fresh [`Snapshot`] after every cycle.
pub struct Monitor {
    config: Config,
    transport: Box<dyn Transport>,
    handler: QueryHandler,
    history: History,         // ring sized by qos_samples
    snapshots: watch::Sender<Snapshot>,
    datalog: Option<DatalogWriter>,
    error_bits: u32,          // last averaged error mask that was reported
}

impl Monitor {
    /// Creates the monitor and opens the datalog file, if configured. The
    /// published snapshot starts out offline with zeroed live data.
    pub fn new(config: Config, transport: Box<dyn Transport>) -> Result<Self> {
        let datalog = match &config.datalog_file {
            Some(path) => Some(DatalogWriter::new(path)?),
            None => None,
        };

        let handler = QueryHandler::new(config.address, config.online_timeout);
        let history = History::new(config.qos_samples);
        let initial = Snapshot::new(handler.identity(), false, 0.0, &LiveData::default());
        let (snapshots, _) = watch::channel(initial);

        Ok(Self {
            config,
            transport,
            handler,
            history,
            snapshots,
            datalog,
            error_bits: 0,
        })
    }

    /// Opens the transport the configuration asks for.
    pub fn open_transport(config: &Config) -> Result<Box<dyn Transport>> {
        if config.simulate {
            info!("simulating inverter responses, {} is not opened", config.device);
            return Ok(Box::new(SimulatedInverter::new()));
        }

        Ok(Box::new(SerialTransport::open(
            &config.device,
            config.baud_rate,
            config.read_timeout(),
        )?))
    }

    /// Receiver for the snapshot published after every cycle.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    pub fn handler(&self) -> &QueryHandler {
        &self.handler
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// One poll cycle: query the inverter, record the sample, average and
    /// publish. Only transport failures are returned; a failed datalog write
    /// is logged and the cycle still counts.
    pub async fn cycle(&mut self) -> Result<Snapshot> {
        let report = self.handler.cycle(self.transport.as_mut()).await?;
        self.history.push(report.sample);

        let average = self.history.average(self.config.average_samples);
        self.log_error_bits(average.error_bits);

        let snapshot = Snapshot::new(
            self.handler.identity(),
            self.handler.online(),
            self.history.quality_of_service(),
            &average,
        );

        self.snapshots.send_replace(snapshot.clone());

        if let Some(datalog) = &mut self.datalog {
            if let Err(e) = datalog.write_snapshot(&snapshot) {
                error!("datalog entry dropped: {}", e);
            }
        }

        Ok(snapshot)
    }

    /// Polls forever at the configured interval. Returns only on a fatal
    /// error.
    pub async fn run(mut self) -> Result<()> {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            if let Err(e) = self.cycle().await {
                error!("polling stopped: {}", e);
                return Err(e);
            }
        }
    }

    /// Warns about every set bit when the averaged mask changes. Returns the
    /// fault names that were logged.
    fn log_error_bits(&mut self, error_bits: u32) -> Vec<&'static str> {
        if error_bits == self.error_bits {
            return vec![];
        }
        self.error_bits = error_bits;

        if error_bits == 0 {
            info!("inverter error bits cleared");
            return vec![];
        }

        let names = ErrorCodeString::from_value(error_bits);
        for name in &names {
            warn!("inverter reports {}", name);
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn simulated(config: Config) -> Monitor {
        Monitor::new(config, Box::new(SimulatedInverter::new())).unwrap()
    }

    fn config() -> Config {
        Config {
            simulate: true,
            status_port: 0,
            poll_interval_ms: 1,
            ..Default::default()
        }
    }

    fn failing_datalog() -> (tempfile::NamedTempFile, DatalogWriter) {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let read_only = std::fs::File::open(temp_file.path()).unwrap();
        (temp_file, DatalogWriter::from_file(read_only, "read-only"))
    }

    #[tokio::test]
    async fn datalog_failure_still_publishes() {
        let mut monitor = simulated(config());
        let (_file, writer) = failing_datalog();
        monitor.datalog = Some(writer);
        let published = monitor.subscribe();

        let mut snapshot = monitor.cycle().await.unwrap();
        for _ in 0..2 {
            snapshot = monitor.cycle().await.unwrap();
        }

        assert!(snapshot.inverter.online);
        assert_eq!(*published.borrow(), snapshot);
        assert_eq!(monitor.datalog.as_ref().map(|d| d.records_written()), Some(0));
    }

    #[tokio::test]
    async fn datalog_failure_keeps_polling() {
        let mut monitor = simulated(config());
        let (_file, writer) = failing_datalog();
        monitor.datalog = Some(writer);
        let mut published = monitor.subscribe();

        let running = tokio::spawn(monitor.run());

        // snapshots keep arriving while every datalog write fails
        for _ in 0..5 {
            tokio::time::timeout(Duration::from_secs(5), published.changed())
                .await
                .unwrap()
                .unwrap();
        }
        assert!(published.borrow().inverter.online);
        assert!(!running.is_finished());

        running.abort();
    }

    #[test]
    fn error_bits_reported_on_change_only() {
        let mut monitor = simulated(config());

        assert!(monitor.log_error_bits(0).is_empty());

        assert_eq!(
            monitor.log_error_bits(0x201),
            vec!["Tz Protection Fault", "Residual Current Fault"]
        );
        assert!(monitor.log_error_bits(0x201).is_empty());

        assert_eq!(
            monitor.log_error_bits(0x203),
            vec!["Tz Protection Fault", "Mains Lost Fault", "Residual Current Fault"]
        );

        assert!(monitor.log_error_bits(0).is_empty());
        assert_eq!(monitor.error_bits, 0);

        assert_eq!(monitor.log_error_bits(0x2), vec!["Mains Lost Fault"]);
    }
}
