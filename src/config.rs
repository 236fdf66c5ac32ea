use crate::prelude::*;

use serde::Deserialize;
use std::time::Duration;

pub const MAX_ADDRESS: u8 = 247;
pub const MAX_QOS_SAMPLES: usize = 10_000;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "Config::default_device")]
    pub device: String,
    #[serde(default = "Config::default_baud_rate")]
    pub baud_rate: u32,
    /// Bus address handed to the inverter after discovery.
    #[serde(default = "Config::default_address")]
    pub address: u8,

    /// Averaging window, in poll cycles.
    #[serde(default = "Config::default_average_samples")]
    pub average_samples: usize,
    /// Ring capacity used for the quality-of-service ratio.
    #[serde(default = "Config::default_qos_samples")]
    pub qos_samples: usize,
    /// Cycles without live data before the inverter is reported offline.
    #[serde(default = "Config::default_online_timeout")]
    pub online_timeout: u32,

    #[serde(default = "Config::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub read_timeout_ms: u64,

    /// 0 disables the status server.
    #[serde(default = "Config::default_status_port")]
    pub status_port: u16,
    #[serde(default = "Config::default_status_bind")]
    pub status_bind: String,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
    pub log_file: Option<String>,

    /// Optional path to append one JSON snapshot per cycle to
    pub datalog_file: Option<String>,

    #[serde(default)]
    pub simulate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: Self::default_device(),
            baud_rate: Self::default_baud_rate(),
            address: Self::default_address(),
            average_samples: Self::default_average_samples(),
            qos_samples: Self::default_qos_samples(),
            online_timeout: Self::default_online_timeout(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            read_timeout_ms: 0,
            status_port: Self::default_status_port(),
            status_bind: Self::default_status_bind(),
            loglevel: Self::default_loglevel(),
            log_file: None,
            datalog_file: None,
            simulate: false,
        }
    }
}

impl Config {
    /// Reads `file` if given, applies command line overrides and validates
    /// the result.
    pub fn load(options: &Options) -> Result<Self> {
        let mut config = match &options.config_file {
            Some(file) => Self::new(file.clone())?,
            None => Self::default(),
        };
        config.apply(options);
        config.validate()?;

        Ok(config)
    }

    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| file_error!("error reading {}: {}", file, err))?;

        Self::from_yaml(&content).map_err(|err| file_error!("error parsing {}: {}", file, err))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // an empty file means all defaults
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_yaml::from_str(content)?)
    }

    pub fn apply(&mut self, options: &Options) {
        if let Some(device) = &options.device {
            self.device = device.clone();
        }
        if let Some(address) = options.address {
            self.address = address;
        }
        if let Some(port) = options.port {
            self.status_port = port;
        }
        if let Some(samples) = options.samples {
            self.average_samples = samples;
        }
        if options.simulate {
            self.simulate = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.address == 0 || self.address > MAX_ADDRESS {
            bail!("address must be between 1 and {}", MAX_ADDRESS);
        }

        if self.qos_samples == 0 || self.qos_samples > MAX_QOS_SAMPLES {
            bail!("qos_samples must be between 1 and {}", MAX_QOS_SAMPLES);
        }

        if self.average_samples == 0 || self.average_samples > self.qos_samples {
            bail!(
                "average_samples must be between 1 and qos_samples ({})",
                self.qos_samples
            );
        }

        if self.online_timeout == 0 {
            bail!("online_timeout must be at least 1");
        }

        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be at least 1");
        }

        if self.baud_rate == 0 {
            bail!("baud_rate must be greater than 0");
        }

        if !self.simulate && self.device.is_empty() {
            bail!("device must be set unless simulating");
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        if self.simulate {
            info!("  Transport: simulated inverter");
        } else {
            info!("  Device: {} at {} baud", self.device, self.baud_rate);
        }
        info!("  Address: 0x{:02X}", self.address);
        info!("  Averaging: {} samples", self.average_samples);
        info!("  QoS window: {} samples", self.qos_samples);
        info!("  Online timeout: {} cycles", self.online_timeout);
        info!("  Poll interval: {}ms", self.poll_interval_ms);
        if self.status_port == 0 {
            info!("  Status server: disabled");
        } else {
            info!("  Status server: {}:{}", self.status_bind, self.status_port);
        }
        if let Some(path) = &self.datalog_file {
            info!("  Datalog file: {}", path);
        }
    }

    fn default_device() -> String {
        "/dev/ttyUSB0".to_string()
    }

    fn default_baud_rate() -> u32 {
        9600
    }

    fn default_address() -> u8 {
        0x0A
    }

    fn default_average_samples() -> usize {
        10
    }

    fn default_qos_samples() -> usize {
        100
    }

    fn default_online_timeout() -> u32 {
        30
    }

    fn default_poll_interval_ms() -> u64 {
        1000
    }

    fn default_status_port() -> u16 {
        6789
    }

    fn default_status_bind() -> String {
        "0.0.0.0".to_string()
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
        assert_eq!(Config::from_yaml("\n  \n").unwrap(), Config::default());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("address: 12\naverage_samples: 5\nlog_file: /tmp/x.log\n").unwrap();
        assert_eq!(config.address, 12);
        assert_eq!(config.average_samples, 5);
        assert_eq!(config.log_file.as_deref(), Some("/tmp/x.log"));
        assert_eq!(config.device, "/dev/ttyUSB0");
        assert_eq!(config.qos_samples, 100);
        assert_eq!(config.status_port, 6789);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_yaml("adress: 12\n").is_err());
    }

    #[test]
    fn validation() {
        assert!(Config::default().validate().is_ok());

        let bad = [
            Config { address: 0, ..Default::default() },
            Config { address: 248, ..Default::default() },
            Config { average_samples: 0, ..Default::default() },
            Config { average_samples: 101, ..Default::default() },
            Config { qos_samples: 0, average_samples: 0, ..Default::default() },
            Config { qos_samples: 10_001, ..Default::default() },
            Config { online_timeout: 0, ..Default::default() },
            Config { poll_interval_ms: 0, ..Default::default() },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }
}
