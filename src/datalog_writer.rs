use crate::prelude::*;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Appends one JSON line per poll cycle to a file.
#[derive(Debug)]
pub struct DatalogWriter {
    file: std::fs::File,
    path: String,
    records_written: u64,
}

impl DatalogWriter {
    pub fn new(path: &str) -> Result<Self> {
        info!("opening datalog file at {}", path);

        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                error!("failed to open datalog file {}: {}", path, e);
                return Err(e.into());
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)) {
                error!("failed to set permissions on datalog file {}: {}", path, e);
                return Err(e.into());
            }
        }

        Ok(Self::from_file(file, path))
    }

    /// Wraps an already opened file; `path` is only used in log messages.
    pub fn from_file(file: std::fs::File, path: &str) -> Self {
        Self {
            file,
            path: path.to_string(),
            records_written: 0,
        }
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        let inverter = &snapshot.inverter;

        let mut json_data = serde_json::Map::new();
        json_data.insert("utc_timestamp".to_string(), Utils::utc().into());
        json_data.insert("serial".to_string(), inverter.serial_number.clone().into());
        json_data.insert("address".to_string(), inverter.address.into());
        json_data.insert("online".to_string(), inverter.online.into());
        json_data.insert(
            "quality_of_service".to_string(),
            serde_json::to_value(inverter.quality_of_service)?,
        );
        json_data.insert("live_data".to_string(), serde_json::to_value(&inverter.live_data)?);

        let json_string = serde_json::to_string(&serde_json::Value::Object(json_data))?;

        if let Err(e) = writeln!(self.file, "{}", json_string).and_then(|_| self.file.flush()) {
            error!("failed to write to datalog file {}: {}", self.path, e);
            return Err(e.into());
        }

        self.records_written += 1;
        trace!("{} records stored in datalog file", self.records_written);

        Ok(())
    }
}
