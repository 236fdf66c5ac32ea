use crate::prelude::*;

use serde::Serialize;
use serde_with::{serde_as, BoolFromInt};

/// Published view of the inverter after each poll cycle, already rounded to
/// the precision it is reported with.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub inverter: InverterStatus,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InverterStatus {
    pub address: u8,
    #[serde_as(as = "BoolFromInt")]
    pub online: bool,
    pub quality_of_service: f64,
    pub serial_number: String,
    pub live_data: LiveDataReport,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LiveDataReport {
    pub temperature: i64,
    pub dc1_voltage: f64,
    pub dc1_current: f64,
    pub dc2_voltage: f64,
    pub dc2_current: f64,
    pub ac_voltage: f64,
    pub ac_current: f64,
    pub frequency: f64,
    pub power: i64,
    pub energy_today: f64,
    pub energy_total: f64,
    pub runtime_total: u32,
    pub status: u16,
    pub error_bits: u32,
}

impl From<&LiveData> for LiveDataReport {
    fn from(d: &LiveData) -> Self {
        Self {
            temperature: d.temperature.round() as i64,
            dc1_voltage: Utils::round(d.dc1_voltage, 1),
            dc1_current: Utils::round(d.dc1_current, 1),
            dc2_voltage: Utils::round(d.dc2_voltage, 1),
            dc2_current: Utils::round(d.dc2_current, 1),
            ac_voltage: Utils::round(d.ac_voltage, 1),
            ac_current: Utils::round(d.ac_current, 1),
            frequency: Utils::round(d.frequency, 2),
            power: d.power.round() as i64,
            energy_today: Utils::round(d.energy_today, 1),
            energy_total: Utils::round(d.energy_total, 1),
            runtime_total: d.runtime_total,
            status: d.status,
            error_bits: d.error_bits,
        }
    }
}

impl Snapshot {
    pub fn new(identity: &InverterIdentity, online: bool, quality_of_service: f64, data: &LiveData) -> Self {
        Self {
            inverter: InverterStatus {
                address: identity.address,
                online,
                quality_of_service: Utils::round(quality_of_service, 2),
                serial_number: identity.to_string(),
                live_data: data.into(),
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_nested_with_rounding() {
        let identity = InverterIdentity::new(b"12345677654321", 0x0A).unwrap();
        let data = LiveData {
            temperature: 11.4,
            energy_today: 1.1,
            dc1_voltage: 175.66,
            frequency: 49.987,
            power: 1756.6,
            energy_total: 481.94,
            runtime_total: 2575,
            status: 2,
            error_bits: 0x201,
            ..Default::default()
        };

        let snapshot = Snapshot::new(&identity, true, 0.574, &data);
        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();

        let inverter = &json["inverter"];
        assert_eq!(inverter["address"], 10);
        assert_eq!(inverter["online"], 1);
        assert_eq!(inverter["quality_of_service"], 0.57);
        assert_eq!(inverter["serial_number"], "12345677654321");

        let live = &inverter["live_data"];
        assert_eq!(live["temperature"], 11);
        assert_eq!(live["dc1_voltage"], 175.7);
        assert_eq!(live["frequency"], 49.99);
        assert_eq!(live["power"], 1757);
        assert_eq!(live["energy_today"], 1.1);
        assert_eq!(live["energy_total"], 481.9);
        assert_eq!(live["runtime_total"], 2575);
        assert_eq!(live["status"], 2);
        assert_eq!(live["error_bits"], 513);
    }

    #[test]
    fn offline_is_zero() {
        let json = Snapshot::default().to_json().unwrap();
        assert!(json.contains("\"online\":0"));
        assert!(json.contains("\"serial_number\":\"\""));
    }
}
