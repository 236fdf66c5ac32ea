use crate::prelude::*;

use nom_derive::{Nom, Parse};
use serde::Serialize;

pub const PAYLOAD_LENGTH: usize = 50;

// {{{ LiveData
#[derive(Clone, Debug, Default, PartialEq, Serialize, Nom)]
#[nom(BigEndian)]
pub struct LiveData {
    #[nom(Parse = "Utils::be_u16_f64")]
    pub temperature: f64, // degC
    #[nom(Parse = "Utils::be_u16_div10")]
    pub energy_today: f64, // kWh
    #[nom(Parse = "Utils::be_u16_div10")]
    pub dc1_voltage: f64,
    #[nom(Parse = "Utils::be_u16_div10")]
    pub dc2_voltage: f64,
    #[nom(Parse = "Utils::be_u16_div10")]
    pub dc1_current: f64,
    #[nom(Parse = "Utils::be_u16_div10")]
    pub dc2_current: f64,
    #[nom(Parse = "Utils::be_u16_div10")]
    pub ac_current: f64,
    #[nom(Parse = "Utils::be_u16_div10")]
    pub ac_voltage: f64,
    #[nom(Parse = "Utils::be_u16_div100")]
    pub frequency: f64,
    #[nom(Parse = "Utils::be_u16_f64")]
    pub power: f64, // W

    #[nom(SkipBefore(2))] // unused
    #[nom(Parse = "Utils::be_u32_div10")]
    pub energy_total: f64, // kWh
    pub runtime_total: u32, // hours
    pub status: u16, // work mode

    // grid voltage/frequency, DCI, temperature, PV1/PV2 voltage and GFC fault values
    #[nom(SkipBefore(14))]
    #[nom(Parse = "nom::number::complete::le_u32")]
    pub error_bits: u32,
}
// }}}

/// One slot of live data. Slots that didn't come from a successful live-data
/// response are `valid == false` with all fields zeroed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LiveDataSample {
    pub valid: bool,
    pub data: LiveData,
}

impl LiveDataSample {
    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < PAYLOAD_LENGTH {
            return Err(DecodeError::InvalidFrame(format!(
                "live data payload too short ({} bytes, need {})",
                payload.len(),
                PAYLOAD_LENGTH
            )));
        }

        match LiveData::parse(payload) {
            Ok((_, data)) => Ok(Self { valid: true, data }),
            Err(e) => Err(DecodeError::InvalidFrame(format!(
                "unparseable live data: {:?}",
                e
            ))),
        }
    }

    pub fn log(&self) {
        let d = &self.data;
        debug!("LiveData.Temperature: {:.0} C", d.temperature);
        debug!("LiveData.Energy_Today: {:.1} kWh", d.energy_today);
        debug!("LiveData.DC1: {:.1} V {:.1} A", d.dc1_voltage, d.dc1_current);
        debug!("LiveData.DC2: {:.1} V {:.1} A", d.dc2_voltage, d.dc2_current);
        debug!("LiveData.AC: {:.1} V {:.1} A {:.2} Hz", d.ac_voltage, d.ac_current, d.frequency);
        debug!("LiveData.Power: {:.0} W", d.power);
        debug!("LiveData.Energy_Total: {:.1} kWh", d.energy_total);
        debug!("LiveData.Runtime_Total: {} h", d.runtime_total);
        debug!("LiveData.Status: {}", d.status);
        debug!("LiveData.ErrorBits: 0x{:08X}", d.error_bits);
    }
}

pub struct ErrorCodeString;
impl ErrorCodeString {
    /// Names of every error bit set in `value`, lowest bit first.
    pub fn from_value(value: u32) -> Vec<&'static str> {
        (0..32)
            .filter(|i| value & (1 << i) != 0)
            .map(Self::from_bit)
            .collect()
    }

    fn from_bit(bit: usize) -> &'static str {
        match bit {
            0 => "Tz Protection Fault",
            1 => "Mains Lost Fault",
            2 => "Grid Voltage Fault",
            3 => "Grid Frequency Fault",
            4 => "PLL Lost Fault",
            5 => "Bus Voltage Fault",
            6 => "Error Bit 06",
            7 => "Oscillator Fault",
            8 => "DCI OCP Fault",
            9 => "Residual Current Fault",
            10 => "PV Voltage Fault",
            11 => "Ac10Mins Voltage Fault",
            12 => "Isolation Fault",
            13 => "Over Temperature Fault",
            14 => "Ventilator Fault",
            15 => "Error Bit 15",
            16 => "SPI Communication Fault",
            17 => "SCI Communication Fault",
            18 => "Error Bit 18",
            19 => "Input Configuration Fault",
            20 => "EEPROM Fault",
            21 => "Relay Fault",
            22 => "Sample Consistence Fault",
            23 => "Residual-Current Device Fault",
            24 => "Error Bit 24",
            25 => "Error Bit 25",
            26 => "Error Bit 26",
            27 => "Error Bit 27",
            28 => "Error Bit 28",
            29 => "DCI Device Fault",
            30 => "Other Device Fault",
            _ => "Error Bit 31",
        }
    }
}
