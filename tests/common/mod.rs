#![allow(dead_code)]

use solax_bridge::prelude::*;
use solax_bridge::solax::frame::{ControlCode, FunctionCode};

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory;
impl Factory {
    pub const SERIAL: &'static [u8; 14] = b"12345677654321";

    pub fn config() -> Config {
        Config {
            status_port: 0,
            ..Default::default()
        }
    }

    /// Live data payload with everything zero except power and today's energy.
    pub fn payload(power: u16, energy_today: u16) -> Vec<u8> {
        let mut r = vec![0; solax::live_data::PAYLOAD_LENGTH];
        r[2..4].copy_from_slice(&energy_today.to_be_bytes());
        r[18..20].copy_from_slice(&power.to_be_bytes());
        r
    }

    pub fn encode(frame: Frame) -> Vec<u8> {
        frame.encode().unwrap().to_vec()
    }

    pub fn discover_reply(serial: &[u8]) -> Vec<u8> {
        Self::encode(Frame::new(
            0x00FF,
            0x0100,
            ControlCode::Register,
            FunctionCode::DiscoverResponse,
            serial.to_vec(),
        ))
    }

    pub fn address_reply(status: u8) -> Vec<u8> {
        Self::encode(Frame::new(
            0x000A,
            0x0000,
            ControlCode::Register,
            FunctionCode::AssignAddressResponse,
            vec![status],
        ))
    }

    pub fn address_ack() -> Vec<u8> {
        Self::address_reply(0x06)
    }

    pub fn live_data_reply(payload: Vec<u8>) -> Vec<u8> {
        Self::encode(Frame::new(
            0x000A,
            0x0100,
            ControlCode::Read,
            FunctionCode::LiveDataResponse,
            payload,
        ))
    }

    /// Live data response captured from an X1 Mini.
    pub fn captured_live_data() -> Vec<u8> {
        let mut r = vec![
            0xAA, 0x55, 0x00, 0x0A, 0x01, 0x00, 0x11, 0x82, 0x32, 0x00, 0x0B, 0x00, 0x01, 0x06,
            0xDD, 0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00, 0x15, 0x09, 0x21, 0x13, 0x87, 0x01,
            0xE7, 0xFF, 0xFF, 0x00, 0x00, 0x12, 0xD3, 0x00, 0x00, 0x0A, 0x0F, 0x00, 0x02,
        ];
        r.resize(9 + 50, 0);
        r.extend_from_slice(&[0x07, 0x9C]);
        r
    }
}
