use nom::number::complete::{be_u16, be_u32};
use nom::IResult;

pub struct Utils;

impl Utils {
    pub fn round(x: f64, decimals: u32) -> f64 {
        let y = 10i64.pow(decimals) as f64;
        (x * y).round() / y
    }

    pub fn utc() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Formats bytes as upper-case hex pairs, with an extra space every 8 bytes:
    /// `" AA 55 00 0A 00 00 10 81  01 06 01 A1 "`.
    pub fn hex_dump(data: &[u8]) -> String {
        if data.is_empty() {
            return " No Data".to_string();
        }

        let mut r = String::with_capacity(data.len() * 3 + data.len() / 8 + 1);
        for (i, byte) in data.iter().enumerate() {
            if i % 8 == 0 {
                r.push(' ');
            }
            r.push_str(&format!("{:02X} ", byte));
        }
        r
    }

    pub fn be_u16_f64(input: &[u8]) -> IResult<&[u8], f64> {
        let (input, v) = be_u16(input)?;
        Ok((input, f64::from(v)))
    }

    pub fn be_u16_div10(input: &[u8]) -> IResult<&[u8], f64> {
        let (input, v) = be_u16(input)?;
        Ok((input, f64::from(v) / 10.0))
    }

    pub fn be_u16_div100(input: &[u8]) -> IResult<&[u8], f64> {
        let (input, v) = be_u16(input)?;
        Ok((input, f64::from(v) / 100.0))
    }

    pub fn be_u32_div10(input: &[u8]) -> IResult<&[u8], f64> {
        let (input, v) = be_u32(input)?;
        Ok((input, f64::from(v) / 10.0))
    }
}
