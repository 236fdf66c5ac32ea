use clap::Parser;

/// solax-bridge - polls a SolaX inverter over RS485 and publishes its live data
#[derive(Debug, Default, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config")]
    pub config_file: Option<String>,

    /// Serial device the RS485 adapter is attached to
    #[clap(short = 'd', long = "device")]
    pub device: Option<String>,

    /// Bus address to assign to the inverter (1-247)
    #[clap(short = 'a', long = "address")]
    pub address: Option<u8>,

    /// Status server port, 0 disables it
    #[clap(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Number of poll cycles to average over
    #[clap(short = 's', long = "samples")]
    pub samples: Option<usize>,

    /// Replay captured inverter responses instead of opening the device
    #[clap(short = 'x', long = "simulate")]
    pub simulate: bool,

    /// Optional runtime limit in seconds
    #[clap(short = 't', long = "time")]
    pub runtime: Option<u64>,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}
