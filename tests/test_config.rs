mod common;
use common::*;
use solax_bridge::prelude::*;
use std::io::Write;

fn options(args: &[&str]) -> Options {
    use clap::Parser;
    Options::try_parse_from(std::iter::once("solax-bridge").chain(args.iter().copied())).unwrap()
}

#[test]
fn defaults_without_config_file() -> Result<()> {
    common_setup();

    let config = Config::load(&options(&[]))?;
    assert_eq!(config, Config::default());
    assert_eq!(config.poll_interval().as_millis(), 1000);
    assert_eq!(config.read_timeout().as_millis(), 0);

    Ok(())
}

#[test]
fn command_line_overrides_file() -> Result<()> {
    common_setup();

    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "device: /dev/ttyS0")?;
    writeln!(file, "address: 20")?;
    writeln!(file, "average_samples: 4")?;
    writeln!(file, "status_port: 8080")?;
    let path = file.path().to_string_lossy().to_string();

    let config = Config::load(&options(&["-c", &path]))?;
    assert_eq!(config.device, "/dev/ttyS0");
    assert_eq!(config.address, 20);
    assert_eq!(config.average_samples, 4);
    assert_eq!(config.status_port, 8080);

    let config = Config::load(&options(&["-c", &path, "-d", "/dev/ttyUSB1", "-a", "3", "-s", "7", "-p", "0", "-x"]))?;
    assert_eq!(config.device, "/dev/ttyUSB1");
    assert_eq!(config.address, 3);
    assert_eq!(config.average_samples, 7);
    assert_eq!(config.status_port, 0);
    assert!(config.simulate);

    Ok(())
}

#[test]
fn invalid_values_are_rejected() {
    common_setup();

    assert!(Config::load(&options(&["-a", "0"])).is_err());
    assert!(Config::load(&options(&["-s", "0"])).is_err());
    assert!(Config::load(&options(&["-s", "101"])).is_err());
    assert!(Config::load(&options(&["-c", "/nonexistent/solax.yaml"])).is_err());
}
