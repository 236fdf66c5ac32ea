pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::convert::TryFrom;
pub use std::str::FromStr;

pub use crate::config::{self, Config};
pub use crate::options::Options;
pub use crate::utils::Utils;
pub use crate::{file_error, file_error_with_source};

pub use crate::history::History;
pub use crate::snapshot::Snapshot;
pub use crate::solax::{
    self,
    frame::{DecodeError, Frame},
    live_data::{LiveData, LiveDataSample},
    query::{InverterIdentity, QueryKind, QueryState},
    transport::Transport,
};
