use crate::prelude::*;

use crate::solax::frame::{self, ControlCode, FunctionCode};

pub const SERIAL_LENGTH: usize = 14;

pub const DISCOVER_MAX_FAILURES: u8 = 10;
pub const ASSIGN_MAX_FAILURES: u8 = 3;
pub const POLL_MAX_FAILURES: u8 = 3;

const MASTER_ADDRESS: u16 = 0x0100;
const ACK: u8 = 0x06;

// {{{ InverterIdentity
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct InverterIdentity {
    serial: [u8; SERIAL_LENGTH],
    pub address: u8,
}

impl InverterIdentity {
    pub fn new(serial: &[u8], address: u8) -> Result<Self> {
        if serial.len() > SERIAL_LENGTH {
            bail!(
                "serial number must be at most {} bytes, got {}",
                SERIAL_LENGTH,
                serial.len()
            );
        }

        let mut r = [0; SERIAL_LENGTH];
        r[..serial.len()].copy_from_slice(serial);
        Ok(Self { serial: r, address })
    }

    pub fn serial(&self) -> [u8; SERIAL_LENGTH] {
        self.serial
    }
}

impl std::fmt::Display for InverterIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let end = self
            .serial
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(SERIAL_LENGTH);
        write!(f, "{}", String::from_utf8_lossy(&self.serial[..end]))
    }
}

impl std::fmt::Debug for InverterIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@0x{:02X}", self, self.address)
    }
} // }}}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryState {
    Discover,
    Assigning,
    Polling,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryKind {
    Discover,
    AssignAddress,
    FetchLiveData,
}

impl QueryState {
    /// The request sent while in this state.
    pub fn query(self) -> QueryKind {
        match self {
            Self::Discover => QueryKind::Discover,
            Self::Assigning => QueryKind::AssignAddress,
            Self::Polling => QueryKind::FetchLiveData,
        }
    }

    fn max_failures(self) -> u8 {
        match self {
            Self::Discover => DISCOVER_MAX_FAILURES,
            Self::Assigning => ASSIGN_MAX_FAILURES,
            Self::Polling => POLL_MAX_FAILURES,
        }
    }

    fn on_success(self) -> Self {
        match self {
            Self::Discover => Self::Assigning,
            Self::Assigning | Self::Polling => Self::Polling,
        }
    }

    fn on_exhausted(self) -> Self {
        match self {
            Self::Discover | Self::Assigning | Self::Polling => Self::Discover,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Success,
    Failure,
}

// {{{ QueryMachine
/// Which query is in flight and how many times in a row it has failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct QueryMachine {
    pub state: QueryState,
    pub failures: u8,
}

impl Default for QueryMachine {
    // an inverter that kept its bus address answers polls without rediscovery
    fn default() -> Self {
        Self::new(QueryState::Polling)
    }
}

impl QueryMachine {
    pub fn new(state: QueryState) -> Self {
        Self { state, failures: 0 }
    }

    pub fn transition(self, outcome: Outcome) -> (Self, QueryKind) {
        let next = match outcome {
            Outcome::Success => Self::new(self.state.on_success()),
            Outcome::Failure => {
                let failures = self.failures.saturating_add(1);
                if failures >= self.state.max_failures() {
                    Self::new(self.state.on_exhausted())
                } else {
                    Self {
                        state: self.state,
                        failures,
                    }
                }
            }
        };

        (next, next.state.query())
    }
} // }}}

// {{{ OnlineState
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OnlineEvent {
    Online,
    Offline,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OnlineState {
    online: bool,
    timeout: u32,
    threshold: u32,
}

impl OnlineState {
    pub fn new(threshold: u32) -> Self {
        Self {
            online: false,
            timeout: threshold,
            threshold,
        }
    }

    pub fn online(&self) -> bool {
        self.online
    }

    pub fn timeout(&self) -> u32 {
        self.timeout
    }

    pub fn live_data_received(&mut self) {
        self.timeout = 0;
    }

    /// Advances the timeout by one cycle. Returns an event only on the cycle
    /// the classification flips.
    pub fn tick(&mut self) -> Option<OnlineEvent> {
        if self.online {
            self.timeout = self.timeout.saturating_add(1);
            if self.timeout >= self.threshold {
                self.online = false;
                return Some(OnlineEvent::Offline);
            }
        } else if self.timeout == 0 {
            self.online = true;
            return Some(OnlineEvent::Online);
        }

        None
    }
} // }}}

/// The interpreted response to last cycle's request.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Discovered(InverterIdentity),
    AddressConfirmed,
    LiveData(LiveDataSample),
    Failed(DecodeError),
}

impl Response {
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Failed(_) => Outcome::Failure,
            _ => Outcome::Success,
        }
    }

    pub fn interpret(
        state: QueryState,
        decoded: Result<Frame, DecodeError>,
        address: u8,
    ) -> Self {
        let frame = match decoded {
            Ok(frame) => frame,
            Err(e) => return Self::Failed(e),
        };

        match state {
            QueryState::Discover => {
                if !frame.is(ControlCode::Register, FunctionCode::DiscoverResponse) {
                    return Self::unexpected(state, &frame);
                }
                if frame.data.len() < SERIAL_LENGTH {
                    return Self::Failed(DecodeError::InvalidFrame(format!(
                        "discover response carries {} serial bytes",
                        frame.data.len()
                    )));
                }
                match InverterIdentity::new(&frame.data[..SERIAL_LENGTH], address) {
                    Ok(identity) => Self::Discovered(identity),
                    Err(e) => Self::Failed(DecodeError::InvalidFrame(e.to_string())),
                }
            }
            QueryState::Assigning => {
                if !frame.is(ControlCode::Register, FunctionCode::AssignAddressResponse) {
                    return Self::unexpected(state, &frame);
                }
                match frame.data.first() {
                    Some(&ACK) => Self::AddressConfirmed,
                    other => Self::Failed(DecodeError::InvalidFrame(format!(
                        "address not acknowledged ({:02X?})",
                        other
                    ))),
                }
            }
            QueryState::Polling => {
                if !frame.is(ControlCode::Read, FunctionCode::LiveDataResponse) {
                    return Self::unexpected(state, &frame);
                }
                match LiveDataSample::from_payload(&frame.data) {
                    Ok(sample) => Self::LiveData(sample),
                    Err(e) => Self::Failed(e),
                }
            }
        }
    }

    fn unexpected(state: QueryState, frame: &Frame) -> Self {
        Self::Failed(DecodeError::InvalidFrame(format!(
            "unexpected response to {:?}: control=0x{:02X} function=0x{:02X}",
            state.query(),
            frame.control_code,
            frame.function_code
        )))
    }
}

/// Builds the request frame for `kind`.
pub fn request(kind: QueryKind, identity: &InverterIdentity) -> Frame {
    match kind {
        QueryKind::Discover => Frame::new(
            MASTER_ADDRESS,
            0x0000,
            ControlCode::Register,
            FunctionCode::Discover,
            vec![],
        ),
        QueryKind::AssignAddress => {
            let mut data = identity.serial().to_vec();
            data.push(identity.address);
            Frame::new(
                0x0000,
                0x0000,
                ControlCode::Register,
                FunctionCode::AssignAddress,
                data,
            )
        }
        QueryKind::FetchLiveData => Frame::new(
            MASTER_ADDRESS,
            u16::from(identity.address),
            ControlCode::Read,
            FunctionCode::QueryLiveData,
            vec![],
        ),
    }
}

/// What one query cycle produced.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub sample: LiveDataSample,
    pub response: Response,
    pub event: Option<OnlineEvent>,
}

// {{{ QueryHandler
/// Owns the protocol conversation with one inverter: the state machine, the
/// captured identity and the online classification.
pub struct QueryHandler {
    machine: QueryMachine,
    identity: InverterIdentity,
    online: OnlineState,
    rx_buffer: Vec<u8>,
}

impl QueryHandler {
    pub fn new(address: u8, online_timeout: u32) -> Self {
        Self {
            machine: QueryMachine::default(),
            identity: InverterIdentity {
                serial: [0; SERIAL_LENGTH],
                address,
            },
            online: OnlineState::new(online_timeout),
            rx_buffer: vec![0; frame::MAX_FRAME_LENGTH],
        }
    }

    pub fn machine(&self) -> QueryMachine {
        self.machine
    }

    pub fn state(&self) -> QueryState {
        self.machine.state
    }

    pub fn identity(&self) -> &InverterIdentity {
        &self.identity
    }

    pub fn online(&self) -> bool {
        self.online.online()
    }

    /// One query cycle: receive the answer to the previous request, advance
    /// the state machine, then send the next request. Transport errors are
    /// returned as-is and are fatal to the caller; protocol errors are not.
    pub async fn cycle<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<CycleReport> {
        let len = transport.receive(&mut self.rx_buffer).await?;
        let decoded = Frame::decode(&self.rx_buffer[..len]);

        let state = self.machine.state;
        let response = Response::interpret(state, decoded, self.identity.address);

        let mut sample = LiveDataSample::invalid();
        match &response {
            Response::Discovered(identity) => {
                info!("inverter discovered, serial number {}", identity);
                self.identity = *identity;
            }
            Response::AddressConfirmed => {
                info!("inverter bus address 0x{:02X} confirmed", self.identity.address);
            }
            Response::LiveData(s) => {
                s.log();
                sample = s.clone();
                self.online.live_data_received();
            }
            Response::Failed(e) => {
                debug!("{:?} failed: {}", state.query(), e);
            }
        }

        let (machine, next) = self.machine.transition(response.outcome());
        if machine.state != state {
            debug!("query state {:?} -> {:?}", state, machine.state);
        }
        self.machine = machine;

        let event = self.online.tick();
        match event {
            Some(OnlineEvent::Online) => info!("inverter {} online, live data received", self.identity),
            Some(OnlineEvent::Offline) => info!("inverter {} offline", self.identity),
            None => {}
        }

        let bytes = request(next, &self.identity)
            .encode()
            .map_err(|e| file_error!("cannot encode {:?} request: {}", next, e))?;
        transport.send(&bytes).await?;

        Ok(CycleReport {
            sample,
            response,
            event,
        })
    }
} // }}}
