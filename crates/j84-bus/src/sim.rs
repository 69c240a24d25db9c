//! Simulated J1939 vehicle.
//!
//! A [`Bus`] backed by a set of [`SimEcu`]s. ECUs answer requests after a
//! short delay, segment long answers with BAM or RTS/CTS, run DM7 tests,
//! honour DM11 and broadcast periodic parameter groups. Everything is
//! scheduled on the tokio clock, so tests with a paused clock run a whole
//! sequence without waiting.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use j84_protocol::dtc::{DiagnosticTroubleCode, LampStatus, Lamps};
use j84_protocol::module::ModelYearKind;
use j84_protocol::spn::SupportedSpn;
use j84_protocol::test_result::{ScaledTestResult, TEST_LIMIT_NOT_AVAILABLE, TEST_VALUE_INITIALIZED};
use j84_protocol::vehicle::{FuelType, VehicleInformation};

use crate::error::{J1939Error, J1939Result};
use crate::interface::Bus;
use crate::packets::{
    AckControl, AcknowledgmentPacket, COMPLIANCE_NOT_OBD, ComponentIdPacket, Dm1, Dm2, Dm5, Dm6, Dm7, Dm12,
    Dm19, Dm23, Dm24, Dm28, Dm30, Dm56, J1939Message, TID_ALL_FOR_SPN, VinPacket,
};
use crate::pgn_db::{PGN_AMB, PGN_CCVS1, PGN_EEC1, PGN_EEC2, PGN_ET1, PGN_IC1, PGN_LFE1};
use crate::transport::{CM_ABORT, CM_CTS, CM_EOM_ACK, bam_frame, data_frames, rts_frame};
use crate::types::{
    CanFrame, GLOBAL_ADDR, PGN_ACK, PGN_COMPONENT_ID, PGN_DM1, PGN_DM2, PGN_DM5, PGN_DM6, PGN_DM7, PGN_DM11,
    PGN_DM12, PGN_DM19, PGN_DM23, PGN_DM24, PGN_DM28, PGN_DM30, PGN_DM56, PGN_ENGINE_HOURS, PGN_REQUEST,
    PGN_TP_CM, PGN_VIN, Packet,
};

/// Delay between a request and the answer.
const RESPONSE_DELAY: Duration = Duration::from_millis(10);

/// Gap between BAM data frames.
const BAM_FRAME_GAP: Duration = Duration::from_millis(50);

/// Gap between data frames released by a CTS.
const DT_FRAME_GAP: Duration = Duration::from_millis(1);

/// Broadcasts that fell due more than this long before a read are skipped.
const MISSED_GRACE: Duration = Duration::from_millis(2);

/// VIN of [`SimulatedVehicle::reference`].
pub const REFERENCE_VIN: &str = "1FUJGLDR2RLBP8834";

/// Scripted answer to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimResponse {
    Data(Vec<u8>),
    /// NACK destination-specific requests; stay quiet on global ones.
    Nack,
    /// Answer "cannot respond" `count` times, then with `payload`.
    Busy { count: u32, payload: Vec<u8> },
    Silent,
}

/// What an ECU does with a DM11 request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearBehavior {
    /// Acknowledge and clear fault memory.
    Ack,
    Nack,
    Silent,
}

/// Fault memory of a simulated ECU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultState {
    pub active: Vec<DiagnosticTroubleCode>,
    pub previously_active: Vec<DiagnosticTroubleCode>,
    pub pending: Vec<DiagnosticTroubleCode>,
    pub permanent: Vec<DiagnosticTroubleCode>,
    pub mil: LampStatus,
}

impl Default for FaultState {
    fn default() -> Self {
        Self {
            active: Vec::new(),
            previously_active: Vec::new(),
            pending: Vec::new(),
            permanent: Vec::new(),
            mil: LampStatus::Off,
        }
    }
}

#[derive(Debug, Clone)]
struct Periodic {
    pgn: u32,
    period: Duration,
    payload: Vec<u8>,
    next_due: Duration,
}

impl Periodic {
    /// Skip occurrences nobody was reading.
    fn catch_up(&mut self, now: Duration) {
        if self.next_due + MISSED_GRACE >= now {
            return;
        }
        let behind = now - MISSED_GRACE - self.next_due;
        let skipped = behind.as_nanos().div_ceil(self.period.as_nanos().max(1));
        self.next_due += self.period * skipped as u32;
    }
}

/// One answer leaving an ECU.
struct Reply {
    source: u8,
    destination: u8,
    pgn: u32,
    payload: Vec<u8>,
}

/// A simulated ECU.
#[derive(Debug, Clone)]
pub struct SimEcu {
    pub address: u8,
    pub faults: FaultState,
    /// DM5 readiness template; `None` for ECUs that do not answer DM5.
    readiness: Option<Dm5>,
    responses: HashMap<u32, SimResponse>,
    busy_served: HashMap<u32, u32>,
    broadcasts: Vec<Periodic>,
    test_results: BTreeMap<u32, Vec<ScaledTestResult>>,
    clear: ClearBehavior,
}

impl SimEcu {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            faults: FaultState::default(),
            readiness: None,
            responses: HashMap::new(),
            busy_served: HashMap::new(),
            broadcasts: Vec::new(),
            test_results: BTreeMap::new(),
            clear: ClearBehavior::Silent,
        }
    }

    /// Answer DM5 with `compliance`; OBD compliance also enables the
    /// generated DTC messages and DM11 handling.
    pub fn with_readiness(mut self, compliance: u8, continuous: u8, support: u16, status: u16) -> Self {
        self.readiness = Some(Dm5 {
            source: self.address,
            active_count: 0,
            previously_active_count: 0,
            obd_compliance: compliance,
            continuous,
            non_continuous_support: support,
            non_continuous_status: status,
        });
        if compliance != COMPLIANCE_NOT_OBD {
            self.clear = ClearBehavior::Ack;
        }
        self
    }

    pub fn respond(self, pgn: u32, payload: Vec<u8>) -> Self {
        self.with_response(pgn, SimResponse::Data(payload))
    }

    pub fn with_response(mut self, pgn: u32, response: SimResponse) -> Self {
        self.set_response(pgn, response);
        self
    }

    pub fn broadcast(mut self, pgn: u32, period: Duration, payload: Vec<u8>) -> Self {
        let stagger = Duration::from_millis(self.broadcasts.len() as u64);
        self.broadcasts.push(Periodic {
            pgn,
            period,
            payload,
            next_due: period + stagger,
        });
        self
    }

    pub fn with_test_results(mut self, spn: u32, results: Vec<ScaledTestResult>) -> Self {
        self.test_results.insert(spn, results);
        self
    }

    pub fn with_clear(mut self, clear: ClearBehavior) -> Self {
        self.clear = clear;
        self
    }

    pub fn set_response(&mut self, pgn: u32, response: SimResponse) {
        self.busy_served.remove(&pgn);
        self.responses.insert(pgn, response);
    }

    pub fn set_broadcast_period(&mut self, pgn: u32, period: Duration) {
        for p in self.broadcasts.iter_mut().filter(|p| p.pgn == pgn) {
            p.period = period;
        }
    }

    pub fn set_broadcast_payload(&mut self, pgn: u32, payload: Vec<u8>) {
        for p in self.broadcasts.iter_mut().filter(|p| p.pgn == pgn) {
            p.payload = payload.clone();
        }
    }

    pub fn remove_broadcast(&mut self, pgn: u32) {
        self.broadcasts.retain(|p| p.pgn != pgn);
    }

    pub fn set_test_results(&mut self, spn: u32, results: Vec<ScaledTestResult>) {
        self.test_results.insert(spn, results);
    }

    pub fn is_obd(&self) -> bool {
        self.readiness.as_ref().is_some_and(Dm5::is_obd)
    }

    fn lamps(&self) -> Lamps {
        Lamps {
            mil: self.faults.mil,
            ..Lamps::all_off()
        }
    }

    /// Payload derived from the fault state.
    fn generated(&self, pgn: u32) -> Option<Vec<u8>> {
        let f = &self.faults;
        if pgn == PGN_DM1 {
            return Some(Dm1::new(self.address, self.lamps(), f.active.clone()).to_payload());
        }
        if pgn == PGN_DM5 {
            return self.readiness.as_ref().map(|r| {
                Dm5 {
                    active_count: f.active.len() as u8,
                    previously_active_count: f.previously_active.len() as u8,
                    ..r.clone()
                }
                .to_payload()
            });
        }
        if !self.is_obd() {
            return None;
        }
        let lamps = self.lamps();
        let payload = match pgn {
            PGN_DM2 => Dm2::new(self.address, lamps, f.previously_active.clone()).to_payload(),
            PGN_DM6 => Dm6::new(self.address, lamps, f.pending.clone()).to_payload(),
            PGN_DM12 => Dm12::new(self.address, lamps, f.active.clone()).to_payload(),
            PGN_DM23 => Dm23::new(self.address, lamps, f.previously_active.clone()).to_payload(),
            PGN_DM28 => Dm28::new(self.address, lamps, f.permanent.clone()).to_payload(),
            _ => return None,
        };
        Some(payload)
    }

    /// DM11: erase fault history and reset test results.
    fn clear_faults(&mut self) {
        self.faults.previously_active.clear();
        self.faults.pending.clear();
        if self.faults.active.is_empty() {
            self.faults.mil = LampStatus::Off;
        }
        for result in self.test_results.values_mut().flatten() {
            result.value = TEST_VALUE_INITIALIZED;
            result.max = TEST_LIMIT_NOT_AVAILABLE;
            result.min = TEST_LIMIT_NOT_AVAILABLE;
        }
        tracing::debug!(address = self.address, "simulated ECU cleared");
    }

    fn reply(&self, destination: u8, pgn: u32, payload: Vec<u8>) -> Reply {
        Reply {
            source: self.address,
            destination,
            pgn,
            payload,
        }
    }

    fn ack(&self, control: AckControl, requester: u8, pgn: u32) -> Reply {
        let ack = AcknowledgmentPacket::new(self.address, control, requester, pgn);
        self.reply(GLOBAL_ADDR, PGN_ACK, ack.to_payload())
    }

    fn answer_request(&mut self, pgn: u32, requester: u8, global: bool) -> Option<Reply> {
        if pgn == PGN_DM11 {
            return match self.clear {
                ClearBehavior::Ack => {
                    self.clear_faults();
                    Some(self.ack(AckControl::Ack, requester, pgn))
                }
                ClearBehavior::Nack => Some(self.ack(AckControl::Nack, requester, pgn)),
                ClearBehavior::Silent => None,
            };
        }

        let target = if global { GLOBAL_ADDR } else { requester };
        let response = self
            .responses
            .get(&pgn)
            .cloned()
            .or_else(|| self.generated(pgn).map(SimResponse::Data));

        match response {
            Some(SimResponse::Data(payload)) => Some(self.reply(target, pgn, payload)),
            Some(SimResponse::Busy { count, payload }) => {
                let served = self.busy_served.entry(pgn).or_insert(0);
                if *served < count && !global {
                    *served += 1;
                    Some(self.ack(AckControl::CannotRespond, requester, pgn))
                } else {
                    Some(self.reply(target, pgn, payload))
                }
            }
            Some(SimResponse::Nack) | None if !global => Some(self.ack(AckControl::Nack, requester, pgn)),
            _ => None,
        }
    }

    fn answer_dm7(&self, command: &Dm7, requester: u8) -> Option<Reply> {
        match self.responses.get(&PGN_DM7) {
            Some(SimResponse::Silent) => return None,
            Some(SimResponse::Nack) => return Some(self.ack(AckControl::Nack, requester, PGN_DM7)),
            _ => {}
        }
        match self.test_results.get(&command.spn) {
            Some(results) if command.test_id == TID_ALL_FOR_SPN => {
                let dm30 = Dm30 {
                    source: self.address,
                    results: results.clone(),
                };
                Some(self.reply(requester, PGN_DM30, dm30.to_payload()))
            }
            _ => Some(self.ack(AckControl::Nack, requester, PGN_DM7)),
        }
    }
}

#[derive(Debug)]
struct Scheduled {
    due: Duration,
    seq: u64,
    frame: CanFrame,
}

#[derive(Debug)]
struct Outbound {
    pgn: u32,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct SimState {
    ecus: Vec<SimEcu>,
    queue: Vec<Scheduled>,
    /// RTS/CTS sessions keyed by (ECU, receiver).
    outbound: HashMap<(u8, u8), Outbound>,
    seq: u64,
}

impl SimState {
    fn push(&mut self, due: Duration, frame: CanFrame) {
        self.seq += 1;
        self.queue.push(Scheduled {
            due,
            seq: self.seq,
            frame,
        });
    }

    fn schedule(&mut self, reply: Reply, at: Duration) {
        let Reply {
            source,
            destination,
            pgn,
            payload,
        } = reply;
        if payload.len() <= 8 {
            self.push(at, Packet::new(pgn, source, destination, payload).to_frame());
        } else if destination == GLOBAL_ADDR {
            self.push(at, bam_frame(pgn, source, payload.len()));
            for (i, frame) in data_frames(source, GLOBAL_ADDR, &payload).into_iter().enumerate() {
                self.push(at + BAM_FRAME_GAP * (i as u32 + 1), frame);
            }
        } else {
            self.push(at, rts_frame(pgn, source, destination, payload.len()));
            self.outbound.insert((source, destination), Outbound { pgn, payload });
        }
    }

    fn on_request(&mut self, pgn: u32, requester: u8, destination: u8, now: Duration) {
        let global = destination == GLOBAL_ADDR;
        let replies: Vec<Reply> = self
            .ecus
            .iter_mut()
            .filter(|e| global || e.address == destination)
            .filter_map(|e| e.answer_request(pgn, requester, global))
            .collect();
        for (i, reply) in replies.into_iter().enumerate() {
            self.schedule(reply, now + RESPONSE_DELAY + Duration::from_millis(i as u64));
        }
    }

    fn on_dm7(&mut self, frame: &CanFrame, now: Duration) {
        let packet = Packet::from_frame(frame, now);
        let Ok(command) = Dm7::parse(&packet) else {
            return;
        };
        let reply = self
            .ecus
            .iter()
            .find(|e| e.address == packet.destination)
            .and_then(|e| e.answer_dm7(&command, packet.source));
        if let Some(reply) = reply {
            self.schedule(reply, now + RESPONSE_DELAY);
        }
    }

    fn on_transport_control(&mut self, frame: &CanFrame, now: Duration) {
        if frame.data.len() < 8 {
            return;
        }
        let id = frame.j1939_id();
        let key = (id.destination, id.source);
        match frame.data[0] {
            CM_CTS => {
                let Some(out) = self.outbound.get(&key) else {
                    return;
                };
                let count = frame.data[1] as usize;
                let first = (frame.data[2] as usize).saturating_sub(1);
                let frames: Vec<CanFrame> = data_frames(key.0, key.1, &out.payload)
                    .into_iter()
                    .skip(first)
                    .take(count)
                    .collect();
                for (i, f) in frames.into_iter().enumerate() {
                    self.push(now + DT_FRAME_GAP * (i as u32 + 1), f);
                }
            }
            CM_EOM_ACK => {
                self.outbound.remove(&key);
            }
            CM_ABORT => {
                if let Some(out) = self.outbound.remove(&key) {
                    tracing::debug!(source = key.0, pgn = out.pgn, "simulated transport aborted by receiver");
                }
            }
            _ => {}
        }
    }

    fn catch_up(&mut self, now: Duration) {
        for p in self.ecus.iter_mut().flat_map(|e| e.broadcasts.iter_mut()) {
            p.catch_up(now);
        }
    }

    fn next_due(&self) -> Option<Duration> {
        let queued = self.queue.iter().map(|s| s.due);
        let periodic = self
            .ecus
            .iter()
            .flat_map(|e| e.broadcasts.iter().map(|p| p.next_due));
        queued.chain(periodic).min()
    }

    /// Take the earliest frame due at or before `now`.
    fn pop_due(&mut self, now: Duration) -> Option<CanFrame> {
        let queued = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, s)| s.due <= now)
            .min_by_key(|(_, s)| (s.due, s.seq))
            .map(|(i, s)| (i, s.due));
        let periodic = self
            .ecus
            .iter()
            .enumerate()
            .flat_map(|(e, ecu)| {
                ecu.broadcasts
                    .iter()
                    .enumerate()
                    .map(move |(b, p)| (e, b, p.next_due))
            })
            .filter(|&(_, _, due)| due <= now)
            .min_by_key(|&(_, _, due)| due);

        match (queued, periodic) {
            (Some((i, q)), Some((_, _, p))) if q <= p => Some(self.queue.remove(i).frame),
            (Some((i, _)), None) => Some(self.queue.remove(i).frame),
            (_, Some((e, b, due))) => {
                let ecu = &mut self.ecus[e];
                let address = ecu.address;
                let pgn = ecu.broadcasts[b].pgn;
                // An empty DM1 template follows the fault state.
                let payload = if pgn == PGN_DM1 && ecu.broadcasts[b].payload.is_empty() {
                    ecu.generated(PGN_DM1).unwrap_or_default()
                } else {
                    ecu.broadcasts[b].payload.clone()
                };
                let period = ecu.broadcasts[b].period;
                ecu.broadcasts[b].next_due += period;

                if payload.len() <= 8 {
                    Some(Packet::new(pgn, address, GLOBAL_ADDR, payload).to_frame())
                } else {
                    let reply = Reply {
                        source: address,
                        destination: GLOBAL_ADDR,
                        pgn,
                        payload,
                    };
                    self.schedule(reply, due);
                    self.pop_due(now)
                }
            }
            (None, None) => None,
        }
    }
}

/// A vehicle network of simulated ECUs.
pub struct SimulatedVehicle {
    epoch: Instant,
    state: Mutex<SimState>,
}

impl SimulatedVehicle {
    pub fn new(ecus: Vec<SimEcu>) -> Self {
        Self {
            epoch: Instant::now(),
            state: Mutex::new(SimState {
                ecus,
                ..SimState::default()
            }),
        }
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Modify the ECU at `address`; returns false when there is none.
    pub fn with_ecu(&self, address: u8, f: impl FnOnce(&mut SimEcu)) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.ecus.iter_mut().find(|e| e.address == address) {
            Some(ecu) => {
                f(ecu);
                true
            }
            None => false,
        }
    }

    pub fn add_ecu(&self, ecu: SimEcu) {
        self.state.lock().unwrap().ecus.push(ecu);
    }

    pub fn remove_ecu(&self, address: u8) {
        self.state.lock().unwrap().ecus.retain(|e| e.address != address);
    }

    /// Copy of an ECU's current state.
    pub fn ecu(&self, address: u8) -> Option<SimEcu> {
        self.state
            .lock()
            .unwrap()
            .ecus
            .iter()
            .find(|e| e.address == address)
            .cloned()
    }

    /// Facts matching [`SimulatedVehicle::reference`].
    pub fn reference_info() -> VehicleInformation {
        VehicleInformation {
            vin: REFERENCE_VIN.to_string(),
            model_year: 2024,
            engine_model_year: 2024,
            fuel_type: FuelType::Diesel,
            calibrations: 2,
            obd_modules: 2,
        }
    }

    /// Compliant model year 2024 diesel: engine (0x00) and aftertreatment
    /// (0x3D) OBD ECUs plus a non-OBD instrument cluster (0x17).
    pub fn reference() -> Self {
        Self::new(vec![reference_engine(), reference_aftertreatment(), reference_cluster()])
    }
}

const HD_OBD: u8 = 0x13;

fn supported(spn: u32, length: u8, data_stream: bool, freeze_frame: bool, test_results: bool) -> SupportedSpn {
    SupportedSpn {
        spn,
        length,
        data_stream,
        freeze_frame,
        scaled_test_results: test_results,
    }
}

fn initialized_result(spn: u32, fmi: u8, slot_id: u16) -> ScaledTestResult {
    ScaledTestResult {
        test_id: TID_ALL_FOR_SPN,
        spn,
        fmi,
        slot_id,
        value: TEST_VALUE_INITIALIZED,
        max: TEST_LIMIT_NOT_AVAILABLE,
        min: TEST_LIMIT_NOT_AVAILABLE,
    }
}

fn reference_engine() -> SimEcu {
    let address = 0x00;
    let dm24 = Dm24::new(
        address,
        vec![
            supported(84, 2, true, false, false),
            supported(91, 1, true, false, false),
            supported(92, 1, true, true, false),
            supported(102, 1, true, false, false),
            supported(108, 1, true, false, false),
            supported(110, 1, true, true, false),
            supported(183, 2, true, false, false),
            supported(190, 2, true, true, false),
            supported(247, 4, true, false, false),
            supported(512, 1, true, false, false),
            supported(513, 1, true, true, false),
            supported(3058, 1, false, false, true),
        ],
    );
    let dm19 = Dm19::new(address, vec![Dm19::calibration("ENG-CAL-2024A", 0x5A3C_19E2)]);

    SimEcu::new(address)
        .with_readiness(HD_OBD, 0x07, 0x0280, 0x0000)
        .respond(PGN_DM24, dm24.to_payload())
        .respond(PGN_VIN, VinPacket::new(address, REFERENCE_VIN).to_payload())
        .respond(PGN_DM56, Dm56::new(address, 2024, ModelYearKind::Engine, "RCEXH0912AAB").to_payload())
        .respond(PGN_DM19, dm19.to_payload())
        .respond(
            PGN_COMPONENT_ID,
            ComponentIdPacket::new(address, "CMMNS", "X15", "79123456", "1234").to_payload(),
        )
        .respond(PGN_ENGINE_HOURS, vec![0x10, 0x27, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF])
        .with_test_results(3058, vec![initialized_result(3058, 18, 242)])
        .broadcast(PGN_EEC1, Duration::from_millis(10), vec![0xF0, 0x7D, 0x82, 0x40, 0x1F, 0xFF, 0xFF, 0xFF])
        .broadcast(PGN_EEC2, Duration::from_millis(50), vec![0xFF, 0x00, 0x14, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF])
        .broadcast(PGN_CCVS1, Duration::from_millis(100), vec![0xFF, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF])
        .broadcast(PGN_LFE1, Duration::from_millis(100), vec![0x64, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF])
        .broadcast(PGN_IC1, Duration::from_millis(500), vec![0xFF, 0x32, 0x46, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF])
        .broadcast(PGN_ET1, Duration::from_millis(1000), vec![0x5A, 0xFF, 0x20, 0x26, 0xFF, 0xFF, 0xFF, 0xFF])
        .broadcast(PGN_AMB, Duration::from_millis(1000), vec![0xC9, 0xFF, 0xFF, 0x60, 0x25, 0xFF, 0xFF, 0xFF])
        .broadcast(PGN_DM1, Duration::from_millis(1000), Vec::new())
}

fn reference_aftertreatment() -> SimEcu {
    let address = 0x3D;
    let dm24 = Dm24::new(
        address,
        vec![
            supported(3226, 2, false, false, true),
            supported(4364, 1, false, false, true),
        ],
    );
    let dm19 = Dm19::new(address, vec![Dm19::calibration("ATS-CAL-0117", 0x0C44_7B01)]);

    SimEcu::new(address)
        .with_readiness(HD_OBD, 0x04, 0x1C20, 0x0000)
        .respond(PGN_DM24, dm24.to_payload())
        .respond(PGN_DM19, dm19.to_payload())
        .with_test_results(
            3226,
            vec![initialized_result(3226, 18, 242), initialized_result(3226, 16, 242)],
        )
        .with_test_results(4364, vec![initialized_result(4364, 18, 261)])
        .broadcast(PGN_DM1, Duration::from_millis(1000), Vec::new())
}

fn reference_cluster() -> SimEcu {
    SimEcu::new(0x17)
        .with_readiness(COMPLIANCE_NOT_OBD, 0x00, 0x0000, 0x0000)
        .broadcast(PGN_DM1, Duration::from_millis(1000), Vec::new())
}

#[async_trait]
impl Bus for SimulatedVehicle {
    async fn send_frame(&self, frame: &CanFrame) -> J1939Result<()> {
        let id = frame.j1939_id();
        let now = self.now();
        let mut state = self.state.lock().unwrap();
        match id.pgn {
            PGN_REQUEST => {
                let packet = Packet::from_frame(frame, now);
                if let Some(pgn) = packet.pgn_at(0) {
                    state.on_request(pgn, id.source, id.destination, now);
                }
            }
            PGN_DM7 => state.on_dm7(frame, now),
            PGN_TP_CM => state.on_transport_control(frame, now),
            _ => {}
        }
        Ok(())
    }

    async fn recv_frame(&self, timeout: Duration) -> J1939Result<CanFrame> {
        let deadline = self.now() + timeout;
        self.state.lock().unwrap().catch_up(self.now());

        loop {
            let next = self.state.lock().unwrap().next_due();
            match next {
                Some(due) if due <= deadline => {
                    tokio::time::sleep_until(self.epoch + due).await;
                    let frame = self.state.lock().unwrap().pop_due(self.now());
                    if let Some(frame) = frame {
                        return Ok(frame);
                    }
                }
                _ => {
                    tokio::time::sleep_until(self.epoch + deadline).await;
                    return Err(J1939Error::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            }
        }
    }
}
