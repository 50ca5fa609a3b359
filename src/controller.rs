//! The ground controller: per-tick reservation scheduling, proximity
//! speed adjustments and the instruction dialogue.

use crate::geom;
use crate::network::TaxiNetwork;
use crate::radio::{AtcMessage, MessageDirection, TransmissionGate, TransmissionSink};
use crate::record::{Instruction, Leg, Pose, SpeedConstraint, TaxiState, TrafficRecord};
use crate::registry::TrafficRegistry;
use crate::util::Interval;
use crate::vehicle::{TakeoffStatus, VehicleHandle};
use crate::{ParticipantId, SegmentId};
use smallvec::SmallVec;
use std::ops::RangeInclusive;

/// Only traffic within this cone around the heading counts as ahead, in
/// degrees to either side.
const AHEAD_CONE_DEG: f64 = 60.0;

/// Minimum quiet interval before the main dialogue may transmit, in s.
const DIALOGUE_INTERVAL: f64 = 15.0;

/// Minimum quiet interval before hold/resume instructions, in s.
const HOLD_RESUME_INTERVAL: f64 = 2.0;

/// Safety margin subtracted from every reservation end time, in s.
const RESERVATION_MARGIN: f64 = 30.0;

/// Look-ahead for blocked segments, as a multiple of the turn radius.
const BLOCK_LOOKAHEAD_RADII: f64 = 4.0;

/// Scratch buffer for one participant's route.
type RouteBuf = SmallVec<[SegmentId; 16]>;

/// Coordinates the traffic on one taxi network.
///
/// The controller owns the network and two registries: the active traffic
/// it manages, and the handoff traffic already past the tower switch. One
/// [update](Self::update) call per tick runs the reservation scheduler;
/// the driver then calls [update_participant](Self::update_participant)
/// for each active participant.
pub struct GroundController {
    /// The taxi network and its reservation tables.
    network: TaxiNetwork,
    /// The traffic under this controller.
    active: TrafficRegistry,
    /// Traffic already handed off to the tower frequency.
    handoff: TrafficRegistry,
    /// The shared transmission rate limiter.
    gate: TransmissionGate,
    /// Where decided transmissions go.
    sink: Box<dyn TransmissionSink>,
    /// The externally-controlled participant, if any.
    user: Option<ParticipantId>,
}

impl GroundController {
    /// Creates a controller for the given network.
    pub fn new(network: TaxiNetwork, sink: Box<dyn TransmissionSink>) -> Self {
        Self {
            network,
            active: TrafficRegistry::new(),
            handoff: TrafficRegistry::new(),
            gate: TransmissionGate::new(),
            sink,
            user: None,
        }
    }

    /// The taxi network.
    pub fn network(&self) -> &TaxiNetwork {
        &self.network
    }

    /// The traffic under this controller.
    pub fn active_traffic(&self) -> &TrafficRegistry {
        &self.active
    }

    /// The traffic already handed off to the tower frequency.
    pub fn handoff_traffic(&self) -> &TrafficRegistry {
        &self.handoff
    }

    /// Declares which participant is externally controlled. Its air-side
    /// transmissions wait for the sink's acknowledgement channel.
    pub fn set_user(&mut self, id: ParticipantId) {
        self.user = Some(id);
    }

    /// Registers a participant, or refreshes its route and pose.
    ///
    /// Call once when the participant first contacts ground, then again
    /// each time it moves onto a new segment. `radius`, `leg` and the
    /// vehicle handle are fixed by the first call.
    pub fn announce(
        &mut self,
        id: ParticipantId,
        route: &[SegmentId],
        current: Option<SegmentId>,
        pose: Pose,
        radius: f64,
        leg: Leg,
        vehicle: Option<VehicleHandle>,
    ) {
        if let Some(record) = self.active.get_mut(id) {
            record.set_position_and_intentions(current, route);
            record.set_pose(pose);
            return;
        }
        let mut record = TrafficRecord::new(id, radius, leg, vehicle);
        record.set_position_and_intentions(current, route);
        record.set_pose(pose);
        self.active.insert(record);
    }

    /// Retires a participant.
    pub fn sign_off(&mut self, id: ParticipantId) {
        if self.active.remove(id).is_none() {
            log::error!("participant {id} without traffic record is signing off");
        }
    }

    /// Registers or refreshes a participant on the handoff registry, for
    /// traffic announced by the tower side rather than migrated from here.
    pub fn announce_handoff(&mut self, id: ParticipantId, pose: Pose, radius: f64) {
        if let Some(record) = self.handoff.get_mut(id) {
            record.set_pose(pose);
            return;
        }
        let mut record = TrafficRecord::new(id, radius, Leg::TaxiOut, None);
        record.set_pose(pose);
        self.handoff.insert(record);
    }

    /// Retires a participant from the handoff registry.
    pub fn sign_off_handoff(&mut self, id: ParticipantId) {
        if self.handoff.remove(id).is_none() {
            log::error!("participant {id} without handoff record is signing off");
        }
    }

    /// Whether the participant has an instruction in force.
    pub fn has_instruction(&self, id: ParticipantId) -> bool {
        match self.active.get(id) {
            Some(record) => !record.instruction().is_empty(),
            None => {
                log::error!("checking instruction for participant {id} without traffic record");
                false
            }
        }
    }

    /// The instructions currently in force for the participant.
    pub fn instruction(&self, id: ParticipantId) -> Instruction {
        match self.active.get(id) {
            Some(record) => record.instruction(),
            None => {
                log::error!("requesting instruction for participant {id} without traffic record");
                Instruction::default()
            }
        }
    }

    /// Runs the reservation scheduler for one tick.
    ///
    /// Expired reservations are dropped, then pushback traffic is
    /// processed ahead of active traffic, assigning priority ranks in
    /// processing order and reserving each participant's route.
    pub fn update(&mut self, now: f64) {
        self.network.unblock_expired(now);
        let mut priority = 1;

        // Gate-area traffic goes first to keep the aprons clear.
        for id in self.scheduled_ids(true) {
            self.update_pushback_record(id, &mut priority, now);
        }
        for id in self.scheduled_ids(false) {
            self.update_active_record(id, &mut priority, now);
        }
    }

    fn scheduled_ids(&self, pushback: bool) -> Vec<ParticipantId> {
        self.active
            .iter()
            .filter(|record| (record.leg() == Leg::Pushback) == pushback)
            .map(|record| record.id())
            .collect()
    }

    /// Schedules one pushback participant: denies the pushback while an
    /// active route runs against it, otherwise reserves its entry route.
    fn update_pushback_record(&mut self, id: ParticipantId, priority: &mut u32, now: f64) {
        let Some(record) = self.active.get_mut(id) else {
            return;
        };
        let Some(vehicle) = record.vehicle().cloned() else {
            log::error!("pushback scheduling: participant {id} has no vehicle");
            return;
        };
        record.allow_pushback();
        record.set_priority(*priority);
        *priority += 1;

        let taxi_speed = vehicle.borrow().taxi_speed();
        if taxi_speed <= 0.0 {
            log::error!("pushback scheduling: participant {id} reports no taxi speed");
            return;
        }
        let Some(current) = record.current_segment() else {
            return;
        };

        // Pushing back against a segment some active participant is about
        // to use must wait until that traffic has passed.
        if let Some(opposing) = self.network.find_opposite(current) {
            let conflict = self
                .active
                .iter()
                .filter(|other| other.id() != id && other.leg() != Leg::Pushback)
                .any(|other| {
                    other.current_segment() == Some(opposing)
                        || other.intentions().contains(&opposing)
                });
            if conflict {
                self.active
                    .get_mut(id)
                    .expect("record was just updated")
                    .deny_pushback();
                if let Some(segment) = self.network.segment_mut(opposing) {
                    let window = Interval::new(now, now + segment.length() / taxi_speed);
                    segment.reserve(id, window);
                }
                return;
            }
        }

        let record = self.active.get(id).expect("record was just updated");
        let route: RouteBuf = std::iter::once(current)
            .chain(record.intentions().iter().copied())
            .collect();
        self.reserve_route(id, &route, taxi_speed, now, None);
    }

    /// Schedules one active participant: reserves its current segment and
    /// the unblocked prefix of its intentions.
    fn update_active_record(&mut self, id: ParticipantId, priority: &mut u32, now: f64) {
        let Some(record) = self.active.get_mut(id) else {
            return;
        };
        let Some(vehicle) = record.vehicle().cloned() else {
            log::error!("scheduling: participant {id} has no vehicle");
            return;
        };
        record.set_priority(*priority);
        *priority += 1;

        let taxi_speed = vehicle.borrow().taxi_speed();
        if taxi_speed <= 0.0 {
            log::error!("scheduling: participant {id} reports no taxi speed");
            return;
        }
        let Some(current) = record.current_segment() else {
            return;
        };

        let route: RouteBuf = std::iter::once(current)
            .chain(record.intentions().iter().copied())
            .collect();
        // Never reserve past a segment someone else holds: a route only
        // ever claims a contiguous, currently-unblocked prefix.
        self.reserve_route(id, &route, taxi_speed, now, Some(now));
    }

    /// Reserves the segments of `route` for `id`, end times proportional
    /// to the estimated travel time. When `stop_at_blocked` carries the
    /// current time, the walk stops at the first foreign block.
    fn reserve_route(
        &mut self,
        id: ParticipantId,
        route: &[SegmentId],
        taxi_speed: f64,
        now: f64,
        stop_at_blocked: Option<f64>,
    ) {
        let mut length = 0.0;
        for (idx, segment_id) in route.iter().enumerate() {
            let Some(segment) = self.network.segment_mut(*segment_id) else {
                log::error!("participant {id} routes over unknown segment {segment_id}");
                continue;
            };
            // The first entry is the occupied segment, never a conflict.
            if idx > 0 {
                if let Some(at) = stop_at_blocked {
                    if segment.blocked_for(id, at) {
                        break;
                    }
                }
            }
            length += segment.length();
            let window = Interval::new(now, now + length / taxi_speed - RESERVATION_MARGIN);
            segment.reserve(id, window);
        }
    }

    /// Refreshes one participant's pose and runs its coordination step:
    /// speed adjustment, then either the taxi-clearance dialogue or the
    /// hold-position logic with circular-wait detection.
    pub fn update_participant(&mut self, id: ParticipantId, pose: Pose, now: f64) {
        let Some(record) = self.active.get_mut(id) else {
            log::error!("updating participant {id} without traffic record");
            return;
        };
        record.set_pose(pose);
        record.clear_resolve_circular_wait();
        record.set_waits_for(None);

        self.check_speed_adjustment(id);

        let Some(vehicle) = self.active.get(id).and_then(|r| r.vehicle().cloned()) else {
            log::error!("participant {id} has no vehicle");
            return;
        };

        if !vehicle.borrow().taxi_clearance_requested() {
            self.check_hold_position(id, now);
            if self.check_for_circular_waits(id) {
                if let Some(record) = self.active.get_mut(id) {
                    record.set_resolve_circular_wait();
                }
            }
        } else {
            self.run_clearance_dialogue(id, &vehicle, now);
        }

        if self.active.get(id).is_some_and(|r| r.handed_off()) {
            self.hand_off(id);
        }
    }

    /// The taxi-clearance request/issue/readback exchange (states 0→3→4→5→0).
    fn run_clearance_dialogue(&mut self, id: ParticipantId, vehicle: &VehicleHandle, now: f64) {
        self.gate.rearm(now, DIALOGUE_INTERVAL);
        let Self {
            active, gate, sink, user, ..
        } = self;
        let Some(record) = active.get_mut(id) else {
            return;
        };
        record.set_hold_position(true);

        if check_transmission_state(
            gate,
            sink.as_mut(),
            *user,
            record,
            TaxiState::Idle..=TaxiState::ResumePending,
            now,
            AtcMessage::RequestTaxiClearance,
            MessageDirection::AirToGround,
        ) {
            record.set_state(TaxiState::ClearanceRequested);
        }
        if check_transmission_state(
            gate,
            sink.as_mut(),
            *user,
            record,
            TaxiState::ClearanceRequested..=TaxiState::ClearanceRequested,
            now,
            AtcMessage::IssueTaxiClearance,
            MessageDirection::GroundToAir,
        ) {
            record.set_state(TaxiState::ClearanceIssued);
        }
        if check_transmission_state(
            gate,
            sink.as_mut(),
            *user,
            record,
            TaxiState::ClearanceIssued..=TaxiState::ClearanceIssued,
            now,
            AtcMessage::AcknowledgeTaxiClearance,
            MessageDirection::AirToGround,
        ) {
            record.set_state(TaxiState::ClearanceAcknowledged);
        }
        if record.state() == TaxiState::ClearanceAcknowledged && gate.is_open() {
            record.set_state(TaxiState::Idle);
            record.set_hold_position(false);
            vehicle.borrow_mut().set_taxi_clearance_request(false);
            gate.consume();
        }
    }

    /// Scans for the nearest conflicting traffic ahead and caps or stops
    /// the participant accordingly.
    fn check_speed_adjustment(&mut self, id: ParticipantId) {
        let Some(current) = self.active.get(id) else {
            log::error!("speed adjustment for participant {id} without traffic record");
            return;
        };
        let pose = current.pose();

        // Nearest candidate inside the ahead cone, first minimum in scan
        // order winning. The handoff scan does not exclude the
        // participant's own id: a handoff registry can report our own
        // entry back as the neighbour.
        let mut min_dist = f64::INFINITY;
        let mut closest: Option<(bool, ParticipantId)> = None;
        let mut closest_local = None;
        for other in self.active.iter().filter(|other| other.id() != id) {
            if let Some(dist) = distance_ahead(&pose, &other.pose()) {
                if dist < min_dist {
                    min_dist = dist;
                    closest = Some((false, other.id()));
                    closest_local = Some(other.id());
                }
            }
        }
        for other in self.handoff.iter() {
            if let Some(dist) = distance_ahead(&pose, &other.pose()) {
                if dist < min_dist {
                    min_dist = dist;
                    closest = Some((true, other.id()));
                }
            }
        }

        if let Some(record) = self.active.get_mut(id) {
            record.clear_speed_adjustment();
        }
        let Some((from_handoff, closest_id)) = closest else {
            return;
        };
        let current = self.active.get(id).expect("record was present above");
        let registry = if from_handoff { &self.handoff } else { &self.active };
        let Some(closest_record) = registry.get(closest_id) else {
            return;
        };

        // Tower-managed traffic is a conflict regardless of routes.
        let in_conflict = from_handoff || current.shares_route_with(closest_record);
        if !in_conflict {
            return;
        }

        let max_allowable = 1.1 * current.radius() + 1.1 * closest_record.radius();
        if min_dist >= 2.0 * max_allowable {
            return;
        }
        // The other side already yields to us; braking too would freeze
        // both.
        if closest_record.waits_for() == Some(id) {
            return;
        }
        let closest_speed = closest_record.pose().speed;
        let closest_priority = closest_record.priority();

        let record = self.active.get_mut(id).expect("record was present above");
        record.set_waits_for(Some(closest_id));
        let mut braking = false;
        if closest_id != id {
            record.set_speed_constraint(SpeedConstraint::Cap(closest_speed * min_dist / 100.0));
            braking = true;
        } else {
            // The nearest conflict resolved to ourselves: stop.
            record.set_speed_constraint(SpeedConstraint::Stop);
        }
        if min_dist < max_allowable {
            record.set_speed_constraint(SpeedConstraint::Stop);
        }

        // Right-of-way: when the local and cross-registry candidates
        // disagree, the record that outranks the conflict drops its cap
        // and lets the other side brake on its own update. A full stop is
        // never dropped.
        if braking
            && closest_local != Some(closest_id)
            && record.priority() < closest_priority
            && record.speed_adjustment() != Some(SpeedConstraint::Stop)
        {
            record.clear_speed_adjustment();
        }
    }

    /// Issues hold/resume instructions from the blocked-segment look-ahead
    /// and drives the acknowledgement and runway-report ladders.
    fn check_hold_position(&mut self, id: ParticipantId, now: f64) {
        let Some(record) = self.active.get(id) else {
            log::error!("hold check for participant {id} without traffic record");
            return;
        };
        let takeoff = record
            .vehicle()
            .map(|v| v.borrow().takeoff_status())
            .unwrap_or_default();
        match takeoff {
            TakeoffStatus::Imminent => {
                if let Some(record) = self.active.get_mut(id) {
                    record.set_hold_position(true);
                }
                return;
            }
            TakeoffStatus::InPositionAndHold => {
                if let Some(record) = self.active.get_mut(id) {
                    record.set_hold_position(false);
                    record.clear_speed_adjustment();
                }
                return;
            }
            TakeoffStatus::None => {}
        }

        let held_before = record.hold_position();
        let held_now = self.blocked_within_lookahead(record, now);

        self.gate.rearm(now, HOLD_RESUME_INTERVAL);
        let Self {
            active, gate, sink, user, ..
        } = self;
        let Some(record) = active.get_mut(id) else {
            return;
        };

        // Only a *change* of the computed status is worth a transmission,
        // and the stored flag moves when the instruction is acknowledged.
        if record.state() == TaxiState::Idle && held_now != held_before {
            let (message, next) = if held_now {
                (AtcMessage::HoldPosition, TaxiState::HoldPending)
            } else {
                (AtcMessage::ResumeTaxi, TaxiState::ResumePending)
            };
            if check_transmission_state(
                gate,
                sink.as_mut(),
                *user,
                record,
                TaxiState::Idle..=TaxiState::Idle,
                now,
                message,
                MessageDirection::GroundToAir,
            ) {
                record.set_state(next);
            }
        }

        if check_transmission_state(
            gate,
            sink.as_mut(),
            *user,
            record,
            TaxiState::HoldPending..=TaxiState::HoldPending,
            now,
            AtcMessage::AcknowledgeHoldPosition,
            MessageDirection::AirToGround,
        ) {
            record.set_state(TaxiState::Idle);
            record.set_hold_position(true);
        }
        if check_transmission_state(
            gate,
            sink.as_mut(),
            *user,
            record,
            TaxiState::ResumePending..=TaxiState::ResumePending,
            now,
            AtcMessage::AcknowledgeResumeTaxi,
            MessageDirection::AirToGround,
        ) {
            record.set_state(TaxiState::Idle);
            record.set_hold_position(false);
        }

        let takeoff = record
            .vehicle()
            .map(|v| v.borrow().takeoff_status())
            .unwrap_or_default();
        if takeoff != TakeoffStatus::None && record.state() == TaxiState::Idle {
            record.set_state(TaxiState::ReportRunwayExpected);
        }
        for (state, message, direction) in [
            (
                TaxiState::ReportRunwayExpected,
                AtcMessage::ReportRunwayHoldShort,
                MessageDirection::AirToGround,
            ),
            (
                TaxiState::ReportAcknowledged,
                AtcMessage::AcknowledgeReportRunwayHoldShort,
                MessageDirection::GroundToAir,
            ),
            (
                TaxiState::SwitchTowerInstructed,
                AtcMessage::SwitchTowerFrequency,
                MessageDirection::GroundToAir,
            ),
        ] {
            if check_transmission_state(
                gate,
                sink.as_mut(),
                *user,
                record,
                state..=state,
                now,
                message,
                direction,
            ) {
                record.advance_report_ladder();
            }
        }
        if check_transmission_state(
            gate,
            sink.as_mut(),
            *user,
            record,
            TaxiState::SwitchAcknowledged..=TaxiState::SwitchAcknowledged,
            now,
            AtcMessage::AcknowledgeSwitchTowerFrequency,
            MessageDirection::AirToGround,
        ) {
            record.mark_handed_off();
        }
    }

    /// Whether a foreign block lies on the intended route within
    /// `4 * radius` of the participant.
    fn blocked_within_lookahead(&self, record: &TrafficRecord, now: f64) -> bool {
        let Some(current) = record.current_segment() else {
            return false;
        };
        let lookahead = BLOCK_LOOKAHEAD_RADII * record.radius();
        let id = record.id();

        if record.intentions().is_empty() {
            return self
                .network
                .find_segment(current)
                .is_some_and(|segment| segment.blocked_for(id, now));
        }

        // Distance from the participant to where its plan begins.
        let mut distance = self
            .network
            .find_segment(record.intentions()[0])
            .and_then(|segment| self.network.node(segment.start()))
            .map(|node| geom::distance_m(&record.pose().position, node.geod()))
            .unwrap_or(0.0);

        for segment_id in record.intentions() {
            if distance >= lookahead {
                break;
            }
            let Some(segment) = self.network.find_segment(*segment_id) else {
                continue;
            };
            if segment.blocked_for(id, now) {
                return true;
            }
            distance += segment.length();
        }
        false
    }

    /// Walks the waits-for chain from `id` looking for a cycle.
    ///
    /// Bounded by the registry size. A chain leading to a participant with
    /// no record here is blocked by an out-of-network actor, not a cycle;
    /// the externally-controlled participant is never counted as part of
    /// one, and neither is a record waiting for itself.
    pub fn check_for_circular_waits(&self, id: ParticipantId) -> bool {
        let Some(start) = self.active.get(id) else {
            log::error!("circular wait check for participant {id} without traffic record");
            return false;
        };
        let first_target = start.waits_for();
        if first_target == Some(id) {
            return false;
        }

        let mut target = first_target;
        let mut steps = 0;
        while let Some(next) = target {
            if Some(next) == self.user {
                return false;
            }
            if next == id {
                log::warn!(
                    "circular wait detected: participant {id} waits for itself via {}",
                    first_target.unwrap_or(id),
                );
                return true;
            }
            steps += 1;
            if steps > self.active.len() {
                return false;
            }
            let Some(other) = self.active.get(next) else {
                // Blocked by an actor outside this network.
                return false;
            };
            target = other.waits_for();
        }
        false
    }

    /// Moves a record to the handoff registry once its tower switch has
    /// been acknowledged.
    fn hand_off(&mut self, id: ParticipantId) {
        if let Some(record) = self.active.remove(id) {
            // A tower-announced copy of the same participant is superseded
            // by the migrated record.
            self.handoff.remove(id);
            self.handoff.insert(record);
        }
    }
}

/// Fires `message` for `record` if its protocol state lies in `states` and
/// the transmission gate is open.
///
/// Air→ground messages of the externally-controlled participant wait for
/// the acknowledgement channel: without one, the message is delivered
/// inaudibly and the dialogue stays put. Returns whether the caller may
/// advance the record's state.
fn check_transmission_state(
    gate: &mut TransmissionGate,
    sink: &mut dyn TransmissionSink,
    user: Option<ParticipantId>,
    record: &TrafficRecord,
    states: RangeInclusive<TaxiState>,
    now: f64,
    message: AtcMessage,
    direction: MessageDirection,
) -> bool {
    if !states.contains(&record.state()) || !gate.is_open() {
        return false;
    }
    if direction == MessageDirection::AirToGround
        && user == Some(record.id())
        && !sink.take_user_acknowledgement()
    {
        sink.transmit(record, message, direction, false);
        return false;
    }
    sink.transmit(record, message, direction, true);
    gate.close(now);
    true
}

/// Great-circle distance to `other` if it lies inside the ahead cone.
fn distance_ahead(own: &Pose, other: &Pose) -> Option<f64> {
    let distance = geom::distance_m(&own.position, &other.position);
    let course = geom::course_deg(&own.position, &other.position);
    let bearing = geom::course_offset_deg(own.heading, course);
    (bearing < AHEAD_CONE_DEG).then_some(distance)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::Geod;
    use crate::vehicle::TaxiVehicle;
    use assert_approx_eq::assert_approx_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Metres per degree of longitude on the equator of the mean sphere.
    const DEG: f64 = 111_194.93;

    type SentLog = Rc<RefCell<Vec<(ParticipantId, AtcMessage, MessageDirection, bool)>>>;

    #[derive(Default)]
    struct RadioLog {
        sent: SentLog,
    }

    impl TransmissionSink for RadioLog {
        fn transmit(
            &mut self,
            record: &TrafficRecord,
            message: AtcMessage,
            direction: MessageDirection,
            audible: bool,
        ) {
            self.sent
                .borrow_mut()
                .push((record.id(), message, direction, audible));
        }
    }

    struct StubVehicle {
        taxi_speed: f64,
        clearance: bool,
        takeoff: TakeoffStatus,
    }

    impl StubVehicle {
        fn handle(taxi_speed: f64) -> VehicleHandle {
            Rc::new(RefCell::new(StubVehicle {
                taxi_speed,
                clearance: false,
                takeoff: TakeoffStatus::None,
            }))
        }
    }

    impl TaxiVehicle for StubVehicle {
        fn taxi_speed(&self) -> f64 {
            self.taxi_speed
        }

        fn taxi_clearance_requested(&self) -> bool {
            self.clearance
        }

        fn set_taxi_clearance_request(&mut self, request: bool) {
            self.clearance = request;
        }

        fn takeoff_status(&self) -> TakeoffStatus {
            self.takeoff
        }
    }

    fn controller() -> (GroundController, SentLog) {
        let radio = RadioLog::default();
        let sent = radio.sent.clone();
        (
            GroundController::new(TaxiNetwork::new(), Box::new(radio)),
            sent,
        )
    }

    /// A pose `east_m` metres east of the origin, heading east.
    fn pose_east(east_m: f64, speed: f64) -> Pose {
        Pose {
            position: Geod::from_deg(0.0, east_m / DEG),
            heading: 90.0,
            speed,
        }
    }

    #[test]
    fn outranked_conflicts_keep_the_brake() {
        let (mut ctl, _) = controller();
        let a = ParticipantId(1);
        ctl.announce(a, &[], None, pose_east(0.0, 5.0), 20.0, Leg::TaxiOut, None);
        // A local candidate further out than the handoff one, so the two
        // scans disagree about the closest traffic.
        ctl.announce(
            ParticipantId(2),
            &[],
            None,
            pose_east(60.0, 5.0),
            20.0,
            Leg::TaxiOut,
            None,
        );
        ctl.announce_handoff(ParticipantId(9), pose_east(50.0, 4.0), 20.0);

        // Outranked by the conflict: the proportional cap stands.
        ctl.active.get_mut(a).unwrap().set_priority(3);
        ctl.handoff.get_mut(ParticipantId(9)).unwrap().set_priority(2);
        ctl.check_speed_adjustment(a);
        let record = ctl.active.get(a).unwrap();
        assert_eq!(record.waits_for(), Some(ParticipantId(9)));
        match record.speed_adjustment() {
            Some(SpeedConstraint::Cap(cap)) => assert_approx_eq!(cap, 2.0, 0.01),
            other => panic!("expected a proportional cap, got {other:?}"),
        }

        // Outranking it: the cap is dropped, the wait target remains.
        ctl.active.get_mut(a).unwrap().set_priority(1);
        ctl.check_speed_adjustment(a);
        let record = ctl.active.get(a).unwrap();
        assert_eq!(record.speed_adjustment(), None);
        assert_eq!(record.waits_for(), Some(ParticipantId(9)));
    }

    #[test]
    fn own_handoff_entry_commands_a_stop() {
        let (mut ctl, _) = controller();
        let a = ParticipantId(1);
        ctl.announce(a, &[], None, pose_east(0.0, 5.0), 20.0, Leg::TaxiOut, None);
        ctl.announce_handoff(a, pose_east(50.0, 5.0), 20.0);

        ctl.check_speed_adjustment(a);
        let record = ctl.active.get(a).unwrap();
        assert_eq!(record.speed_adjustment(), Some(SpeedConstraint::Stop));
        assert_eq!(record.waits_for(), Some(a));
        // Waiting for oneself is never reported as a cycle.
        assert!(!ctl.check_for_circular_waits(a));
    }

    #[test]
    fn runway_report_ladder_ends_in_a_handoff() {
        let (mut ctl, sent) = controller();
        let id = ParticipantId(4);
        ctl.announce(
            id,
            &[],
            None,
            pose_east(0.0, 5.0),
            20.0,
            Leg::TaxiOut,
            Some(StubVehicle::handle(5.0)),
        );
        ctl.active
            .get_mut(id)
            .unwrap()
            .set_state(TaxiState::ReportRunwayExpected);

        for tick in 0..4 {
            ctl.update_participant(id, pose_east(0.0, 5.0), 100.0 + 3.0 * tick as f64);
        }

        let messages: Vec<_> = sent.borrow().iter().map(|(_, msg, _, _)| *msg).collect();
        assert_eq!(
            messages,
            [
                AtcMessage::ReportRunwayHoldShort,
                AtcMessage::AcknowledgeReportRunwayHoldShort,
                AtcMessage::SwitchTowerFrequency,
                AtcMessage::AcknowledgeSwitchTowerFrequency,
            ]
        );
        assert!(ctl.active.get(id).is_none());
        let record = ctl.handoff.get(id).unwrap();
        assert_eq!(record.state(), TaxiState::SwitchAcknowledged);
    }
}
