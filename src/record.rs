//! Per-participant coordination state.

use crate::geom::Geod;
use crate::vehicle::VehicleHandle;
use crate::{ParticipantId, SegmentId};
use itertools::Itertools;
use smallvec::SmallVec;

/// Route leg a participant was announced on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Leg {
    /// Pushing back from the gate; scheduled ahead of active traffic.
    Pushback,
    /// Taxiing out towards the departure runway.
    TaxiOut,
    /// Taxiing in from the runway; processed ahead of other traffic.
    TaxiIn,
}

/// Protocol state of the instruction dialogue for one participant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaxiState {
    /// No pending instruction.
    #[default]
    Idle = 0,
    /// Hold-position issued, awaiting acknowledgement.
    HoldPending = 1,
    /// Resume-taxi issued, awaiting acknowledgement.
    ResumePending = 2,
    /// Taxi clearance requested by the air side.
    ClearanceRequested = 3,
    /// Clearance issued, awaiting readback.
    ClearanceIssued = 4,
    /// Readback received; taxi may begin.
    ClearanceAcknowledged = 5,
    /// Runway-hold-short report expected from the air side.
    ReportRunwayExpected = 6,
    /// Report acknowledged by ground.
    ReportAcknowledged = 7,
    /// Tower-frequency switch instructed.
    SwitchTowerInstructed = 8,
    /// Frequency switch acknowledged.
    SwitchAcknowledged = 9,
}

/// A commanded speed restriction.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpeedConstraint {
    /// Cap the ground speed at the given value in m/s.
    Cap(f64),
    /// Come to a full stop.
    Stop,
}

/// Kinematic state reported by the driver each tick.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose {
    /// Position on the airport surface.
    pub position: Geod,
    /// True heading in degrees.
    pub heading: f64,
    /// Ground speed in m/s.
    pub speed: f64,
}

/// Snapshot of the instructions currently in force for a participant,
/// consumed by the vehicle's own speed controller.
#[derive(Clone, Copy, Debug, Default)]
pub struct Instruction {
    /// Hold short of the next conflict point.
    pub hold_position: bool,
    /// Commanded speed restriction, if any.
    pub speed: Option<SpeedConstraint>,
    /// A circular wait involving this participant was detected.
    pub resolve_circular_wait: bool,
}

impl Instruction {
    /// Whether the instruction commands anything at all.
    pub fn is_empty(&self) -> bool {
        !self.hold_position && self.speed.is_none() && !self.resolve_circular_wait
    }
}

type IntentionList = SmallVec<[SegmentId; 16]>;

/// The mutable coordination state for one active participant.
pub struct TrafficRecord {
    /// The participant's id.
    id: ParticipantId,
    /// Kinematics, refreshed every tick from the vehicle.
    pose: Pose,
    /// Turn radius in m, fixed at creation.
    radius: f64,
    /// The leg the participant was announced on.
    leg: Leg,
    /// The segment currently occupied; `None` until the participant is on
    /// the network.
    current_segment: Option<SegmentId>,
    /// Upcoming segments, in travel order.
    intentions: IntentionList,
    /// Protocol state of the instruction dialogue.
    state: TaxiState,
    /// Acknowledged hold-position status.
    hold_position: bool,
    /// Commanded speed restriction.
    speed_adjustment: Option<SpeedConstraint>,
    /// The participant currently blocking this one.
    waits_for: Option<ParticipantId>,
    /// Priority rank assigned this tick; 1 is processed first.
    priority: u32,
    /// Set when this participant is part of a detected circular wait.
    resolve_circular_wait: bool,
    /// Whether pushback is currently permitted.
    pushback_allowed: bool,
    /// Set once the tower-frequency switch has been acknowledged.
    handed_off: bool,
    /// The controlled vehicle, if one is attached.
    vehicle: Option<VehicleHandle>,
}

impl TrafficRecord {
    pub(crate) fn new(
        id: ParticipantId,
        radius: f64,
        leg: Leg,
        vehicle: Option<VehicleHandle>,
    ) -> Self {
        Self {
            id,
            pose: Pose::default(),
            radius,
            leg,
            current_segment: None,
            intentions: IntentionList::new(),
            state: TaxiState::Idle,
            hold_position: false,
            speed_adjustment: None,
            waits_for: None,
            priority: 0,
            resolve_circular_wait: false,
            pushback_allowed: true,
            handed_off: false,
            vehicle,
        }
    }

    /// The participant's id.
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// The last reported kinematic state.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Turn radius in m.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// The leg the participant was announced on.
    pub fn leg(&self) -> Leg {
        self.leg
    }

    /// Protocol state of the instruction dialogue.
    pub fn state(&self) -> TaxiState {
        self.state
    }

    /// The segment currently occupied, if on the network.
    pub fn current_segment(&self) -> Option<SegmentId> {
        self.current_segment
    }

    /// Upcoming segments, in travel order.
    pub fn intentions(&self) -> &[SegmentId] {
        &self.intentions
    }

    /// Acknowledged hold-position status.
    pub fn hold_position(&self) -> bool {
        self.hold_position
    }

    /// Commanded speed restriction, if any.
    pub fn speed_adjustment(&self) -> Option<SpeedConstraint> {
        self.speed_adjustment
    }

    /// The participant currently blocking this one.
    pub fn waits_for(&self) -> Option<ParticipantId> {
        self.waits_for
    }

    /// Priority rank assigned this tick; 1 is processed first.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Whether pushback is currently permitted.
    pub fn pushback_allowed(&self) -> bool {
        self.pushback_allowed
    }

    /// The instructions currently in force.
    pub fn instruction(&self) -> Instruction {
        Instruction {
            hold_position: self.hold_position,
            speed: self.speed_adjustment,
            resolve_circular_wait: self.resolve_circular_wait,
        }
    }

    pub(crate) fn vehicle(&self) -> Option<&VehicleHandle> {
        self.vehicle.as_ref()
    }

    pub(crate) fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    /// Updates the network position and advances the intention list.
    ///
    /// A participant announces each time it moves onto a new segment. The
    /// announced segment must then be the head of the previous plan, which
    /// is consumed; on the first announcement the plan is taken from
    /// `route`, skipping the occupied segment.
    pub(crate) fn set_position_and_intentions(
        &mut self,
        current: Option<SegmentId>,
        route: &[SegmentId],
    ) {
        self.current_segment = current;
        if !self.intentions.is_empty() {
            let head = self.intentions.remove(0);
            if current != Some(head) {
                log::error!(
                    "participant {}: announced segment {:?} is not the planned head {}; plan was [{}]",
                    self.id,
                    current,
                    head,
                    self.intentions.iter().join(", "),
                );
            }
        } else {
            self.intentions = route
                .iter()
                .copied()
                .filter(|segment| Some(*segment) != current)
                .collect();
        }
    }

    /// Whether `other`'s position on the network matches this record's
    /// current-or-intended path.
    pub(crate) fn shares_route_with(&self, other: &TrafficRecord) -> bool {
        match (self.current_segment, other.current_segment) {
            (Some(own), Some(theirs)) if own == theirs => true,
            (_, Some(theirs)) => self.intentions.contains(&theirs),
            _ => false,
        }
    }

    pub(crate) fn set_state(&mut self, state: TaxiState) {
        self.state = state;
    }

    pub(crate) fn set_hold_position(&mut self, hold: bool) {
        self.hold_position = hold;
    }

    pub(crate) fn set_speed_constraint(&mut self, constraint: SpeedConstraint) {
        self.speed_adjustment = Some(constraint);
    }

    pub(crate) fn clear_speed_adjustment(&mut self) {
        self.speed_adjustment = None;
    }

    pub(crate) fn set_waits_for(&mut self, target: Option<ParticipantId>) {
        self.waits_for = target;
    }

    pub(crate) fn set_priority(&mut self, rank: u32) {
        self.priority = rank;
    }

    pub(crate) fn set_resolve_circular_wait(&mut self) {
        self.resolve_circular_wait = true;
    }

    pub(crate) fn clear_resolve_circular_wait(&mut self) {
        self.resolve_circular_wait = false;
    }

    pub(crate) fn allow_pushback(&mut self) {
        self.pushback_allowed = true;
    }

    pub(crate) fn deny_pushback(&mut self) {
        self.pushback_allowed = false;
    }

    /// Advances one step of the runway-report ladder (states 6 through 9).
    pub(crate) fn advance_report_ladder(&mut self) {
        self.state = match self.state {
            TaxiState::ReportRunwayExpected => TaxiState::ReportAcknowledged,
            TaxiState::ReportAcknowledged => TaxiState::SwitchTowerInstructed,
            TaxiState::SwitchTowerInstructed => TaxiState::SwitchAcknowledged,
            other => other,
        };
    }

    pub(crate) fn mark_handed_off(&mut self) {
        self.handed_off = true;
    }

    pub(crate) fn handed_off(&self) -> bool {
        self.handed_off
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(id: u32) -> TrafficRecord {
        TrafficRecord::new(ParticipantId(id), 15.0, Leg::TaxiOut, None)
    }

    #[test]
    fn first_announcement_fills_the_plan() {
        let mut rec = record(1);
        let route = [SegmentId(3), SegmentId(4), SegmentId(5)];
        rec.set_position_and_intentions(Some(SegmentId(3)), &route);
        assert_eq!(rec.current_segment(), Some(SegmentId(3)));
        assert_eq!(rec.intentions(), &[SegmentId(4), SegmentId(5)]);
    }

    #[test]
    fn later_announcements_consume_the_plan_head() {
        let mut rec = record(1);
        let route = [SegmentId(3), SegmentId(4), SegmentId(5)];
        rec.set_position_and_intentions(Some(SegmentId(3)), &route);
        rec.set_position_and_intentions(Some(SegmentId(4)), &route);
        assert_eq!(rec.current_segment(), Some(SegmentId(4)));
        assert_eq!(rec.intentions(), &[SegmentId(5)]);
    }

    #[test]
    fn route_overlap_checks_current_and_intentions() {
        let mut a = record(1);
        let mut b = record(2);
        a.set_position_and_intentions(Some(SegmentId(1)), &[SegmentId(1), SegmentId(2)]);
        b.set_position_and_intentions(Some(SegmentId(1)), &[SegmentId(1)]);
        assert!(a.shares_route_with(&b));

        let mut c = record(3);
        c.set_position_and_intentions(Some(SegmentId(2)), &[SegmentId(2)]);
        assert!(a.shares_route_with(&c));

        let mut d = record(4);
        d.set_position_and_intentions(Some(SegmentId(9)), &[SegmentId(9)]);
        assert!(!a.shares_route_with(&d));
    }
}
