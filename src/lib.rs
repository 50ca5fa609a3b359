pub use controller::GroundController;
pub use geom::Geod;
pub use network::{NodeAttributes, Reservation, TaxiNetwork, TaxiNode, TaxiRoute, TaxiSegment};
pub use radio::{AtcMessage, MessageDirection, TransmissionSink};
pub use record::{Instruction, Leg, Pose, SpeedConstraint, TaxiState, TrafficRecord};
pub use registry::TrafficRegistry;
pub use util::Interval;
pub use vehicle::{TakeoffStatus, TaxiVehicle, VehicleHandle};

mod controller;
pub mod geom;
mod network;
mod radio;
mod record;
mod registry;
mod util;
mod vehicle;

use std::fmt;

/// Unique id of a traffic participant, assigned by the caller and stable
/// for the participant's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParticipantId(pub u32);

/// Unique id of a [TaxiSegment], issued by [TaxiNetwork::add_segment].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentId(pub(crate) u32);

/// Unique id of a [TaxiNode], issued by [TaxiNetwork::add_node].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub(crate) u32);

impl SegmentId {
    /// The segment's position in the network's segment table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl NodeId {
    /// The node's position in the network's node table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
