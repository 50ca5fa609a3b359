//! The narrow read/write contract with the controlled vehicle.

use std::cell::RefCell;
use std::rc::Rc;

/// Takeoff progress reported by the vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TakeoffStatus {
    /// No takeoff activity.
    #[default]
    None,
    /// Departure is imminent; the participant holds unconditionally.
    Imminent,
    /// Cleared to taxi into position and hold.
    InPositionAndHold,
}

/// Access to the controlled vehicle and its performance figures.
///
/// The engine reads the taxi speed when scheduling reservations, drives the
/// taxi clearance dialogue through the request flag, and consults the
/// takeoff status in the hold-position logic. Everything else about the
/// vehicle is somebody else's problem.
pub trait TaxiVehicle {
    /// Preferred taxi speed in m/s.
    fn taxi_speed(&self) -> f64;

    /// Whether the vehicle is waiting for a taxi clearance.
    fn taxi_clearance_requested(&self) -> bool;

    /// Raises or clears the taxi clearance request.
    fn set_taxi_clearance_request(&mut self, request: bool);

    /// Takeoff progress, consulted by the hold-position logic.
    fn takeoff_status(&self) -> TakeoffStatus {
        TakeoffStatus::None
    }
}

/// Shared handle to a controlled vehicle.
pub type VehicleHandle = Rc<RefCell<dyn TaxiVehicle>>;
