//! Abstract radio messages and the transmission rate limiter.
//!
//! The engine decides *when* to transmit and *which* message to send; it
//! never builds radio text. Rendering the exchange is the sink's job.

use crate::record::TrafficRecord;

/// The messages exchanged on the ground frequency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AtcMessage {
    RequestTaxiClearance,
    IssueTaxiClearance,
    AcknowledgeTaxiClearance,
    HoldPosition,
    AcknowledgeHoldPosition,
    ResumeTaxi,
    AcknowledgeResumeTaxi,
    ReportRunwayHoldShort,
    AcknowledgeReportRunwayHoldShort,
    SwitchTowerFrequency,
    AcknowledgeSwitchTowerFrequency,
}

/// Direction of a radio exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageDirection {
    AirToGround,
    GroundToAir,
}

/// Receives the messages the engine decides to send.
pub trait TransmissionSink {
    /// Delivers one message. Inaudible transmissions are repeats held back
    /// for the externally-controlled participant's acknowledgement and
    /// should not be voiced.
    fn transmit(
        &mut self,
        record: &TrafficRecord,
        message: AtcMessage,
        direction: MessageDirection,
        audible: bool,
    );

    /// Polls the externally-controlled participant's acknowledgement
    /// channel, consuming a pending acknowledgement if there is one.
    /// Returning `false` leaves the dialogue waiting. The default
    /// acknowledges immediately, which is correct for pure-AI operation.
    fn take_user_acknowledgement(&mut self) -> bool {
        true
    }
}

/// Rate limiter for radio transmissions.
///
/// One gate is shared by all participants on the frequency; it reopens only
/// after a minimum quiet interval since the last transmission.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TransmissionGate {
    available: bool,
    last_transmission: f64,
}

impl TransmissionGate {
    pub(crate) fn new() -> Self {
        Self {
            available: true,
            last_transmission: 0.0,
        }
    }

    /// Reopens the gate once `min_interval` seconds have elapsed since the
    /// last transmission.
    pub(crate) fn rearm(&mut self, now: f64, min_interval: f64) {
        if now - self.last_transmission > min_interval {
            self.available = true;
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.available
    }

    /// Closes the gate and stamps the transmission time.
    pub(crate) fn close(&mut self, now: f64) {
        self.last_transmission = now;
        self.available = false;
    }

    /// Closes the gate without stamping a transmission.
    pub(crate) fn consume(&mut self) {
        self.available = false;
    }
}
