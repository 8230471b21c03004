// ── Inbound frame classification ──

use tempest_api::InboundFrame;

use crate::model::{DeviceBinding, RawObservation};

/// What an inbound push frame turned out to be.
#[derive(Debug)]
pub(crate) enum FrameOutcome {
    /// An observation for the bound device.
    Observation(RawObservation),
    /// Subscription acknowledgement.
    Ack(Option<String>),
    /// An observation for some other device (or none at all).
    ForeignDevice(Option<u64>),
    /// Observation-typed frame without an `obs` array.
    MissingObs,
    /// Any other frame type.
    Ignored(String),
    Malformed(serde_json::Error),
}

/// Decide whether `text` carries an observation for `binding`.
///
/// A frame is accepted only when its type is an observation type, its
/// `device_id` equals the bound device, and it carries an `obs` array.
pub(crate) fn classify(text: &str, binding: Option<&DeviceBinding>) -> FrameOutcome {
    let frame = match InboundFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => return FrameOutcome::Malformed(e),
    };

    if frame.is_ack() {
        return FrameOutcome::Ack(frame.id);
    }
    if !frame.is_observation() {
        return FrameOutcome::Ignored(frame.kind);
    }
    if !binding.is_some_and(|b| b.matches(frame.device_id)) {
        return FrameOutcome::ForeignDevice(frame.device_id);
    }
    match frame.obs {
        Some(obs @ serde_json::Value::Array(_)) => {
            FrameOutcome::Observation(RawObservation::from_json(&obs))
        }
        _ => FrameOutcome::MissingObs,
    }
}
