// ── Domain model ──
//
// Canonical types shared by every ingestion component. No I/O lives here.

pub mod event;
pub mod observation;
pub mod station;

pub use event::{ErrorKind, ObservationSource, WeatherEvent};
pub use observation::{DerivedMetrics, RawObservation, SnapshotRecord, StreamRecord, normalize};
pub use station::{DeviceBinding, StationId};
