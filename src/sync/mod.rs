//! Remote model synchronization and upstream reporting.

mod error;
mod schedule;
mod synchronizer;
mod telemetry;

pub use error::SyncError;
pub use schedule::{ms_until_next_iteration, next_iteration_at, MINUTES_PER_ITERATION};
pub use synchronizer::{
    ModelState, ModelSynchronizer, RemoteModel, SyncHandle, SyncSettings, URL_ENDPOINT_TEMPLATE,
};
pub use telemetry::{
    ArchiveTelemetrySink, HttpTelemetrySink, TelemetryPayload, TelemetryPing, TelemetrySink,
    TelemetryTransports,
};
