//! Location sensor boundary and the bundled simulated sensor.

mod adapter;
mod simulated;

pub use adapter::{
    BoxFuture, FixSink, SensorAdapter, SensorReport, SessionToken, SubscriptionHandle,
    TokenSource,
};
pub use simulated::SimulatedSensor;
