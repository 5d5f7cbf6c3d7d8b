pub mod oltp;

use opentelemetry::{global, metrics::Meter};

pub fn get_meter() -> Meter {
    global::meter_provider().meter("lodestone")
}
