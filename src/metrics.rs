use opentelemetry::{
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

pub struct HandshakeMetrics {
    open: Counter<u64>,
    attempts: Counter<u64>,
    failures: Counter<u64>,
    duration: Histogram<u64>,
    logins: Counter<u64>,
}

impl HandshakeMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            open: meter.u64_counter("lodestone_socket_open_total").build(),
            attempts: meter.u64_counter("lodestone_handshake_total").build(),
            failures: meter.u64_counter("lodestone_handshake_fail_total").build(),
            duration: meter.u64_histogram("lodestone_handshake_time_ms").build(),
            logins: meter.u64_counter("lodestone_login_total").build(),
        }
    }

    pub fn record_open(&self) {
        self.open.add(1, &[]);
    }

    pub fn record_attempt(&self, state: &str) {
        self.attempts
            .add(1, &[KeyValue::new("state", state.to_string())]);
    }

    pub fn record_failure(&self, stage: &str) {
        self.failures
            .add(1, &[KeyValue::new("stage", stage.to_string())]);
    }

    pub fn record_duration(&self, elapsed_ms: u64, state: &str) {
        self.duration
            .record(elapsed_ms, &[KeyValue::new("state", state.to_string())]);
    }

    pub fn record_login(&self) {
        self.logins.add(1, &[]);
    }
}

pub struct ConnectionMetrics {
    packets: Counter<u64>,
    unknown: Counter<u64>,
    volume: Counter<u64>,
}

impl ConnectionMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            packets: meter.u64_counter("lodestone_packet_count").build(),
            unknown: meter.u64_counter("lodestone_unknown_packet_count").build(),
            volume: meter
                .u64_counter("lodestone_transport_volume")
                .with_unit("bytes")
                .build(),
        }
    }

    pub fn record_packet(&self, direction: &'static str) {
        self.packets.add(1, &[KeyValue::new("intent", direction)]);
    }

    pub fn record_unknown(&self, state: &'static str) {
        self.unknown.add(1, &[KeyValue::new("state", state)]);
    }

    pub fn record_volume(&self, bytes: usize, direction: &'static str) {
        self.volume
            .add(bytes as u64, &[KeyValue::new("intent", direction)]);
    }
}
