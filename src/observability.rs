use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("polychat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("polychat.client.request_errors");
pub(crate) static CLIENT_MODEL_LISTINGS: Counter = Counter::new("polychat.client.model_listings");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("polychat.client.request_duration_seconds");

pub(crate) static STREAM_LINES: Counter = Counter::new("polychat.stream.lines");
pub(crate) static STREAM_SKIPPED_LINES: Counter = Counter::new("polychat.stream.skipped_lines");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("polychat.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("polychat.stream.bytes");
pub(crate) static STREAM_INTERRUPTS: Counter = Counter::new("polychat.stream.interrupts");
pub(crate) static STREAM_TRUNCATIONS: Counter = Counter::new("polychat.stream.truncations");
pub(crate) static STREAM_DURATION: Moments = Moments::new("polychat.stream.duration_seconds");

pub(crate) static SESSION_TURNS: Counter = Counter::new("polychat.session.turns");
pub(crate) static SESSION_ROLLBACKS: Counter = Counter::new("polychat.session.rollbacks");
pub(crate) static SESSION_REPLY_CHARS: Moments = Moments::new("polychat.session.reply_chars");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_MODEL_LISTINGS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_LINES);
    collector.register_counter(&STREAM_SKIPPED_LINES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_INTERRUPTS);
    collector.register_counter(&STREAM_TRUNCATIONS);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_ROLLBACKS);
    collector.register_moments(&SESSION_REPLY_CHARS);
}
