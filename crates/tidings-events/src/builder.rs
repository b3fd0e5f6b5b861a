//! Event record construction

use chrono::Utc;
use parking_lot::Mutex;
use tidings_core::config::EventsConfig;
use tidings_core::types::{
    Event, EventInfo, RequestParameters, ResponseElements, S3BucketInfo, S3Info, S3ObjectInfo,
    UserIdentity,
};
use tidings_core::utils::generate_request_id;
use tidings_core::{EVENT_VERSION, S3_SCHEMA_VERSION};

/// Turns [`EventInfo`]s into wire records. Performs no I/O.
#[derive(Debug)]
pub struct EventBuilder {
    region: String,
    event_source: String,
    sequencer: Mutex<SequencerState>,
}

#[derive(Debug, Default)]
struct SequencerState {
    last_nanos: i64,
    counter: u32,
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self::new(&EventsConfig::default())
    }
}

impl EventBuilder {
    pub fn new(config: &EventsConfig) -> Self {
        Self {
            region: config.region.clone(),
            event_source: config.event_source.clone(),
            sequencer: Mutex::new(SequencerState::default()),
        }
    }

    pub fn build(&self, info: &EventInfo) -> Event {
        Event {
            event_version: EVENT_VERSION.to_string(),
            event_source: self.event_source.clone(),
            aws_region: self.region.clone(),
            event_time: Utc::now(),
            event_name: info.event_type.to_string(),
            user_identity: UserIdentity {
                principal_id: info.user_id.clone(),
            },
            request_parameters: RequestParameters {
                source_ip_address: info.source_ip.clone(),
            },
            response_elements: ResponseElements {
                request_id: if info.request_id.is_empty() {
                    generate_request_id()
                } else {
                    info.request_id.clone()
                },
            },
            s3: S3Info {
                s3_schema_version: S3_SCHEMA_VERSION.to_string(),
                configuration_id: None,
                bucket: S3BucketInfo {
                    name: info.bucket_name.clone(),
                    owner_identity: UserIdentity {
                        principal_id: info.user_id.clone(),
                    },
                    arn: format!("arn:tidings:s3:::{}", info.bucket_name),
                },
                object: S3ObjectInfo {
                    key: info.object_key.clone(),
                    size: info.size,
                    e_tag: info.checksum.clone(),
                    version_id: info.version_id.clone(),
                    sequencer: self.next_sequencer(),
                },
            },
        }
    }

    /// Hex timestamp in nanoseconds followed by a per-builder counter.
    ///
    /// Both parts are taken under one lock and the timestamp never repeats or
    /// goes backwards, so tokens from one builder are unique and sort in issue
    /// order across threads.
    fn next_sequencer(&self) -> String {
        let mut state = self.sequencer.lock();
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        state.last_nanos = now.max(state.last_nanos + 1);
        state.counter = state.counter.wrapping_add(1);
        format!("{:016X}{:08X}", state.last_nanos, state.counter)
    }
}
