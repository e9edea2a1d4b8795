//! Request IDs for tracing and correlation.
//!
//! Every logical request gets a UUID v4 that is sent as `x-request-id` on
//! each attempt, so a refresh-and-retry shows up as one request in backend
//! logs. The ID is recorded only on the request's own tracing span; the
//! Sentry tracing layer carries span fields onto events and breadcrumbs, so
//! concurrent requests never overwrite each other's value.

use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generate a fresh request ID and record it on the current span.
///
/// The enclosing span must declare a `request_id` field for the value to show up.
#[must_use]
pub fn new_request_id() -> String {
    let request_id = Uuid::new_v4().to_string();
    Span::current().record("request_id", &request_id);
    request_id
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tracing::{Subscriber, field, span};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;

    #[test]
    fn test_request_ids_are_unique_uuids() {
        let a = new_request_id();
        let b = new_request_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    /// Captures `request_id` values recorded on spans, keyed by span id.
    #[derive(Clone, Default)]
    struct RecordedIds(Arc<Mutex<Vec<(u64, String)>>>);

    impl<S: Subscriber> Layer<S> for RecordedIds {
        fn on_record(&self, span: &span::Id, values: &span::Record<'_>, _ctx: Context<'_, S>) {
            struct Visit<'a>(&'a mut Option<String>);
            impl field::Visit for Visit<'_> {
                fn record_str(&mut self, field: &field::Field, value: &str) {
                    if field.name() == "request_id" {
                        *self.0 = Some(value.to_string());
                    }
                }
                fn record_debug(&mut self, _field: &field::Field, _value: &dyn std::fmt::Debug) {}
            }

            let mut id = None;
            values.record(&mut Visit(&mut id));
            if let Some(id) = id {
                self.0.lock().unwrap().push((span.into_u64(), id));
            }
        }
    }

    #[test]
    fn test_each_span_keeps_its_own_request_id() {
        let recorded = RecordedIds::default();
        let subscriber = tracing_subscriber::registry().with(recorded.clone());

        tracing::subscriber::with_default(subscriber, || {
            let first = tracing::info_span!("first", request_id = field::Empty);
            let second = tracing::info_span!("second", request_id = field::Empty);
            let a = first.in_scope(new_request_id);
            let b = second.in_scope(new_request_id);

            let ids = recorded.0.lock().unwrap().clone();
            assert_eq!(
                ids,
                vec![
                    (first.id().unwrap().into_u64(), a),
                    (second.id().unwrap().into_u64(), b),
                ]
            );
        });
    }
}
