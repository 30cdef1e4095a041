//! Property-based tests for rust_log_pipeline using proptest

use parking_lot::Mutex;
use proptest::prelude::*;
use rust_log_pipeline::core::template::{self, Template};
use rust_log_pipeline::core::RoutingTable;
use rust_log_pipeline::prelude::*;
use std::sync::Arc;

// ============================================================================
// Formatter
// ============================================================================

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ]{0,12}"
}

proptest! {
    /// The last layer defining a key supplies its value
    #[test]
    fn test_last_layer_wins(
        key in key_strategy(),
        layers in prop::collection::vec(prop::option::of(value_strategy()), 1..6),
    ) {
        let contexts: Vec<Context> = layers
            .iter()
            .map(|value| match value {
                Some(v) => Context::new().with_field(key.as_str(), v.as_str()),
                None => Context::new(),
            })
            .collect();
        let refs: Vec<&Context> = contexts.iter().collect();

        let rendered = template::format(&format!("<${{{}}}>", key), &refs);
        let expected = match layers.iter().rev().flatten().next() {
            Some(v) => format!("<{}>", v),
            None => format!("<${{{}}}>", key),
        };
        prop_assert_eq!(rendered, expected);
    }

    /// Text without `$` renders unchanged
    #[test]
    fn test_plain_text_is_untouched(text in "[^$]{0,60}") {
        let ctx = Context::new().with_field("message", "x");
        prop_assert_eq!(Template::parse(&text).render(&[&ctx]), text);
    }

    /// `$$` always renders as a single `$`
    #[test]
    fn test_escaped_dollar(prefix in "[a-z ]{0,10}", suffix in "[a-z ]{0,10}") {
        let source = format!("{}$${}", prefix, suffix);
        prop_assert_eq!(template::format(&source, &[]), format!("{}${}", prefix, suffix));
    }
}

// ============================================================================
// Routing table
// ============================================================================

const LEVELS: [&str; 5] = ["debug", "info", "warn", "error", "fatal"];

proptest! {
    /// Each level lists exactly the handlers declaring it, in declaration order
    #[test]
    fn test_routing_table_preserves_order(
        declared in prop::collection::vec(prop::collection::vec(0usize..5, 0..4), 0..8),
    ) {
        let handlers: Vec<Arc<Handler>> = declared
            .iter()
            .map(|levels| {
                let names: Vec<&str> = levels.iter().map(|&i| LEVELS[i]).collect();
                Arc::new(Handler::new("$message").levels(names))
            })
            .collect();

        let table = RoutingTable::build(handlers.clone());

        for (idx, level) in LEVELS.iter().enumerate() {
            let expected: Vec<&Arc<Handler>> = declared
                .iter()
                .zip(&handlers)
                .flat_map(|(levels, h)| levels.iter().filter(move |&&l| l == idx).map(move |_| h))
                .collect();
            let routed = table.handlers(level);

            prop_assert_eq!(routed.len(), expected.len());
            for (got, want) in routed.iter().zip(expected) {
                prop_assert!(Arc::ptr_eq(got, want));
            }
        }
    }

    /// Level names parse back to the same level
    #[test]
    fn test_log_level_str_roundtrip(idx in 0usize..5) {
        let level = LogLevel::ALL[idx];
        let parsed: LogLevel = level.as_str().parse().unwrap();
        prop_assert_eq!(level, parsed);
        prop_assert_eq!(level.as_str(), LEVELS[idx]);
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Default)]
struct CaptureSink(Mutex<Vec<String>>);

impl Sink for CaptureSink {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        self.0.lock().push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn name(&self) -> &str {
        "capture"
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// With escaping on, any message yields exactly one line
    #[test]
    fn test_one_call_one_line(chars in prop::collection::vec(any::<char>(), 0..40)) {
        let message: String = chars.into_iter().collect();
        let sink = Arc::new(CaptureSink::default());
        let logger = Logger::builder()
            .escape_line_breaks(true)
            .handler(Handler::new("$message").levels(["info"]).shared_sink(sink.clone()))
            .build();

        logger.info(format_args!("{}", message));

        let lines = sink.0.lock();
        prop_assert_eq!(lines.len(), 1);
        prop_assert_eq!(lines[0].matches('\n').count(), 1);
        prop_assert!(lines[0].ends_with('\n'));
        prop_assert!(!lines[0].contains('\r'));
    }

    /// Without escaping the message reaches the sink unchanged
    #[test]
    fn test_message_passes_through_unchanged(message in "[a-z \t\n]{0,40}") {
        let sink = Arc::new(CaptureSink::default());
        let logger = Logger::builder()
            .handler(Handler::new("$message").levels(["info"]).shared_sink(sink.clone()))
            .build();

        logger.info(format_args!("{}", message));

        let lines = sink.0.lock();
        prop_assert_eq!(lines.len(), 1);
        prop_assert_eq!(&lines[0], &format!("{}\n", message));
    }
}
