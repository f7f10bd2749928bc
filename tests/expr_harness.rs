//! Expression helper integration harness.
//!
//! # What this covers
//!
//! - **Split and rebuild**: `format_query` inverts `parse_query` for any
//!   selector plus free-text filter.
//! - **Label injection**: adding a label filter is idempotent and keeps the
//!   regexp filter intact.
//! - **Datasource surface**: `LokiDatasource::modify_query` applies actions
//!   without touching the other query fields.
//!
//! # Running
//!
//! ```sh
//! cargo test --test expr_harness
//! ```

mod common;
use common::*;

use lokiq::{QueryAction, RawQuery};
use lokiq_core::expr::{add_label_to_selector, apply_action, format_query, parse_query};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use std::sync::Arc;

fn label_value() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,12}"
}

fn selector() -> impl Strategy<Value = String> {
    prop::collection::btree_map("[a-z_]{1,8}", label_value(), 1..4).prop_map(|m| {
        let body: Vec<String> = m.iter().map(|(k, v)| format!("{k}=\"{v}\"")).collect();
        format!("{{{}}}", body.join(","))
    })
}

fn regexp() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[a-z0-9.*|]{1,10}( [a-z0-9]{1,6})?"]
}

proptest! {
    #[test]
    fn format_inverts_parse(sel in selector(), re in regexp()) {
        let parsed = parse_query(&format_query(&sel, &re));
        prop_assert_eq!(parsed.selector, sel);
        prop_assert_eq!(parsed.regexp, re);
    }

    #[test]
    fn add_filter_is_idempotent(sel in selector(), key in "[a-z_]{1,8}", value in label_value()) {
        let once = add_label_to_selector(&sel, &key, &value);
        let twice = add_label_to_selector(&once, &key, &value);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn add_filter_keeps_regexp(sel in selector(), re in regexp(), value in label_value()) {
        let action = QueryAction::AddFilter { key: "level".into(), value };
        let modified = apply_action(&format_query(&sel, &re), &action);
        prop_assert_eq!(parse_query(&modified).regexp, re);
    }
}

#[rstest]
#[case::empty_selector("", "level", "error", r#"{level="error"}"#)]
#[case::sorted("{job=\"api\"}", "env", "prod", r#"{env="prod",job="api"}"#)]
#[case::replaces_equality("{job=\"api\"}", "job", "worker", r#"{job="worker"}"#)]
#[case::keeps_regex_matcher("{job=~\"a.*\"}", "job", "api", r#"{job="api",job=~"a.*"}"#)]
fn add_label_cases(
    #[case] selector: &str,
    #[case] key: &str,
    #[case] value: &str,
    #[case] expected: &str,
) {
    assert_eq!(add_label_to_selector(selector, key, value), expected);
}

#[test]
fn datasource_modify_query_only_touches_expression() {
    let ds = datasource_with(Arc::new(ScriptedTransport::new(no_streams())), 100);
    let query = RawQuery::new("B", r#"{job="api"} timeout"#).suppressed(true);
    let modified = ds.modify_query(
        &query,
        QueryAction::AddFilter {
            key: "env".into(),
            value: "prod".into(),
        },
    );
    assert_eq!(modified.expression, r#"{env="prod",job="api"} timeout"#);
    assert_eq!(modified.ref_id, "B");
    assert!(modified.suppressed);
}
