use crate::buffer::AlertBuffer;
use crate::condition::{parse_sample, AlertCheck, CompareOp, Condition, Threshold, Variable};
use crate::units::{parse_interval, parse_size};
use crate::AlertError;
use chrono::{DateTime, Duration, Utc};
use disku_common::types::DiskUsage;

const GIB: u64 = 1 << 30;
const CONDITIONS: &str = "FREE == 100G, FREE   <\t 5G, USED     >10G, USED>95%";

fn usage(total: u64, used: u64, free: u64) -> DiskUsage {
    DiskUsage {
        total: total * GIB,
        used: used * GIB,
        free: free * GIB,
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::UNIX_EPOCH + Duration::seconds(secs)
}

// ── Units ──

#[test]
fn size_suffixes_scale_by_1024() {
    assert_eq!(parse_size("5G").unwrap(), 5 * GIB);
    assert_eq!(parse_size("5g").unwrap(), 5 * GIB);
    assert_eq!(parse_size("1K").unwrap(), 1024);
    assert_eq!(parse_size("3P").unwrap(), 3 << 50);
    assert_eq!(parse_size("1024").unwrap(), 1024);
}

#[test]
fn size_rejects_garbage_and_overflow() {
    assert!(matches!(
        parse_size("5X"),
        Err(AlertError::Parse { kind: "size", .. })
    ));
    assert!(parse_size("G").is_err());
    assert!(parse_size("").is_err());
    assert!(parse_size("1Y").is_err());
}

#[test]
fn interval_units() {
    assert_eq!(parse_interval("5").unwrap(), 5);
    assert_eq!(parse_interval("10s").unwrap(), 10);
    assert_eq!(parse_interval("10m").unwrap(), 600);
    assert_eq!(parse_interval("2h").unwrap(), 7200);
    assert_eq!(parse_interval("1d").unwrap(), 86400);
    assert_eq!(parse_interval("24h9d").unwrap(), 24 * 3600 + 9 * 86400);
    assert_eq!(parse_interval("1s1m1h").unwrap(), 1 + 60 + 3600);
    assert_eq!(
        parse_interval("1s2m3h4d").unwrap(),
        1 + 2 * 60 + 3 * 3600 + 4 * 86400
    );
    assert_eq!(parse_interval(" 1h 30m ").unwrap(), 5400);
}

#[test]
fn interval_rejects_malformed_input() {
    for bad in ["bogus", "", "   ", "1h30", "0m", "1w", "h1", "1h-"] {
        assert!(parse_interval(bad).is_err(), "{bad:?} should be rejected");
    }
}

// ── Grammar ──

#[test]
fn parses_conditions_in_order() {
    let check = AlertCheck::parse(CONDITIONS).unwrap();
    let conds = check.conditions();
    assert_eq!(conds.len(), 4);

    assert_eq!(conds[0].variable, Variable::Free);
    assert_eq!(conds[0].operator, CompareOp::Equal);
    assert_eq!(conds[0].threshold, Threshold::Bytes(100 * GIB));
    assert_eq!(conds[0].raw, "FREE == 100G");

    assert_eq!(conds[1].operator, CompareOp::LessThan);
    assert_eq!(conds[1].raw, "FREE   <\t 5G");

    assert_eq!(conds[3].variable, Variable::Used);
    assert_eq!(conds[3].threshold, Threshold::Ratio(0.95));
}

#[test]
fn percentage_grammar_bounds() {
    for ok in ["used > 0%", "used > 1%", "used > 99%", "used >= 100%"] {
        assert!(ok.parse::<Condition>().is_ok(), "{ok:?} should parse");
    }
    for bad in ["used > 101%", "used > 05%", "used > 150%", "used > 5.5%"] {
        assert!(bad.parse::<Condition>().is_err(), "{bad:?} should fail");
    }
}

#[test]
fn size_grammar_only_admits_k_to_p() {
    assert!("free < 5P".parse::<Condition>().is_ok());
    assert!("free < 5E".parse::<Condition>().is_err());
    assert!("free < 5g".parse::<Condition>().is_err());
    assert!("free < 0".parse::<Condition>().is_err());
    assert!("free <= 123456".parse::<Condition>().is_ok());
}

#[test]
fn one_bad_condition_rejects_the_whole_list() {
    let err = AlertCheck::parse("FREE < 5G, USED >> 10G").unwrap_err();
    match err {
        AlertError::Parse { kind, fragment } => {
            assert_eq!(kind, "condition");
            assert_eq!(fragment, "USED >> 10G");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(AlertCheck::parse("FREE < 5G,").is_err());
    assert!(AlertCheck::parse("").is_err());
    assert!(AlertCheck::parse("inodes < 5G").is_err());
}

#[test]
fn reserializing_conditions_preserves_count_and_order() {
    let check = AlertCheck::parse(CONDITIONS).unwrap();
    let rendered = check
        .conditions()
        .iter()
        .map(|c| {
            let literal = c.raw.split(|ch: char| "<>=".contains(ch)).last().unwrap();
            format!("{}{}{}", c.variable, c.operator, literal.trim())
        })
        .collect::<Vec<_>>()
        .join(",");

    let reparsed = AlertCheck::parse(&rendered).unwrap();
    assert_eq!(reparsed.conditions().len(), check.conditions().len());
    for (a, b) in reparsed.conditions().iter().zip(check.conditions()) {
        assert_eq!(a.variable, b.variable);
        assert_eq!(a.operator, b.operator);
        assert_eq!(a.threshold, b.threshold);
    }
}

// ── Evaluation ──

#[test]
fn first_matching_condition_wins() {
    let check = AlertCheck::parse(CONDITIONS).unwrap();

    assert_eq!(check.evaluate(&usage(100, 96, 4)), Some("FREE   <\t 5G"));
    assert_eq!(check.evaluate(&usage(100, 90, 10)), Some("USED     >10G"));
    assert_eq!(check.evaluate(&usage(100, 9, 91)), None);
    assert_eq!(check.evaluate(&usage(100, 0, 100)), Some("FREE == 100G"));
}

#[test]
fn percentage_compares_against_ratio() {
    let check = AlertCheck::parse("used > 95%, free <= 10%").unwrap();
    assert_eq!(check.evaluate(&usage(100, 96, 4)), Some("used > 95%"));
    assert_eq!(check.evaluate(&usage(100, 90, 10)), Some("free <= 10%"));
    assert_eq!(check.evaluate(&usage(100, 50, 50)), None);
}

#[test]
fn sample_keys_are_case_insensitive() {
    let check = AlertCheck::parse("free < 5G").unwrap();
    let sample = serde_json::json!({ "TOTAL": 100 * GIB, "Used": 96 * GIB, "free": 4 * GIB });
    assert_eq!(check.check(&sample).unwrap(), Some("free < 5G"));
}

#[test]
fn missing_total_is_invalid_sample() {
    let check = AlertCheck::parse("free < 5G").unwrap();
    let sample = serde_json::json!({ "used": 1, "free": 1 });
    assert!(matches!(
        check.check(&sample),
        Err(AlertError::InvalidSample(_))
    ));
    assert!(parse_sample(&serde_json::json!([1, 2, 3])).is_err());
    assert!(parse_sample(&serde_json::json!({ "used": -1, "free": 1, "total": 0 })).is_err());
}

// ── Buffer ──

#[test]
fn first_push_flushes_immediately() {
    let mut buffer = AlertBuffer::new(10);
    let batch = buffer.push("web-01", "disk full", at(0)).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch["web-01"], "disk full");
    assert!(buffer.pending().is_empty());
    assert_eq!(buffer.next_flush(), at(10));
}

#[test]
fn pushes_within_window_accumulate_then_flush_together() {
    let mut buffer = AlertBuffer::new(10);
    buffer.push("web-01", "first", at(0)).unwrap();

    assert!(buffer.push("web-01", "second", at(3)).is_none());
    assert!(buffer.push("db-01", "third", at(5)).is_none());
    assert!(buffer.push("web-01", "fourth", at(9)).is_none());
    assert_eq!(buffer.pending().len(), 2);

    let batch = buffer.push("cache-01", "fifth", at(12)).unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch["web-01"], "fourth");
    assert_eq!(batch["db-01"], "third");
    assert_eq!(batch["cache-01"], "fifth");
    assert_eq!(buffer.next_flush(), at(22));
}

#[test]
fn pending_alerts_wait_for_the_next_push() {
    let mut buffer = AlertBuffer::new(10);
    buffer.push("web-01", "first", at(0)).unwrap();
    assert!(buffer.push("web-01", "second", at(5)).is_none());

    // The window expired long ago, but nothing flushes without a push.
    assert_eq!(buffer.pending().len(), 1);
    assert_eq!(buffer.pending()["web-01"], "second");

    let batch = buffer.push("db-01", "late", at(1000)).unwrap();
    assert_eq!(batch.len(), 2);
}

#[test]
fn flush_due_respects_deadline_and_empty_buffer() {
    let mut buffer = AlertBuffer::new(10);
    assert!(buffer.flush_due(at(0)).is_none());
    assert_eq!(buffer.next_flush(), DateTime::UNIX_EPOCH);

    buffer.push("web-01", "first", at(0)).unwrap();
    buffer.push("web-01", "second", at(1));
    assert!(buffer.flush_due(at(9)).is_none());
    assert_eq!(buffer.flush_due(at(10)).unwrap()["web-01"], "second");
}

#[test]
fn huge_interval_does_not_overflow() {
    let mut buffer = AlertBuffer::new(u64::MAX);
    assert!(buffer.push("web-01", "first", at(0)).is_some());
    assert!(buffer.push("web-01", "second", at(1_000_000_000)).is_none());
}
