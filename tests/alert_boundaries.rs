// tests/alert_boundaries.rs
//
// Every numeric alert threshold is exclusive: a reading on the boundary stays
// quiet, the next step above it fires.

use terratrack::alerts::{evaluate, Category, MetricSnapshot, Severity};

fn snap(f: impl FnOnce(&mut MetricSnapshot)) -> MetricSnapshot {
    let mut s = MetricSnapshot::default();
    f(&mut s);
    s
}

#[test]
fn aqi_300_is_high_301_is_critical() {
    let at = evaluate(&snap(|s| s.aqi = Some(300.0)));
    assert_eq!(at.len(), 1);
    assert_eq!(at[0].severity, Severity::High);

    let above = evaluate(&snap(|s| s.aqi = Some(301.0)));
    assert_eq!(above[0].severity, Severity::Critical);
    assert_eq!(above[0].category, Category::Air);
}

#[test]
fn pm25_55_is_quiet_55_1_fires() {
    assert!(evaluate(&snap(|s| s.pm25 = Some(55.0))).is_empty());
    let fired = evaluate(&snap(|s| s.pm25 = Some(55.1)));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].severity, Severity::Medium);
}

#[test]
fn remaining_boundaries_are_exclusive() {
    let quiet = [
        snap(|s| s.pm10 = Some(154.0)),
        snap(|s| s.o3 = Some(100.0)),
        snap(|s| s.no2 = Some(100.0)),
        snap(|s| s.wind_speed = Some(10.0)),
        snap(|s| s.humidity = Some(80.0)),
        snap(|s| s.co2_growth_pct = Some(3.0)),
        snap(|s| s.co2_per_capita = Some(8.0)),
        snap(|s| s.annual_co2 = Some(1e9)),
    ];
    for s in &quiet {
        assert!(evaluate(s).is_empty(), "{s:?} should not alert");
    }

    let loud = [
        (snap(|s| s.pm10 = Some(154.5)), Severity::Medium),
        (snap(|s| s.o3 = Some(100.5)), Severity::Medium),
        (snap(|s| s.no2 = Some(101.0)), Severity::Medium),
        (snap(|s| s.wind_speed = Some(10.1)), Severity::Medium),
        (snap(|s| s.wind_speed = Some(15.1)), Severity::High),
        (snap(|s| s.humidity = Some(80.5)), Severity::Medium),
        (snap(|s| s.co2_growth_pct = Some(3.01)), Severity::High),
        (snap(|s| s.co2_per_capita = Some(8.01)), Severity::Medium),
        (snap(|s| s.annual_co2 = Some(1.0e9 + 1.0)), Severity::High),
    ];
    for (s, want) in &loud {
        let got = evaluate(s);
        assert_eq!(got.len(), 1, "{s:?}");
        assert_eq!(got[0].severity, *want, "{s:?}");
    }
}
