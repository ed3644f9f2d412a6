// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use trackfill::config::{Config, QueueCapacity, QueueSettings, SourceKind};
use trackfill::stages::TrackerKind;
use trackfill::{AppError, Region};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.source, SourceKind::V4l2);
    assert_eq!(config.tracker, TrackerKind::Template);
    assert_eq!(config.region, None);
    assert!(!config.headless);
    assert!(config.validate().is_ok(), "defaults must be runnable");
}

#[test]
fn test_default_queues() {
    // Pipeline queues hold one item; the display tee never rejects
    let queues = QueueSettings::default();
    assert_eq!(queues.capture, QueueCapacity::Bounded(1));
    assert_eq!(queues.track, QueueCapacity::Bounded(1));
    assert_eq!(queues.inpaint, QueueCapacity::Bounded(1));
    assert_eq!(queues.display, QueueCapacity::Unbounded);
}

#[test]
fn test_default_region_fallback() {
    let config = Config::default();
    assert_eq!(config.region_or_default(), Region::new(287, 23, 86, 320));

    let config = Config {
        region: Some(Region::new(1, 1, 5, 5)),
        ..Config::default()
    };
    assert_eq!(config.region_or_default(), Region::new(1, 1, 5, 5));
}

#[test]
fn test_config_json_round_trip() {
    let config = Config {
        source: SourceKind::Synthetic,
        tracker: TrackerKind::Fixed,
        region: Some(Region::new(10, 20, 30, 40)),
        ..Config::default()
    };
    let json = config.to_json_pretty().unwrap();
    assert!(json.contains("\"synthetic\""));
    assert!(json.contains("\"unbounded\""));
    assert_eq!(Config::from_json(&json).unwrap(), config);
}

#[test]
fn test_invalid_json_is_config_error() {
    let result = Config::from_json("{\"fps\": \"fast\"}");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn test_validate_rejects_empty_region() {
    let config = Config {
        region: Some(Region::new(0, 0, 0, 10)),
        ..Config::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_region_from_str() {
    assert_eq!("1,2,3,4".parse::<Region>(), Ok(Region::new(1, 2, 3, 4)));
    assert!("1,2,3".parse::<Region>().is_err());
    assert!("1,2,0,4".parse::<Region>().is_err());
}
