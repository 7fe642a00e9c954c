use super::*;

#[test]
fn empty_object_gives_defaults() {
    let config = SessionConfig::from_json_str("{}").unwrap();
    assert_eq!(config, SessionConfig::default());
    assert_eq!(config.window(), TrackWindow::default());
    assert!(config.autosave_on_frame_change);
}

#[test]
fn window_fields_are_read() {
    let config =
        SessionConfig::from_json_str(r#"{"trailing": 5, "leading": 2, "connect_nearest": true}"#)
            .unwrap();
    assert_eq!(config.window(), TrackWindow::bounded(5, 2));
    assert!(config.connect_nearest);
}

#[test]
fn rejects_negative_distances_and_unknown_keys() {
    let err = SessionConfig::from_json_str(r#"{"hit_tolerance": -1}"#).unwrap_err();
    assert!(matches!(err, AnnotrackError::Validation(_)));

    let err = SessionConfig::from_json_str(r#"{"hit_tolernce": 3}"#).unwrap_err();
    assert!(matches!(err, AnnotrackError::Serde(_)));
}
