use super::*;

#[test]
fn limits_are_clamped_into_range() {
    assert_eq!(clamp_limit(None), DEFAULT_PAGE_SIZE);
    assert_eq!(clamp_limit(Some(0)), 1);
    assert_eq!(clamp_limit(Some(7)), 7);
    assert_eq!(clamp_limit(Some(10_000)), MAX_PAGE_SIZE);
}

#[test]
fn engine_errors_map_to_api_codes() {
    let err = HttpApiError::from_engine(EngineError::Satisfaction(
        SatisfactionError::UnknownDrive {
            name: "ghost".to_string(),
        },
    ));
    assert_eq!(err.status, StatusCode::NOT_FOUND);
    assert_eq!(err.error.error_code, ErrorCode::DriveNotFound);

    let err = HttpApiError::from_engine(EngineError::Satisfaction(
        SatisfactionError::InvalidDelta {
            drive: "alpha".to_string(),
            delta: -1.0,
        },
    ));
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.error.error_code, ErrorCode::InvalidDelta);

    let err = HttpApiError::from_engine(EngineError::Config(
        drive_core::ConfigError::NegativeCooldown { minutes: -5 },
    ));
    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.error.error_code, ErrorCode::InvalidConfig);
}
