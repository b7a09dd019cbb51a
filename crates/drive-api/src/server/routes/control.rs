#[derive(Debug, Deserialize)]
struct TickRequest {
    #[serde(default)]
    signals: BTreeMap<String, bool>,
}

async fn run_tick(
    State(state): State<AppState>,
    Json(request): Json<TickRequest>,
) -> Result<Json<TickReport>, HttpApiError> {
    let report = {
        let mut inner = state.inner.lock().await;
        inner
            .tick(&request.signals, Utc::now())
            .map_err(HttpApiError::from_engine)?
    };

    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct SatisfyRequest {
    delta: f64,
}

#[derive(Debug, Serialize)]
struct SatisfyResponse {
    schema_version: String,
    drive: DriveView,
}

async fn satisfy_drive(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<SatisfyRequest>,
) -> Result<Json<SatisfyResponse>, HttpApiError> {
    let drive = {
        let mut inner = state.inner.lock().await;
        inner
            .satisfy(&name, request.delta, Utc::now())
            .map_err(HttpApiError::from_engine)?
    };

    Ok(Json(SatisfyResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        drive,
    }))
}
