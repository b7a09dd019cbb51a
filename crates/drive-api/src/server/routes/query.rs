#[derive(Debug, Serialize)]
struct DrivesResponse {
    schema_version: String,
    drives: Vec<DriveView>,
}

async fn list_drives(State(state): State<AppState>) -> Result<Json<DrivesResponse>, HttpApiError> {
    let drives = {
        let inner = state.inner.lock().await;
        inner.drives().map_err(HttpApiError::from_engine)?
    };

    Ok(Json(DrivesResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        drives,
    }))
}

#[derive(Debug, Serialize)]
struct DriveResponse {
    schema_version: String,
    drive: DriveView,
}

async fn get_drive(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DriveResponse>, HttpApiError> {
    let drive = {
        let inner = state.inner.lock().await;
        inner.drive(&name).map_err(HttpApiError::from_engine)?
    };

    let Some(drive) = drive else {
        return Err(HttpApiError::drive_not_found(&name));
    };

    Ok(Json(DriveResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        drive,
    }))
}

#[derive(Debug, Deserialize, Default)]
struct TriggersQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct TriggersPage {
    schema_version: String,
    total: usize,
    triggers: Vec<TriggerEvent>,
}

async fn list_triggers(
    State(state): State<AppState>,
    Query(query): Query<TriggersQuery>,
) -> Result<Json<TriggersPage>, HttpApiError> {
    let limit = clamp_limit(query.limit);
    let (total, triggers) = {
        let inner = state.inner.lock().await;
        inner.triggers(limit).map_err(HttpApiError::from_engine)?
    };

    Ok(Json(TriggersPage {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        total,
        triggers,
    }))
}

async fn get_status(State(state): State<AppState>) -> Result<Json<EngineStatus>, HttpApiError> {
    let status = {
        let inner = state.inner.lock().await;
        inner.status().map_err(HttpApiError::from_engine)?
    };

    Ok(Json(status))
}

#[derive(Debug, Deserialize, Default)]
struct ContextQuery {
    recent: Option<usize>,
    format: Option<String>,
}

async fn get_context(
    State(state): State<AppState>,
    Query(query): Query<ContextQuery>,
) -> Result<Response, HttpApiError> {
    let recent = clamp_limit(query.recent);
    let document = {
        let inner = state.inner.lock().await;
        inner
            .context(recent, Utc::now())
            .map_err(HttpApiError::from_engine)?
    };

    match query.format.as_deref() {
        None | Some("json") => Ok(Json(document).into_response()),
        Some("text") => Ok(text_response(document.to_string())),
        Some(other) => Err(HttpApiError::invalid_query(
            "format must be json or text",
            Some(format!("format={other}")),
        )),
    }
}

async fn get_snapshot(State(state): State<AppState>) -> Result<Json<StateSnapshot>, HttpApiError> {
    let snapshot = {
        let inner = state.inner.lock().await;
        inner.snapshot(Utc::now()).map_err(HttpApiError::from_engine)?
    };

    Ok(Json(snapshot))
}
