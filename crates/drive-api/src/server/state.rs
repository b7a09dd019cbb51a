#[derive(Clone)]
struct AppState {
    inner: std::sync::Arc<Mutex<EngineApi>>,
}

impl AppState {
    fn new(engine: EngineApi) -> Self {
        Self {
            inner: std::sync::Arc::new(Mutex::new(engine)),
        }
    }
}
