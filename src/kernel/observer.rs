use tokio::sync::mpsc;

use super::event::{SaveEvent, SaveFailure, SaveResult};

/// Receives terminal save outcomes. Skips are never reported.
pub trait SaveObserver: Send + Sync {
    fn on_save(&self, result: &SaveResult);
    fn on_error(&self, failure: &SaveFailure);
}

type OnSave = Box<dyn Fn(&SaveResult) + Send + Sync>;
type OnError = Box<dyn Fn(&SaveFailure) + Send + Sync>;

/// Closure-based observer; either callback may be left unset.
#[derive(Default)]
pub struct SaveCallbacks {
    on_save: Option<OnSave>,
    on_error: Option<OnError>,
}

impl SaveCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_save(mut self, f: impl Fn(&SaveResult) + Send + Sync + 'static) -> Self {
        self.on_save = Some(Box::new(f));
        self
    }

    pub fn with_error(mut self, f: impl Fn(&SaveFailure) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl SaveObserver for SaveCallbacks {
    fn on_save(&self, result: &SaveResult) {
        if let Some(f) = &self.on_save {
            f(result);
        }
    }

    fn on_error(&self, failure: &SaveFailure) {
        if let Some(f) = &self.on_error {
            f(failure);
        }
    }
}

impl SaveObserver for mpsc::UnboundedSender<SaveEvent> {
    fn on_save(&self, result: &SaveResult) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.send(SaveEvent::Saved(result.clone()));
    }

    fn on_error(&self, failure: &SaveFailure) {
        let _ = self.send(SaveEvent::Failed(failure.clone()));
    }
}
