use docattr_core::Pipeline;

use crate::admission::AdmissionConfig;

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub admission: AdmissionConfig,
}

impl AppState {
    pub fn new(pipeline: Pipeline, admission: AdmissionConfig) -> Self {
        Self {
            pipeline,
            admission,
        }
    }
}
