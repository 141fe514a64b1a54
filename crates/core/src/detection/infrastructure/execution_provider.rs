use ort::execution_providers::ExecutionProviderDispatch;

/// Hardware execution providers to register on every face model session.
///
/// ONNX Runtime falls back to CPU when a listed provider can't be used, so
/// an empty list means CPU only.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Name of the preferred accelerator, for startup logs.
pub fn accelerator_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "coreml"
    } else if cfg!(target_os = "windows") {
        "directml"
    } else {
        "cpu"
    }
}
