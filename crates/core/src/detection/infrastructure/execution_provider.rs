use ort::execution_providers::ExecutionProviderDispatch;

/// ONNX execution providers to try for this platform, best first.
///
/// `ort` falls back to the CPU provider when none of these can be
/// initialized, so an empty list means plain CPU inference.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    let mut providers = Vec::new();

    #[cfg(target_os = "macos")]
    providers.push(ort::execution_providers::CoreMLExecutionProvider::default().build());

    #[cfg(target_os = "windows")]
    providers.push(ort::execution_providers::DirectMLExecutionProvider::default().build());

    providers
}
