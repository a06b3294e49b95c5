/// Return the preferred ONNX execution providers for the current platform.
///
/// An empty list leaves ONNX Runtime on its default CPU provider; the
/// platform providers themselves fall back to CPU when unavailable.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
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

/// Builds an ONNX Runtime session for `model_path` with the platform's
/// preferred providers. Shared by the face locator and the mask classifier.
pub fn build_session(
    model_path: &std::path::Path,
) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}
