use ort::execution_providers::ExecutionProviderDispatch;

use crate::shared::worker_config::Device;

/// ONNX execution providers for the configured device.
///
/// An empty list means ONNX Runtime's default CPU provider. Without the
/// `cuda` feature a GPU request also falls back to CPU.
pub fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
    match device {
        #[cfg(feature = "cuda")]
        Device::Cuda => vec![ort::execution_providers::CUDAExecutionProvider::default().build()],
        #[cfg(not(feature = "cuda"))]
        Device::Cuda => {
            log::warn!("Built without CUDA support, ONNX models will run on CPU");
            vec![]
        }
        Device::Cpu => vec![],
    }
}

/// Build an ONNX session for `model_path` on `device`.
pub fn build_session(
    model_path: &std::path::Path,
    device: Device,
) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(execution_providers(device))?
        .commit_from_file(model_path)?;
    Ok(session)
}
