pub mod onnx_mask_classifier;
