pub mod sklearn_onnx;
