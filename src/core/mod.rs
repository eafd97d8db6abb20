pub mod denormals;
pub mod engine;
pub mod fft;
