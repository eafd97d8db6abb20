//! Runtime-sized FFT dispatch over `microfft`'s fixed-size transforms.

use crate::error::EngineError;
use num_complex::Complex32;

/// Smallest supported transform size.
pub const MIN_FFT_SIZE: usize = 256;
/// Largest supported transform size.
pub const MAX_FFT_SIZE: usize = 4096;

/// Returns the transform size used for a window of `window_len` samples.
///
/// This is the next power of two, clamped to `MIN_FFT_SIZE..=MAX_FFT_SIZE`.
pub fn fft_size_for(window_len: usize) -> usize {
    window_len
        .max(MIN_FFT_SIZE)
        .checked_next_power_of_two()
        .unwrap_or(MAX_FFT_SIZE)
        .min(MAX_FFT_SIZE)
}

macro_rules! dispatch {
    ($buffer:expr, $($size:literal => $func:path),+ $(,)?) => {
        match $buffer.len() {
            $(
                $size => {
                    let fixed = <&mut [Complex32; $size]>::try_from(&mut *$buffer)
                        .map_err(|_| EngineError::Fft($size))?;
                    let _ = $func(fixed);
                    Ok(())
                }
            )+
            other => Err(EngineError::Fft(other)),
        }
    };
}

/// In-place forward transform. The buffer length selects the transform size.
pub fn forward(buffer: &mut [Complex32]) -> Result<(), EngineError> {
    dispatch!(
        buffer,
        256 => microfft::complex::cfft_256,
        512 => microfft::complex::cfft_512,
        1024 => microfft::complex::cfft_1024,
        2048 => microfft::complex::cfft_2048,
        4096 => microfft::complex::cfft_4096,
    )
}

/// In-place inverse transform, scaled by `1 / N`.
pub fn inverse(buffer: &mut [Complex32]) -> Result<(), EngineError> {
    for x in buffer.iter_mut() {
        *x = x.conj();
    }
    forward(buffer)?;
    let scale = 1.0 / buffer.len() as f32;
    for x in buffer.iter_mut() {
        *x = x.conj() * scale;
    }
    Ok(())
}
