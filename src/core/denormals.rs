//! Scoped flush-to-zero / denormals-are-zero floating point mode.
//!
//! Processing subnormal floats can be orders of magnitude slower on some
//! CPUs, which is fatal inside an audio callback. [`DenormalGuard`] switches
//! the current thread's FPU into flush-to-zero mode and restores the prior
//! control word when dropped, including during unwinding.

#[cfg(target_arch = "x86_64")]
mod arch {
    // FTZ (bit 15) | DAZ (bit 6)
    const FLUSH_BITS: u32 = 0x8040;

    pub type ControlWord = u32;

    #[allow(deprecated)]
    pub fn read() -> ControlWord {
        // SAFETY: reading MXCSR has no side effects; SSE is baseline on x86_64.
        unsafe { core::arch::x86_64::_mm_getcsr() }
    }

    #[allow(deprecated)]
    pub fn write(word: ControlWord) {
        // SAFETY: only the floating point control flags of this thread change.
        unsafe { core::arch::x86_64::_mm_setcsr(word) }
    }

    pub fn with_flush(word: ControlWord) -> ControlWord {
        word | FLUSH_BITS
    }

    pub fn flushes(word: ControlWord) -> bool {
        word & FLUSH_BITS == FLUSH_BITS
    }
}

#[cfg(target_arch = "aarch64")]
mod arch {
    // FPCR.FZ
    const FLUSH_BITS: u64 = 1 << 24;

    pub type ControlWord = u64;

    pub fn read() -> ControlWord {
        let word: u64;
        // SAFETY: reading FPCR has no side effects.
        unsafe { core::arch::asm!("mrs {}, fpcr", out(reg) word, options(nomem, nostack)) };
        word
    }

    pub fn write(word: ControlWord) {
        // SAFETY: only the floating point control flags of this thread change.
        unsafe { core::arch::asm!("msr fpcr, {}", in(reg) word, options(nomem, nostack)) };
    }

    pub fn with_flush(word: ControlWord) -> ControlWord {
        word | FLUSH_BITS
    }

    pub fn flushes(word: ControlWord) -> bool {
        word & FLUSH_BITS == FLUSH_BITS
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
mod arch {
    pub type ControlWord = ();

    pub fn read() -> ControlWord {}

    pub fn write(_word: ControlWord) {}

    pub fn with_flush(word: ControlWord) -> ControlWord {
        word
    }

    pub fn flushes(_word: ControlWord) -> bool {
        false
    }
}

/// RAII guard that enables flush-to-zero for its lifetime.
///
/// Guards nest: each one restores exactly the state it found.
#[must_use = "the previous floating point mode is restored as soon as the guard is dropped"]
pub struct DenormalGuard {
    previous: arch::ControlWord,
}

impl DenormalGuard {
    /// Enables flush-to-zero on the current thread.
    pub fn new() -> Self {
        let previous = arch::read();
        arch::write(arch::with_flush(previous));
        DenormalGuard { previous }
    }
}

impl Default for DenormalGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DenormalGuard {
    fn drop(&mut self) {
        arch::write(self.previous);
    }
}

/// Returns true if the current thread flushes denormals to zero.
///
/// Always false on architectures without a supported control register.
pub fn flush_to_zero_enabled() -> bool {
    arch::flushes(arch::read())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    fn test_guard_restores_mode() {
        let before = flush_to_zero_enabled();
        {
            let _guard = DenormalGuard::new();
            assert!(flush_to_zero_enabled());
            {
                let _inner = DenormalGuard::new();
                assert!(flush_to_zero_enabled());
            }
            assert!(flush_to_zero_enabled());
        }
        assert_eq!(flush_to_zero_enabled(), before);
    }

    #[test]
    #[cfg(target_arch = "x86_64")]
    fn test_subnormals_flushed_inside_scope() {
        let tiny = core::hint::black_box(f32::MIN_POSITIVE);
        let _guard = DenormalGuard::new();
        let product = core::hint::black_box(tiny) * core::hint::black_box(0.5f32);
        assert_eq!(product, 0.0);
    }
}
