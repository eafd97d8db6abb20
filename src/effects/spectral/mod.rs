pub mod formant;
pub mod stretch;
