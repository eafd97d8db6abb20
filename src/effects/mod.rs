pub mod dynamics;
pub mod spectral;
