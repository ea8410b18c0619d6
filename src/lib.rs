//! A minimal glTF 2.0 viewer: loads an asset, uploads its buffers and draws
//! its default scene with a single shader program.

pub mod renderer;
