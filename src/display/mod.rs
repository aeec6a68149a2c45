pub mod renderer;

pub use renderer::KeyRenderer;
