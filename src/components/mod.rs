pub mod history;
pub mod text_overlay;
