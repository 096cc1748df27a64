mod layout;

pub use layout::{draw_ui, plain, render, summary, Theme, ViewOptions};
