pub mod app;
pub mod draw;
pub mod form;
