pub mod cost;
pub mod humanize;
pub mod save;
