pub mod debounce;
pub mod sink;
