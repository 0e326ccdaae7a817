pub mod dyn_clone;
