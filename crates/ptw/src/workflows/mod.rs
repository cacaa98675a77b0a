pub mod permits;
