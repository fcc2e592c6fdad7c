pub mod manage;
pub mod serve;
