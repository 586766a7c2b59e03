pub mod cli;
pub mod lint;
pub mod worker;
