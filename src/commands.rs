pub mod inspect;
mod output;
pub mod run;
pub mod sweep;
