pub mod alerts;
pub mod drawdown;
pub mod evaluation;
pub mod position_sizer;
pub mod recovery;
