//! Handler 共用的响应与校验辅助函数

pub mod response;
pub mod validation;

pub use validation::*;
