//! # avcs-core
//!
//! avcs 核心库, 提供统一错误类型与帧几何描述.
//!
//! 解码前端 (`avcs-codec`) 与 C 导出层 (`avcs-ffi`) 共用本 crate 的类型.

pub mod error;
pub mod geometry;

// 重导出常用类型
pub use error::{AvcError, AvcResult};
pub use geometry::{CropWindow, FrameGeometry, StreamInfo};
