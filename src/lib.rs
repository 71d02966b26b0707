//! # avcs
//!
//! 纯 Rust 实现的 H.264 软件解码前端.
//!
//! avcs 负责外部解码引擎之外的部分:
//! - **码流送入**: 任意大小输入块的累积, 逐单元驱动引擎, 失步恢复
//! - **图像分发**: 按引擎输出顺序回调宿主
//! - **残差反变换**: 4x4 / Luma DC / Chroma DC 反量化反变换, 标量与 SSE2 后端逐位一致
//! - **日志**: 控制台 + 按日期滚动的文件日志
//!
//! # 快速开始
//!
//! ```rust
//! use avcs::codec::transform::{Qp, TransformEngine};
//!
//! let engine = TransformEngine::detect();
//! let mut dc = [0i32; 8];
//! dc[0] = 1;
//! let out = engine.process_chroma_dc(&dc, Qp::new(12).unwrap());
//! println!("后端: {}, Cb DC: {:?}", engine.name(), &out[..4]);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `avcs-core` | 错误类型与帧几何 |
//! | `avcs-codec` | 码流送入, 图像分发, 反变换 |
//! | `avcs-ffi` | C 导出层 |

/// 错误类型与帧几何
pub use avcs_core as core;

/// 码流送入, 图像分发与反变换
pub use avcs_codec as codec;

pub mod logging;

/// 获取 avcs 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
