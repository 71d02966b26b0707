//! # avcs-codec
//!
//! H.264 软件解码前端: 码流增量送入状态机, 图像分发与残差反量化反变换.
//!
//! 完整的熵解码, 预测与去块流程由外部解码引擎完成 (见 [`DecodeEngine`]),
//! 本 crate 负责:
//! - 将任意大小的输入块累积到可增长缓冲区, 逐单元驱动引擎并从失步中恢复
//! - 按引擎输出顺序将解码完成的图像交付给 [`PictureSink`]
//! - 提供 4x4 残差块与 Luma/Chroma DC 的反量化反变换 (标量与 SSE2 两套后端)
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use avcs_codec::{DecoderConfig, StreamDecoder};
//!
//! let mut decoder = StreamDecoder::new(engine, DecoderConfig::default());
//! decoder.init(false)?;
//! decoder.set_callback(|yuv: &[u8], width, height| {
//!     println!("图像 {width}x{height}, {} 字节", yuv.len());
//! });
//! for chunk in stream.chunks(4096) {
//!     decoder.decode(chunk)?;
//! }
//! decoder.flush()?;
//! ```

pub mod config;
pub mod decoder;
pub mod engine;
pub mod stream;
pub mod transform;

// 重导出常用类型
pub use config::{ConcealmentMethod, DecoderConfig};
pub use decoder::{DecoderStats, InitStatus, StreamDecoder};
pub use engine::{DecodeEngine, DecodeStatus, DecodedPicture, EngineOptions, EngineStep};
pub use stream::{PictureSink, StreamBuffer};
pub use transform::{Qp, RangeViolation, TransformEngine, TransformPreference};
