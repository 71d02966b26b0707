//! 外部解码引擎接口.
//!
//! 熵解码, 预测, 去块与参考帧管理均由外部引擎完成, 本 crate 只负责
//! 向引擎送入码流, 解释其返回状态并分发解码完成的图像.
//! 宿主通过实现 [`DecodeEngine`] 接入具体引擎.

use std::fmt;

use avcs_core::{AvcResult, StreamInfo};

use crate::config::ConcealmentMethod;
use crate::transform::TransformEngine;

// ============================================================
// 引擎状态码
// ============================================================

/// 引擎整数状态码
pub mod status_code {
    pub const OK: i32 = 0;
    pub const STRM_PROCESSED: i32 = 1;
    pub const PIC_RDY: i32 = 2;
    pub const PIC_RDY_BUFF_NOT_EMPTY: i32 = 3;
    pub const HDRS_RDY_BUFF_NOT_EMPTY: i32 = 4;
    pub const PARAM_ERR: i32 = -1;
    pub const STRM_ERR: i32 = -2;
    pub const NOT_INITIALIZED: i32 = -3;
    pub const MEMFAIL: i32 = -4;
    pub const INITFAIL: i32 = -5;
    pub const HDRS_NOT_RDY: i32 = -6;
}

/// 单次引擎调用的结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStatus {
    /// 序列头已解析, 缓冲区中仍有数据
    HeadersReady,
    /// 一帧图像解码完成
    PictureReady,
    /// 一帧图像解码完成, 缓冲区中仍有数据
    PictureReadyBufferNotEmpty,
    /// 已消费的数据未产生图像
    StreamProcessed,
    /// 码流错误 (失步)
    StreamError,
    /// 其他引擎状态码, 原样透传
    Other(i32),
}

impl DecodeStatus {
    /// 由引擎整数状态码转换
    pub const fn from_code(code: i32) -> Self {
        match code {
            status_code::HDRS_RDY_BUFF_NOT_EMPTY => Self::HeadersReady,
            status_code::PIC_RDY => Self::PictureReady,
            status_code::PIC_RDY_BUFF_NOT_EMPTY => Self::PictureReadyBufferNotEmpty,
            status_code::STRM_PROCESSED => Self::StreamProcessed,
            status_code::STRM_ERR => Self::StreamError,
            other => Self::Other(other),
        }
    }

    /// 对应的引擎整数状态码
    pub const fn code(self) -> i32 {
        match self {
            Self::HeadersReady => status_code::HDRS_RDY_BUFF_NOT_EMPTY,
            Self::PictureReady => status_code::PIC_RDY,
            Self::PictureReadyBufferNotEmpty => status_code::PIC_RDY_BUFF_NOT_EMPTY,
            Self::StreamProcessed => status_code::STRM_PROCESSED,
            Self::StreamError => status_code::STRM_ERR,
            Self::Other(code) => code,
        }
    }

    /// 是否表示一帧图像解码完成
    pub const fn is_picture_ready(self) -> bool {
        matches!(self, Self::PictureReady | Self::PictureReadyBufferNotEmpty)
    }
}

impl From<i32> for DecodeStatus {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

impl fmt::Display for DecodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeadersReady => write!(f, "HDRS_RDY_BUFF_NOT_EMPTY"),
            Self::PictureReady => write!(f, "PIC_RDY"),
            Self::PictureReadyBufferNotEmpty => write!(f, "PIC_RDY_BUFF_NOT_EMPTY"),
            Self::StreamProcessed => write!(f, "STRM_PROCESSED"),
            Self::StreamError => write!(f, "STRM_ERR"),
            Self::Other(code) => write!(f, "OTHER({code})"),
        }
    }
}

// ============================================================
// 引擎调用参数与结果
// ============================================================

/// 一次 `decode_step` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStep {
    /// 状态分类
    pub status: DecodeStatus,
    /// 引擎从缓冲区头部读取的字节数
    pub consumed: usize,
}

impl EngineStep {
    pub const fn new(status: DecodeStatus, consumed: usize) -> Self {
        Self { status, consumed }
    }
}

/// 引擎初始化选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// 按解码顺序输出图像 (关闭显示重排)
    pub no_reorder: bool,
    /// 帧内错误隐藏方式
    pub concealment: ConcealmentMethod,
    /// 宏块重建使用的反变换后端
    pub transform: TransformEngine,
}

/// 引擎输出的一帧图像
///
/// 像素数据借用自引擎内部缓冲区, 仅在下一次引擎调用前有效.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedPicture<'a> {
    /// 连续存放的 YUV 4:2:0 平面数据
    pub pixels: &'a [u8],
    /// 送入该帧数据时的图像编号
    pub pic_id: u32,
    /// 是否为 IDR 图像
    pub is_idr: bool,
    /// 经错误隐藏的宏块数
    pub error_macroblocks: u32,
}

impl<'a> DecodedPicture<'a> {
    /// 仅含像素数据的图像
    pub const fn new(pixels: &'a [u8], pic_id: u32) -> Self {
        Self {
            pixels,
            pic_id,
            is_idr: false,
            error_macroblocks: 0,
        }
    }
}

// ============================================================
// 引擎 trait
// ============================================================

/// 外部 H.264 解码引擎
///
/// 调用约定:
/// 1. `init()` 一次
/// 2. 反复调用 `decode_step()`, 每次传入缓冲区中全部未消费数据
/// 3. 报告图像就绪后, 反复调用 `next_picture()` 直到返回 `None`
/// 4. `release()` 释放引擎资源
pub trait DecodeEngine {
    /// 初始化引擎
    fn init(&mut self, options: &EngineOptions) -> AvcResult<()>;

    /// 从 `data` 头部解码至多一个单元
    ///
    /// `consumed` 超出 `data.len()` 时由调用方截断.
    fn decode_step(&mut self, data: &[u8], pic_id: u32) -> EngineStep;

    /// 当前码流信息, 仅在报告头部就绪之后有意义
    fn stream_info(&self) -> StreamInfo;

    /// 取出下一帧待输出图像
    ///
    /// `flush` 为 true 时输出引擎内缓存的全部图像 (码流结束).
    fn next_picture(&mut self, flush: bool) -> Option<DecodedPicture<'_>>;

    /// 释放引擎资源
    fn release(&mut self);
}
