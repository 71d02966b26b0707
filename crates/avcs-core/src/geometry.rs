//! 帧几何与码流信息.
//!
//! 解码输出统一为 YUV 4:2:0 平面格式:
//! ```text
//! ┌──────────────┐
//! │ Y  w × h     │
//! ├──────┬───────┘
//! │ U w/2 × h/2  │
//! ├──────┤
//! │ V w/2 × h/2  │
//! └──────┘
//! ```
//! 三个平面在同一缓冲区中连续存放.

use std::fmt;

/// 帧几何 (像素宽高)
///
/// 仅在引擎报告头部就绪之后有效, 直到下一次头部就绪前保持不变.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameGeometry {
    /// 图像宽度 (像素)
    pub width: u32,
    /// 图像高度 (像素)
    pub height: u32,
}

impl FrameGeometry {
    /// 创建帧几何
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 宽高均非零
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// 亮度平面字节数
    pub fn luma_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// 单个色度平面字节数
    pub fn chroma_len(&self) -> usize {
        (self.width as usize / 2) * (self.height as usize / 2)
    }

    /// 完整 YUV 4:2:0 图像字节数
    pub fn yuv420_len(&self) -> usize {
        self.luma_len() + 2 * self.chroma_len()
    }

    /// 宽高对应的宏块数量 (16x16)
    pub fn macroblocks(&self) -> (u32, u32) {
        (self.width.div_ceil(16), self.height.div_ceil(16))
    }
}

impl fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 裁剪窗口 (像素单位)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CropWindow {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// 引擎报告的码流信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamInfo {
    /// 解码图像尺寸 (宏块对齐)
    pub geometry: FrameGeometry,
    /// 显示裁剪窗口, `None` 表示不裁剪
    pub crop: Option<CropWindow>,
    /// 像素宽高比 (num, den), 未知时为 (0, 0)
    pub sample_aspect: (u32, u32),
}

impl StreamInfo {
    /// 仅含尺寸的码流信息
    pub fn from_geometry(geometry: FrameGeometry) -> Self {
        Self {
            geometry,
            crop: None,
            sample_aspect: (0, 0),
        }
    }
}

impl From<FrameGeometry> for StreamInfo {
    fn from(geometry: FrameGeometry) -> Self {
        Self::from_geometry(geometry)
    }
}
