//! 图像分发.
//!
//! 每个单元解码完成后, 从引擎取出全部待输出图像, 按引擎输出顺序
//! 逐帧调用已注册的 [`PictureSink`]. 几何未知或像素数据不足的图像被丢弃,
//! 宿主不会收到无法安全索引的缓冲区.

use std::fmt;

use avcs_core::FrameGeometry;
use log::{trace, warn};

use crate::decoder::DecoderStats;
use crate::engine::DecodeEngine;

/// 丢弃告警的最大输出次数
const MAX_REJECT_WARNINGS: u32 = 8;

/// 图像接收方
///
/// 在 `decode` 调用内部同步调用, 像素数据仅在本次调用期间有效.
pub trait PictureSink {
    /// 接收一帧 YUV 4:2:0 图像
    fn on_picture(&mut self, pixels: &[u8], width: u32, height: u32);
}

impl<F> PictureSink for F
where
    F: FnMut(&[u8], u32, u32),
{
    fn on_picture(&mut self, pixels: &[u8], width: u32, height: u32) {
        self(pixels, width, height)
    }
}

/// 图像分发器
#[derive(Default)]
pub struct PictureDispatcher {
    sink: Option<Box<dyn PictureSink>>,
    rejected: u32,
}

impl fmt::Debug for PictureDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PictureDispatcher")
            .field("has_sink", &self.sink.is_some())
            .field("rejected", &self.rejected)
            .finish()
    }
}

impl PictureDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 替换接收方, `None` 表示注销
    pub fn set_sink(&mut self, sink: Option<Box<dyn PictureSink>>) {
        self.sink = sink;
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// 取出引擎中全部待输出图像并分发, 返回交付给接收方的帧数
    pub(crate) fn drain<E: DecodeEngine>(
        &mut self,
        engine: &mut E,
        geometry: Option<FrameGeometry>,
        flush: bool,
        stats: &mut DecoderStats,
    ) -> usize {
        let mut emitted = 0usize;
        while let Some(picture) = engine.next_picture(flush) {
            stats.pictures_decoded += 1;

            let Some(sink) = self.sink.as_mut() else {
                stats.pictures_dropped += 1;
                trace!("AVCS: 未注册接收方, 丢弃图像 pic_id={}", picture.pic_id);
                continue;
            };

            let geometry = match geometry {
                Some(g) if g.is_valid() => g,
                _ => {
                    stats.pictures_dropped += 1;
                    Self::record_rejected(&mut self.rejected, "几何未知", picture.pic_id, 0, 0);
                    continue;
                }
            };

            let expected = geometry.yuv420_len();
            if picture.pixels.len() < expected {
                stats.pictures_dropped += 1;
                Self::record_rejected(
                    &mut self.rejected,
                    "像素数据不足",
                    picture.pic_id,
                    picture.pixels.len(),
                    expected,
                );
                continue;
            }

            trace!(
                "AVCS: 输出图像 pic_id={}, {}, idr={}, err_mbs={}",
                picture.pic_id, geometry, picture.is_idr, picture.error_macroblocks
            );
            sink.on_picture(
                &picture.pixels[..expected],
                geometry.width,
                geometry.height,
            );
            stats.pictures_emitted += 1;
            emitted += 1;
        }
        emitted
    }

    fn record_rejected(counter: &mut u32, reason: &str, pic_id: u32, got: usize, expected: usize) {
        *counter = counter.saturating_add(1);
        if *counter <= MAX_REJECT_WARNINGS {
            warn!(
                "AVCS: 丢弃图像, reason={}, pic_id={}, len={}, expected={}",
                reason, pic_id, got, expected
            );
        } else if *counter == MAX_REJECT_WARNINGS + 1 {
            warn!("AVCS: 丢弃图像日志过多, 后续同类日志省略");
        }
    }
}
