//! 解码驱动循环.
//!
//! 反复以缓冲区全部未消费数据调用引擎, 按返回状态移除已消费字节,
//! 直到无法再取出完整单元为止.
//!
//! 引擎可以在一次调用中不消费任何字节 (激活参数集, 隐藏未完成图像),
//! 下一次调用再以相同数据前进. 连续两次未消费时停止, 字节保留到下次送入.
//! 每个缩短缓冲区的轮次之前至多有一次未消费的轮次, 因此引擎调用次数不超过 `2 * len + 2`.

use avcs_core::StreamInfo;
use log::{debug, trace, warn};

use super::buffer::StreamBuffer;
use super::dispatch::PictureDispatcher;
use crate::decoder::DecoderStats;
use crate::engine::{DecodeEngine, DecodeStatus};

/// 驱动循环所需的解码器状态
pub(crate) struct DriveContext<'a, E: DecodeEngine> {
    pub engine: &'a mut E,
    pub buffer: &'a mut StreamBuffer,
    pub dispatcher: &'a mut PictureDispatcher,
    pub info: &'a mut Option<StreamInfo>,
    pub pic_id: &'a mut u32,
    pub stats: &'a mut DecoderStats,
}

impl<E: DecodeEngine> DriveContext<'_, E> {
    /// 移除引擎已消费的字节
    fn consume(&mut self, consumed: usize) {
        let removed = self.buffer.discard_front(consumed);
        self.stats.bytes_consumed += removed as u64;
    }

    /// 图像就绪: 递增图像编号并分发全部待输出图像
    fn emit_pictures(&mut self) {
        *self.pic_id = self.pic_id.wrapping_add(1);
        let geometry = self.info.map(|info| info.geometry);
        self.dispatcher
            .drain(self.engine, geometry, false, self.stats);
    }

    /// 头部就绪: 刷新帧几何与码流信息
    fn refresh_info(&mut self) {
        let info = self.engine.stream_info();
        self.stats.headers_seen += 1;
        if *self.info != Some(info) {
            debug!(
                "AVCS: 码流头部就绪, {}, crop={:?}, sar={:?}",
                info.geometry, info.crop, info.sample_aspect
            );
        }
        if !info.geometry.is_valid() {
            warn!("AVCS: 引擎报告的帧几何无效, {}", info.geometry);
        }
        *self.info = Some(info);
    }

    fn stop_without_progress(&mut self, status: DecodeStatus) -> DecodeStatus {
        self.stats.no_progress_stops += 1;
        debug!(
            "AVCS: 引擎未消费数据, status={}, 保留 {} 字节待下次送入",
            status,
            self.buffer.len()
        );
        status
    }
}

/// 驱动引擎处理缓冲区中的数据, 返回最后一次引擎状态
pub(crate) fn drive<E: DecodeEngine>(mut ctx: DriveContext<'_, E>) -> DecodeStatus {
    let mut status = DecodeStatus::StreamProcessed;
    // 上一轮是否为未消费字节的继续状态
    let mut stalled = false;

    while !ctx.buffer.is_empty() {
        let len = ctx.buffer.len();
        let step = ctx.engine.decode_step(ctx.buffer.as_slice(), *ctx.pic_id);
        ctx.stats.engine_calls += 1;
        status = step.status;

        let consumed = if step.consumed > len {
            warn!(
                "AVCS: 引擎报告的消费字节数超出缓冲长度, consumed={}, len={}, 已截断",
                step.consumed, len
            );
            len
        } else {
            step.consumed
        };
        trace!(
            "AVCS: decode_step status={}, consumed={}, len={}",
            status, consumed, len
        );

        match status {
            DecodeStatus::HeadersReady => {
                ctx.refresh_info();
                if consumed == 0 {
                    if stalled {
                        return ctx.stop_without_progress(status);
                    }
                    stalled = true;
                    continue;
                }
                stalled = false;
                ctx.consume(consumed);
            }
            DecodeStatus::PictureReady => {
                ctx.emit_pictures();
                ctx.consume(consumed);
                return status;
            }
            DecodeStatus::PictureReadyBufferNotEmpty => {
                ctx.emit_pictures();
                if consumed == 0 {
                    if stalled {
                        return ctx.stop_without_progress(status);
                    }
                    stalled = true;
                    continue;
                }
                stalled = false;
                ctx.consume(consumed);
            }
            DecodeStatus::StreamProcessed => {
                ctx.consume(consumed);
                return status;
            }
            DecodeStatus::StreamError => {
                stalled = false;
                if consumed > 0 {
                    ctx.consume(consumed);
                } else if ctx.buffer.skip_byte() {
                    ctx.stats.resync_bytes_skipped += 1;
                }
                if ctx.buffer.is_empty() {
                    debug!("AVCS: 码流错误, 缓冲区已耗尽");
                    return status;
                }
            }
            DecodeStatus::Other(code) => {
                debug!("AVCS: 引擎返回未分类状态码 {}, 透传给调用方", code);
                ctx.consume(consumed);
                return status;
            }
        }
    }

    status
}
