use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use avcs_core::{AvcError, AvcResult, FrameGeometry, StreamInfo};

use super::buffer::StreamBuffer;
use super::dispatch::PictureDispatcher;
use super::driver::{DriveContext, drive};
use crate::decoder::DecoderStats;
use crate::engine::{DecodeEngine, DecodeStatus, DecodedPicture, EngineOptions, EngineStep};

use DecodeStatus::*;

// ============================================================
// 脚本引擎
// ============================================================

/// 按预设脚本返回状态的引擎
#[derive(Default)]
struct ScriptedEngine {
    steps: VecDeque<EngineStep>,
    /// 每次调用时看到的缓冲区长度
    seen_lens: Vec<usize>,
    /// 每次调用时看到的图像编号
    seen_pic_ids: Vec<u32>,
    /// 图像就绪后可取出的图像 (像素, pic_id)
    pending: VecDeque<(Vec<u8>, u32)>,
    /// 已交给调用方的最后一帧
    current: Vec<u8>,
    /// 仅在 flush 时输出的缓存图像
    held: VecDeque<(Vec<u8>, u32)>,
    info: StreamInfo,
}

impl ScriptedEngine {
    fn with_steps(steps: &[(DecodeStatus, usize)]) -> Self {
        Self {
            steps: steps.iter().map(|&(s, c)| EngineStep::new(s, c)).collect(),
            info: StreamInfo::from_geometry(FrameGeometry::new(4, 2)),
            ..Default::default()
        }
    }

    fn queue_picture(&mut self, fill: u8, len: usize) {
        let pic_id = self.pending.len() as u32;
        self.pending.push_back((vec![fill; len], pic_id));
    }
}

impl DecodeEngine for ScriptedEngine {
    fn init(&mut self, _options: &EngineOptions) -> AvcResult<()> {
        Ok(())
    }

    fn decode_step(&mut self, data: &[u8], pic_id: u32) -> EngineStep {
        self.seen_lens.push(data.len());
        self.seen_pic_ids.push(pic_id);
        self.steps
            .pop_front()
            .unwrap_or(EngineStep::new(DecodeStatus::StreamProcessed, data.len()))
    }

    fn stream_info(&self) -> StreamInfo {
        self.info
    }

    fn next_picture(&mut self, flush: bool) -> Option<DecodedPicture<'_>> {
        let (pixels, pic_id) = match self.pending.pop_front() {
            Some(p) => p,
            None if flush => self.held.pop_front()?,
            None => return None,
        };
        self.current = pixels;
        Some(DecodedPicture::new(&self.current, pic_id))
    }

    fn release(&mut self) {}
}

/// 驱动一次并返回状态
struct Harness {
    engine: ScriptedEngine,
    buffer: StreamBuffer,
    dispatcher: PictureDispatcher,
    info: Option<StreamInfo>,
    pic_id: u32,
    stats: DecoderStats,
}

impl Harness {
    fn new(engine: ScriptedEngine, data: &[u8]) -> Self {
        let mut buffer = StreamBuffer::with_capacity(16, 1 << 20).unwrap();
        buffer.append(data).unwrap();
        Self {
            engine,
            buffer,
            dispatcher: PictureDispatcher::new(),
            info: None,
            pic_id: 0,
            stats: DecoderStats::default(),
        }
    }

    fn drive(&mut self) -> DecodeStatus {
        drive(DriveContext {
            engine: &mut self.engine,
            buffer: &mut self.buffer,
            dispatcher: &mut self.dispatcher,
            info: &mut self.info,
            pic_id: &mut self.pic_id,
            stats: &mut self.stats,
        })
    }

    /// 注册记录 (首字节, 宽, 高) 的接收方
    fn record_pictures(&mut self) -> Rc<RefCell<Vec<(u8, u32, u32)>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink_log = Rc::clone(&log);
        self.dispatcher
            .set_sink(Some(Box::new(move |pixels: &[u8], w: u32, h: u32| {
                sink_log.borrow_mut().push((pixels[0], w, h));
            })));
        log
    }
}

// ============================================================
// 缓冲区
// ============================================================

#[test]
fn test_buffer_append_preserves_order_across_growth() {
    let mut buf = StreamBuffer::with_capacity(4, 1024).unwrap();
    let mut expect = Vec::new();
    for i in 0..50u8 {
        let chunk = [i, i.wrapping_mul(3), i ^ 0x5A];
        buf.append(&chunk).unwrap();
        expect.extend_from_slice(&chunk);
        assert!(buf.len() <= buf.capacity());
    }
    assert_eq!(buf.as_slice(), expect.as_slice());
}

#[test]
fn test_buffer_growth_at_least_doubles() {
    let mut buf = StreamBuffer::with_capacity(8, 1 << 20).unwrap();
    buf.append(&[0; 8]).unwrap();
    let before = buf.capacity();
    buf.append(&[1]).unwrap();
    assert!(buf.capacity() >= before * 2, "扩容后容量应至少翻倍");
    assert_eq!(buf.len(), 9);
}

#[test]
fn test_buffer_growth_beyond_limit_fails_without_change() {
    let mut buf = StreamBuffer::with_capacity(4, 16).unwrap();
    buf.append(&[1, 2, 3, 4, 5, 6]).unwrap();
    let cap = buf.capacity();
    let err = buf.append(&[0; 11]);
    assert!(matches!(err, Err(AvcError::OutOfMemory(_))));
    assert_eq!(buf.as_slice(), &[1, 2, 3, 4, 5, 6]);
    assert_eq!(buf.capacity(), cap);

    // 恰好达到上限仍可追加
    buf.append(&[0; 10]).unwrap();
    assert_eq!(buf.len(), 16);
}

#[test]
fn test_buffer_compact_and_skip() {
    let mut buf = StreamBuffer::with_capacity(8, 64).unwrap();
    buf.append(&[1, 2, 3, 4, 5]).unwrap();
    buf.compact(2).unwrap();
    assert_eq!(buf.as_slice(), &[3, 4, 5]);
    assert!(matches!(buf.compact(4), Err(AvcError::InvalidArgument(_))));
    assert_eq!(buf.as_slice(), &[3, 4, 5]);

    assert!(buf.skip_byte());
    assert_eq!(buf.as_slice(), &[4, 5]);
    buf.compact(2).unwrap();
    assert!(!buf.skip_byte(), "空缓冲区不能再跳字节");
}

#[test]
fn test_buffer_reset_keeps_capacity_release_frees() {
    let mut buf = StreamBuffer::with_capacity(32, 64).unwrap();
    buf.append(&[9; 20]).unwrap();
    let cap = buf.capacity();
    buf.reset();
    assert!(buf.is_empty());
    assert_eq!(buf.capacity(), cap);
    buf.release();
    assert_eq!(buf.capacity(), 0);
}

// ============================================================
// 驱动循环
// ============================================================

#[test]
fn test_stream_processed_consumes_and_returns() {
    let engine = ScriptedEngine::with_steps(&[(StreamProcessed, 3)]);
    let mut h = Harness::new(engine, &[1, 2, 3, 4, 5]);
    assert_eq!(h.drive(), StreamProcessed);
    assert_eq!(h.buffer.as_slice(), &[4, 5], "未消费的尾部字节应保留");
    assert_eq!(h.stats.engine_calls, 1);
}

#[test]
fn test_headers_then_picture_in_one_call() {
    let mut engine = ScriptedEngine::with_steps(&[(HeadersReady, 4), (PictureReady, 6)]);
    engine.queue_picture(7, 12);
    let mut h = Harness::new(engine, &[0; 12]);
    let log = h.record_pictures();

    assert_eq!(h.drive(), PictureReady);
    assert_eq!(h.info.map(|i| i.geometry), Some(FrameGeometry::new(4, 2)));
    assert_eq!(*log.borrow(), vec![(7, 4, 2)]);
    assert_eq!(h.buffer.len(), 2);
    assert_eq!(h.engine.seen_lens, vec![12, 8]);
    assert_eq!(h.pic_id, 1);
    assert_eq!(h.stats.headers_seen, 1);
}

#[test]
fn test_picture_ready_buffer_not_empty_continues() {
    let mut engine = ScriptedEngine::with_steps(&[
        (PictureReadyBufferNotEmpty, 3),
        (PictureReadyBufferNotEmpty, 3),
        (PictureReady, 3),
    ]);
    engine.info = StreamInfo::from_geometry(FrameGeometry::new(2, 2));
    let mut h = Harness::new(engine, &[0; 9]);
    h.info = Some(StreamInfo::from_geometry(FrameGeometry::new(2, 2)));
    let log = h.record_pictures();
    for fill in 1..=3 {
        h.engine.queue_picture(fill, 6);
    }

    assert_eq!(h.drive(), PictureReady);
    assert!(h.buffer.is_empty());
    // 第一次就绪即取出全部待输出图像
    assert_eq!(log.borrow().len(), 3);
    // 每次图像就绪后编号递增, 新编号用于下一次调用
    assert_eq!(h.engine.seen_pic_ids, vec![0, 1, 2]);
    assert_eq!(h.pic_id, 3);
}

#[test]
fn test_stream_error_with_zero_consumed_skips_one_byte() {
    let engine = ScriptedEngine::with_steps(&[(StreamError, 0), (StreamError, 0), (StreamProcessed, 1)]);
    let mut h = Harness::new(engine, &[0xAA, 0xBB, 0xCC, 0xDD]);
    assert_eq!(h.drive(), StreamProcessed);
    assert_eq!(h.engine.seen_lens, vec![4, 3, 2]);
    assert_eq!(h.buffer.as_slice(), &[0xDD]);
    assert_eq!(h.stats.resync_bytes_skipped, 2);
}

#[test]
fn test_stream_error_exhausting_buffer_returns_error() {
    let engine = ScriptedEngine::with_steps(&[(StreamError, 0), (StreamError, 2)]);
    let mut h = Harness::new(engine, &[1, 2, 3]);
    assert_eq!(h.drive(), StreamError);
    assert!(h.buffer.is_empty());
}

#[test]
fn test_other_status_passes_through() {
    let engine = ScriptedEngine::with_steps(&[(Other(-6), 2)]);
    let mut h = Harness::new(engine, &[1, 2, 3]);
    assert_eq!(h.drive(), Other(-6));
    assert_eq!(h.buffer.as_slice(), &[3]);
}

#[test]
fn test_consumed_beyond_length_is_clamped() {
    let engine = ScriptedEngine::with_steps(&[(HeadersReady, 100)]);
    let mut h = Harness::new(engine, &[1, 2, 3]);
    assert_eq!(h.drive(), HeadersReady);
    assert!(h.buffer.is_empty());
    assert_eq!(h.stats.bytes_consumed, 3);
}

#[test]
fn test_single_zero_consumption_then_progress_keeps_draining() {
    // 引擎激活参数集或隐藏未完成图像时会有一次不消费, 下一次以相同数据前进
    let engine = ScriptedEngine::with_steps(&[
        (HeadersReady, 0),
        (PictureReadyBufferNotEmpty, 4),
        (PictureReadyBufferNotEmpty, 0),
        (PictureReady, 4),
    ]);
    let mut h = Harness::new(engine, &[0; 8]);
    assert_eq!(h.drive(), PictureReady);
    assert!(h.buffer.is_empty(), "一次未消费后仍应取完全部可解码单元");
    assert_eq!(h.engine.seen_lens, vec![8, 8, 4, 4]);
    assert_eq!(h.stats.no_progress_stops, 0);
    assert_eq!(h.pic_id, 3);
}

#[test]
fn test_headers_ready_twice_without_progress_stops_loop() {
    let engine = ScriptedEngine::with_steps(&[(HeadersReady, 0), (HeadersReady, 0), (HeadersReady, 3)]);
    let mut h = Harness::new(engine, &[1, 2, 3]);
    assert_eq!(h.drive(), HeadersReady);
    assert_eq!(h.engine.seen_lens, vec![3, 3], "连续两次未消费时应返回");
    assert_eq!(h.buffer.len(), 3, "字节保留到下次送入");
    assert_eq!(h.stats.no_progress_stops, 1);
}

#[test]
fn test_picture_ready_buffer_not_empty_twice_without_progress_stops_loop() {
    let mut engine = ScriptedEngine::with_steps(&[
        (PictureReadyBufferNotEmpty, 0),
        (PictureReadyBufferNotEmpty, 0),
    ]);
    engine.queue_picture(5, 12);
    let mut h = Harness::new(engine, &[1, 2]);
    h.info = Some(StreamInfo::from_geometry(FrameGeometry::new(4, 2)));
    let log = h.record_pictures();
    assert_eq!(h.drive(), PictureReadyBufferNotEmpty);
    assert_eq!(log.borrow().len(), 1, "已就绪的图像仍需输出");
    assert_eq!(h.buffer.len(), 2);
    assert_eq!(h.engine.seen_lens.len(), 2);
    assert_eq!(h.stats.no_progress_stops, 1);
}

#[test]
fn test_mixed_continue_statuses_without_progress_stop_loop() {
    let engine = ScriptedEngine::with_steps(&[(HeadersReady, 0), (PictureReadyBufferNotEmpty, 0)]);
    let mut h = Harness::new(engine, &[7; 5]);
    assert_eq!(h.drive(), PictureReadyBufferNotEmpty);
    assert_eq!(h.buffer.len(), 5);
    assert_eq!(h.stats.engine_calls, 2);
}

#[test]
fn test_iterations_bounded_by_length() {
    // 引擎每次只报告错误且不消费: 逐字节跳过, 调用次数等于长度
    let steps = vec![(StreamError, 0); 64];
    let engine = ScriptedEngine::with_steps(&steps);
    let mut h = Harness::new(engine, &[0x55; 32]);
    assert_eq!(h.drive(), StreamError);
    assert_eq!(h.stats.engine_calls, 32);
}

#[test]
fn test_alternating_stall_and_progress_stays_bounded() {
    // 每次前进之前都有一次未消费: 调用次数为 2 * len, 不超过 2 * len + 2
    let steps: Vec<(DecodeStatus, usize)> = (0..16)
        .map(|i| (HeadersReady, if i % 2 == 0 { 0 } else { 1 }))
        .collect();
    let engine = ScriptedEngine::with_steps(&steps);
    let mut h = Harness::new(engine, &[0x11; 8]);
    assert_eq!(h.drive(), HeadersReady);
    assert!(h.buffer.is_empty());
    assert_eq!(h.stats.engine_calls, 16);
    assert!(h.stats.engine_calls <= 2 * 8 + 2);
    assert_eq!(h.stats.no_progress_stops, 0);
}

// ============================================================
// 图像分发
// ============================================================

#[test]
fn test_pictures_without_sink_are_dropped() {
    let mut engine = ScriptedEngine::with_steps(&[(PictureReady, 1)]);
    engine.queue_picture(1, 12);
    engine.queue_picture(2, 12);
    let mut h = Harness::new(engine, &[0]);
    h.info = Some(StreamInfo::from_geometry(FrameGeometry::new(4, 2)));
    assert_eq!(h.drive(), PictureReady);
    assert!(h.engine.pending.is_empty(), "无接收方时仍需取出全部图像");
    assert_eq!(h.stats.pictures_dropped, 2);
    assert_eq!(h.stats.pictures_emitted, 0);
}

#[test]
fn test_picture_before_geometry_is_dropped() {
    let mut engine = ScriptedEngine::with_steps(&[(PictureReady, 1)]);
    engine.queue_picture(1, 12);
    let mut h = Harness::new(engine, &[0]);
    let log = h.record_pictures();
    assert_eq!(h.drive(), PictureReady);
    assert!(log.borrow().is_empty());
    assert_eq!(h.stats.pictures_dropped, 1);
}

#[test]
fn test_short_pixel_buffer_is_dropped() {
    let mut engine = ScriptedEngine::with_steps(&[(PictureReady, 1)]);
    // 4x2 需要 8 + 2 * 2 = 12 字节
    engine.queue_picture(1, 11);
    engine.queue_picture(2, 12);
    let mut h = Harness::new(engine, &[0]);
    h.info = Some(StreamInfo::from_geometry(FrameGeometry::new(4, 2)));
    let log = h.record_pictures();
    assert_eq!(h.drive(), PictureReady);
    assert_eq!(*log.borrow(), vec![(2, 4, 2)]);
    assert_eq!(h.stats.pictures_dropped, 1);
    assert_eq!(h.stats.pictures_emitted, 1);
}

#[test]
fn test_flush_drains_held_pictures() {
    let mut engine = ScriptedEngine::with_steps(&[]);
    engine.held.push_back((vec![9; 12], 0));
    engine.held.push_back((vec![8; 12], 1));
    let mut h = Harness::new(engine, &[]);
    let log = h.record_pictures();
    let geometry = Some(FrameGeometry::new(4, 2));

    let emitted = h
        .dispatcher
        .drain(&mut h.engine, geometry, false, &mut h.stats);
    assert_eq!(emitted, 0, "非 flush 模式不输出缓存图像");

    let emitted = h
        .dispatcher
        .drain(&mut h.engine, geometry, true, &mut h.stats);
    assert_eq!(emitted, 2);
    assert_eq!(*log.borrow(), vec![(9, 4, 2), (8, 4, 2)]);
}
