//! 集成测试公共工具: 简化的 Annex B 模拟引擎与图像记录器

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use avcs::codec::{
    DecodeEngine, DecodeStatus, DecodedPicture, DecoderConfig, EngineOptions, EngineStep,
    StreamDecoder,
};
use avcs::core::{AvcResult, FrameGeometry, StreamInfo};
use bytes::{BufMut, BytesMut};

// ============================================================
// 模拟引擎
// ============================================================

/// 按 Annex B 起始码切分单元的模拟引擎
///
/// - SPS (`0x67, w_mb, h_mb`): 报告头部就绪
/// - IDR / 非 IDR 切片 (`0x65 | 0x41, tag`): 产出一帧, 亮度填充 tag, 色度填充 !tag
/// - 其他 NAL: 在同一次调用内跳过
/// - 单元以下一个起始码结尾, 尚未看到下一个起始码时等待更多数据
/// - 缓冲区头部不是起始码时报告码流错误且不消费
/// - 可选: SPS 之后的第一个切片先以不消费的头部就绪激活参数集, 下一次调用再解码
#[derive(Default)]
pub struct AnnexBEngine {
    pub options: Option<EngineOptions>,
    pub calls: usize,
    pub release_calls: usize,
    /// 每次调用时看到的缓冲区长度
    pub seen_lens: Vec<usize>,
    reorder_delay: usize,
    activation_stall: bool,
    activation_pending: bool,
    geometry: Option<FrameGeometry>,
    pending: VecDeque<(Vec<u8>, u32, bool)>,
    current: Vec<u8>,
}

impl AnnexBEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟显示重排: 保留 `delay` 帧直到 flush (no_reorder 时不保留)
    pub fn with_reorder_delay(delay: usize) -> Self {
        Self {
            reorder_delay: delay,
            ..Default::default()
        }
    }

    /// 模拟参数集激活: 首个切片前有一次不消费字节的调用
    pub fn with_activation_stall() -> Self {
        Self {
            activation_stall: true,
            ..Default::default()
        }
    }

    fn hold_back(&self) -> usize {
        match self.options {
            Some(opts) if opts.no_reorder => 0,
            _ => self.reorder_delay,
        }
    }
}

fn start_code_len(data: &[u8]) -> Option<usize> {
    if data.starts_with(&[0, 0, 1]) {
        Some(3)
    } else if data.starts_with(&[0, 0, 0, 1]) {
        Some(4)
    } else {
        None
    }
}

/// 数据是否可能是尚未接收完整的起始码
fn is_start_code_prefix(data: &[u8]) -> bool {
    [0u8, 0, 1].starts_with(data) || [0u8, 0, 0, 1].starts_with(data)
}

/// 从 `from` 开始查找下一个起始码, 返回当前 NAL 的结束位置
fn find_nal_end(data: &[u8], from: usize) -> Option<usize> {
    let idx = data
        .get(from..)?
        .windows(3)
        .position(|w| w == [0, 0, 1])?
        + from;
    if idx > from && data[idx - 1] == 0 {
        Some(idx - 1)
    } else {
        Some(idx)
    }
}

impl DecodeEngine for AnnexBEngine {
    fn init(&mut self, options: &EngineOptions) -> AvcResult<()> {
        self.options = Some(*options);
        Ok(())
    }

    fn decode_step(&mut self, data: &[u8], pic_id: u32) -> EngineStep {
        self.calls += 1;
        self.seen_lens.push(data.len());

        let mut pos = 0;
        loop {
            let rest = &data[pos..];
            let Some(sc_len) = start_code_len(rest) else {
                if is_start_code_prefix(rest) {
                    return EngineStep::new(DecodeStatus::StreamProcessed, pos);
                }
                return EngineStep::new(DecodeStatus::StreamError, pos);
            };
            let Some(end) = find_nal_end(rest, sc_len + 1) else {
                return EngineStep::new(DecodeStatus::StreamProcessed, pos);
            };
            let nal = &rest[sc_len..end];
            let unit_end = pos + end;

            match nal[0] & 0x1F {
                7 => {
                    let w = u32::from(nal.get(1).copied().unwrap_or(1)) * 16;
                    let h = u32::from(nal.get(2).copied().unwrap_or(1)) * 16;
                    self.geometry = Some(FrameGeometry::new(w, h));
                    self.activation_pending = self.activation_stall;
                    return EngineStep::new(DecodeStatus::HeadersReady, unit_end);
                }
                5 | 1 => {
                    let Some(geometry) = self.geometry else {
                        return EngineStep::new(DecodeStatus::StreamError, unit_end);
                    };
                    if self.activation_pending {
                        if pos > 0 {
                            return EngineStep::new(DecodeStatus::HeadersReady, pos);
                        }
                        self.activation_pending = false;
                        return EngineStep::new(DecodeStatus::HeadersReady, 0);
                    }
                    let tag = nal.get(1).copied().unwrap_or(0);
                    let mut pixels = vec![tag; geometry.luma_len()];
                    pixels.resize(geometry.yuv420_len(), !tag);
                    self.pending.push_back((pixels, pic_id, nal[0] & 0x1F == 5));
                    let status = if unit_end < data.len() {
                        DecodeStatus::PictureReadyBufferNotEmpty
                    } else {
                        DecodeStatus::PictureReady
                    };
                    return EngineStep::new(status, unit_end);
                }
                _ => pos = unit_end,
            }
        }
    }

    fn stream_info(&self) -> StreamInfo {
        StreamInfo::from_geometry(self.geometry.unwrap_or_default())
    }

    fn next_picture(&mut self, flush: bool) -> Option<DecodedPicture<'_>> {
        if self.pending.len() <= self.hold_back() && !(flush && !self.pending.is_empty()) {
            return None;
        }
        let (pixels, pic_id, is_idr) = self.pending.pop_front()?;
        self.current = pixels;
        Some(DecodedPicture {
            pixels: &self.current,
            pic_id,
            is_idr,
            error_macroblocks: 0,
        })
    }

    fn release(&mut self) {
        self.release_calls += 1;
        self.pending.clear();
    }
}

// ============================================================
// 码流构造
// ============================================================

/// 构造 SPS + PPS + 若干切片 + 序列结束的 Annex B 码流
///
/// 第一个切片为 IDR, 其余为非 IDR; `tags` 为每帧的填充值 (不能为 0).
pub fn build_stream(mb_width: u8, mb_height: u8, tags: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    // SPS (4 字节起始码)
    buf.put_slice(&[0, 0, 0, 1, 0x67, mb_width, mb_height]);
    // PPS
    buf.put_slice(&[0, 0, 1, 0x68, 0xCE]);
    for (i, &tag) in tags.iter().enumerate() {
        // SEI 夹在帧之间, 引擎应当跳过
        if i % 2 == 1 {
            buf.put_slice(&[0, 0, 1, 0x06, 0x05, 0x11]);
        }
        let nal_header = if i == 0 { 0x65 } else { 0x41 };
        buf.put_slice(&[0, 0, 1, nal_header, tag, 0x9A]);
    }
    // 序列结束, 作为最后一帧的终止起始码
    buf.put_slice(&[0, 0, 1, 0x0B]);
    buf.to_vec()
}

// ============================================================
// 图像记录
// ============================================================

/// 接收方收到的一帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Captured {
    /// 亮度平面的填充值
    pub fn tag(&self) -> u8 {
        self.pixels[0]
    }
}

pub type Captures = Rc<RefCell<Vec<Captured>>>;

/// 注册一个记录全部图像的接收方
pub fn attach_recorder<E: DecodeEngine>(decoder: &mut StreamDecoder<E>) -> Captures {
    let captures: Captures = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&captures);
    decoder.set_callback(move |pixels: &[u8], width: u32, height: u32| {
        sink.borrow_mut().push(Captured {
            pixels: pixels.to_vec(),
            width,
            height,
        });
    });
    captures
}

/// 创建并初始化解码器
pub fn new_decoder(engine: AnnexBEngine, no_reorder: bool) -> StreamDecoder<AnnexBEngine> {
    let config = DecoderConfig::default().with_initial_buffer_capacity(64);
    let mut decoder = StreamDecoder::new(engine, config);
    if let Err(err) = decoder.init(no_reorder) {
        panic!("解码器初始化失败: {}", err);
    }
    decoder
}

/// 按给定分块大小 (循环使用) 送入整个码流并 flush, 返回收到的全部图像
pub fn decode_in_chunks(engine: AnnexBEngine, stream: &[u8], chunk_sizes: &[usize]) -> Vec<Captured> {
    let mut decoder = new_decoder(engine, false);
    let captures = attach_recorder(&mut decoder);
    let mut pos = 0;
    let mut sizes = chunk_sizes.iter().cycle();
    while pos < stream.len() {
        let size = sizes.next().copied().unwrap_or(stream.len()).max(1);
        let end = (pos + size).min(stream.len());
        if let Err(err) = decoder.decode(&stream[pos..end]) {
            panic!("送入码流失败, pos={}: {}", pos, err);
        }
        pos = end;
    }
    if let Err(err) = decoder.flush() {
        panic!("flush 失败: {}", err);
    }
    let out = captures.borrow().clone();
    out
}

/// 测试日志初始化 (重复调用安全)
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
