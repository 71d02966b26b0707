//! 解码器上下文.
//!
//! [`StreamDecoder`] 持有外部引擎, 码流缓冲区, 图像接收方, 当前帧几何与图像编号.
//! 多个实例可以同时存在, 互不影响.
//!
//! 使用流程:
//! 1. `init()` 初始化引擎并分配缓冲区
//! 2. `set_sink()` / `set_callback()` 注册图像接收方
//! 3. 反复 `decode()` 送入任意大小的码流块
//! 4. 码流结束时 `flush()` 取出引擎缓存的图像
//! 5. `release()` 或直接 drop 释放资源

use avcs_core::{AvcError, AvcResult, FrameGeometry, StreamInfo};
use log::{debug, warn};

use crate::config::DecoderConfig;
use crate::engine::{DecodeEngine, DecodeStatus, EngineOptions};
use crate::stream::driver::{self, DriveContext};
use crate::stream::{PictureDispatcher, PictureSink, StreamBuffer};
use crate::transform::TransformEngine;

/// 初始化结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    /// 本次调用完成初始化
    Initialized,
    /// 已初始化, 未做任何修改
    AlreadyInitialized,
}

/// 解码统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// 送入的字节数
    pub bytes_fed: u64,
    /// 引擎消费的字节数
    pub bytes_consumed: u64,
    /// 失步恢复跳过的字节数
    pub resync_bytes_skipped: u64,
    /// 头部就绪次数
    pub headers_seen: u64,
    /// 从引擎取出的图像数
    pub pictures_decoded: u64,
    /// 交付给接收方的图像数
    pub pictures_emitted: u64,
    /// 丢弃的图像数
    pub pictures_dropped: u64,
    /// 引擎未消费数据而提前返回的次数
    pub no_progress_stops: u64,
    /// 引擎 decode_step 调用次数
    pub engine_calls: u64,
}

/// 码流解码器
pub struct StreamDecoder<E: DecodeEngine> {
    engine: E,
    config: DecoderConfig,
    buffer: Option<StreamBuffer>,
    dispatcher: PictureDispatcher,
    info: Option<StreamInfo>,
    pic_id: u32,
    transform: TransformEngine,
    stats: DecoderStats,
}

impl<E: DecodeEngine> StreamDecoder<E> {
    /// 创建解码器, 不分配缓冲区也不初始化引擎
    pub fn new(engine: E, config: DecoderConfig) -> Self {
        Self {
            engine,
            config,
            buffer: None,
            dispatcher: PictureDispatcher::new(),
            info: None,
            pic_id: 0,
            transform: TransformEngine::Scalar,
            stats: DecoderStats::default(),
        }
    }

    /// 初始化引擎并分配码流缓冲区
    ///
    /// 重复调用不做任何修改, 返回 [`InitStatus::AlreadyInitialized`].
    pub fn init(&mut self, no_reorder: bool) -> AvcResult<InitStatus> {
        if self.buffer.is_some() {
            return Ok(InitStatus::AlreadyInitialized);
        }

        let transform = TransformEngine::from_preference(self.config.transform);
        let options = EngineOptions {
            no_reorder,
            concealment: self.config.concealment,
            transform,
        };
        self.engine.init(&options).map_err(|err| {
            warn!("AVCS: 引擎初始化失败: {}", err);
            match err {
                AvcError::EngineInitFailed(msg) => AvcError::EngineInitFailed(msg),
                other => AvcError::EngineInitFailed(other.to_string()),
            }
        })?;

        let buffer = match StreamBuffer::with_capacity(
            self.config.initial_buffer_capacity,
            self.config.max_buffer_capacity,
        ) {
            Ok(buffer) => buffer,
            Err(err) => {
                self.engine.release();
                return Err(err);
            }
        };

        self.config.no_reorder = no_reorder;
        self.transform = transform;
        self.buffer = Some(buffer);
        self.info = None;
        self.pic_id = 0;
        debug!(
            "AVCS: 解码器初始化完成, no_reorder={}, transform={}, concealment={:?}",
            no_reorder,
            transform.name(),
            self.config.concealment
        );
        Ok(InitStatus::Initialized)
    }

    /// 替换图像接收方, `None` 表示注销, 下一帧输出时生效
    pub fn set_sink(&mut self, sink: Option<Box<dyn PictureSink>>) {
        self.dispatcher.set_sink(sink);
    }

    /// 以闭包注册图像接收方
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&[u8], u32, u32) + 'static,
    {
        self.dispatcher.set_sink(Some(Box::new(callback)));
    }

    /// 送入一段码流并驱动引擎, 返回最后一次引擎状态
    ///
    /// 前置条件不满足时不触碰缓冲区.
    pub fn decode(&mut self, chunk: &[u8]) -> AvcResult<DecodeStatus> {
        let Some(buffer) = self.buffer.as_mut() else {
            return Err(AvcError::NotInitialized);
        };
        if chunk.is_empty() {
            return Err(AvcError::InvalidArgument("输入码流为空".into()));
        }

        buffer.append(chunk).inspect_err(|err| {
            warn!("AVCS: 追加码流失败: {}", err);
        })?;
        self.stats.bytes_fed += chunk.len() as u64;

        let status = driver::drive(DriveContext {
            engine: &mut self.engine,
            buffer,
            dispatcher: &mut self.dispatcher,
            info: &mut self.info,
            pic_id: &mut self.pic_id,
            stats: &mut self.stats,
        });
        Ok(status)
    }

    /// 码流结束: 输出引擎中缓存的全部图像, 返回交付给接收方的帧数
    pub fn flush(&mut self) -> AvcResult<usize> {
        if self.buffer.is_none() {
            return Err(AvcError::NotInitialized);
        }
        let geometry = self.geometry();
        let emitted = self
            .dispatcher
            .drain(&mut self.engine, geometry, true, &mut self.stats);
        debug!("AVCS: flush 输出 {} 帧", emitted);
        Ok(emitted)
    }

    /// 丢弃缓冲区中全部未消费字节, 不影响引擎状态
    pub fn reset_buffer(&mut self) {
        if let Some(buffer) = self.buffer.as_mut() {
            if !buffer.is_empty() {
                debug!("AVCS: 重置码流缓冲区, 丢弃 {} 字节", buffer.len());
            }
            buffer.reset();
        }
    }

    /// 释放引擎与缓冲区, 可重复调用
    pub fn release(&mut self) {
        if let Some(mut buffer) = self.buffer.take() {
            self.engine.release();
            buffer.release();
            self.info = None;
            debug!("AVCS: 解码器已释放");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.buffer.is_some()
    }

    /// 当前帧几何, 头部就绪之前为 `None`
    pub fn geometry(&self) -> Option<FrameGeometry> {
        self.info.map(|info| info.geometry)
    }

    pub fn stream_info(&self) -> Option<StreamInfo> {
        self.info
    }

    /// 缓冲区中未消费的字节数
    pub fn buffered_len(&self) -> usize {
        self.buffer.as_ref().map_or(0, StreamBuffer::len)
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.as_ref().map_or(0, StreamBuffer::capacity)
    }

    /// 下一次送入引擎的图像编号
    pub fn pic_id(&self) -> u32 {
        self.pic_id
    }

    /// 初始化时选定的反变换后端
    pub fn transform_engine(&self) -> TransformEngine {
        self.transform
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

impl<E: DecodeEngine> Drop for StreamDecoder<E> {
    fn drop(&mut self) {
        self.release();
    }
}
