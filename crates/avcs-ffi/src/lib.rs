//! # avcs-ffi
//!
//! avcs C FFI 导出层.
//!
//! 将 [`avcs_codec::StreamDecoder`] 导出为回调式 C 接口, 编译为
//! DLL (Windows) / SO (Linux) / dylib (macOS) / WASM 供宿主调用.
//! 外部解码引擎由宿主以函数表 [`AvcsEngineVTable`] 提供.
//!
//! # 命名规范
//!
//! 所有导出函数以 `avcs_` 前缀命名, 例如:
//! - `avcs_decoder_create()` - 创建解码器
//! - `avcs_decoder_decode()` - 送入码流
//!
//! # 返回值
//!
//! `avcs_decoder_decode()` 返回引擎状态码 (见 [`avcs_codec::engine::status_code`]),
//! 前置条件不满足时返回 `-1`, 缓冲区扩容失败时返回 `-4`.
//!
//! # 内存管理
//!
//! - 由 avcs 创建的解码器句柄必须通过 `avcs_decoder_destroy()` 释放
//! - 回调收到的像素指针仅在回调期间有效

use std::cell::RefCell;
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::ptr;
use std::slice;

use avcs_codec::engine::status_code;
use avcs_codec::{
    DecodeEngine, DecodeStatus, DecodedPicture, DecoderConfig, EngineOptions, EngineStep,
    PictureSink, StreamDecoder,
};
use avcs_core::{AvcError, AvcResult, CropWindow, FrameGeometry, StreamInfo};
use log::warn;

// ============================================================
// 版本信息
// ============================================================

/// 获取 avcs 版本号字符串
///
/// # Safety
///
/// 返回的指针在程序生命周期内有效, 无需释放.
#[unsafe(no_mangle)]
pub extern "C" fn avcs_version() -> *const c_char {
    c"0.1.0".as_ptr()
}

/// 获取 avcs 版本号的数字表示
///
/// 格式: (主版本 << 16) | (次版本 << 8) | 修订版本
#[unsafe(no_mangle)]
pub extern "C" fn avcs_version_int() -> u32 {
    let (major, minor, patch): (u32, u32, u32) = (0, 1, 0);
    (major << 16) | (minor << 8) | patch
}

/// 获取 avcs 构建配置信息
///
/// # Safety
///
/// 返回的指针在程序生命周期内有效.
#[unsafe(no_mangle)]
pub extern "C" fn avcs_build_info() -> *const c_char {
    if avcs_codec::TransformEngine::simd_available() {
        c"avcs 0.1.0 -- H.264 码流前端 (sse2)".as_ptr()
    } else {
        c"avcs 0.1.0 -- H.264 码流前端 (scalar)".as_ptr()
    }
}

// ============================================================
// 宿主引擎函数表
// ============================================================

/// 码流信息 (对应引擎 GetInfo)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct AvcsStreamInfo {
    pub width: u32,
    pub height: u32,
    /// 非零表示存在裁剪窗口
    pub crop_flag: u32,
    pub crop_left: u32,
    pub crop_top: u32,
    pub crop_width: u32,
    pub crop_height: u32,
    pub sar_width: u32,
    pub sar_height: u32,
}

impl From<AvcsStreamInfo> for StreamInfo {
    fn from(raw: AvcsStreamInfo) -> Self {
        let crop = (raw.crop_flag != 0).then_some(CropWindow {
            left: raw.crop_left,
            top: raw.crop_top,
            width: raw.crop_width,
            height: raw.crop_height,
        });
        StreamInfo {
            geometry: FrameGeometry::new(raw.width, raw.height),
            crop,
            sample_aspect: (raw.sar_width, raw.sar_height),
        }
    }
}

/// 引擎输出的一帧图像 (对应引擎 NextPicture)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AvcsPicture {
    /// YUV 4:2:0 连续平面数据, 由引擎持有
    pub pixels: *const u8,
    /// `pixels` 的字节数
    pub len: usize,
    pub pic_id: u32,
    pub is_idr: u32,
    pub error_mbs: u32,
}

impl Default for AvcsPicture {
    fn default() -> Self {
        Self {
            pixels: ptr::null(),
            len: 0,
            pic_id: 0,
            is_idr: 0,
            error_mbs: 0,
        }
    }
}

/// 引擎初始化: 返回 0 表示成功
pub type AvcsEngineInitFn =
    unsafe extern "C" fn(user_data: *mut c_void, disable_reordering: c_int, concealment: c_uint) -> c_int;

/// 解码一个单元: 返回引擎状态码, 通过 `consumed` 写回读取的字节数
pub type AvcsEngineDecodeFn = unsafe extern "C" fn(
    user_data: *mut c_void,
    data: *const u8,
    len: usize,
    pic_id: u32,
    consumed: *mut usize,
) -> c_int;

/// 查询码流信息
pub type AvcsEngineGetInfoFn =
    unsafe extern "C" fn(user_data: *mut c_void, info: *mut AvcsStreamInfo) -> c_int;

/// 取出下一帧: 有图像时返回 `PIC_RDY` (2)
pub type AvcsEngineNextPictureFn =
    unsafe extern "C" fn(user_data: *mut c_void, flush: c_int, picture: *mut AvcsPicture) -> c_int;

/// 释放引擎
pub type AvcsEngineReleaseFn = unsafe extern "C" fn(user_data: *mut c_void);

/// 宿主提供的解码引擎函数表
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AvcsEngineVTable {
    /// 原样传给各回调的宿主数据
    pub user_data: *mut c_void,
    pub init: Option<AvcsEngineInitFn>,
    pub decode: Option<AvcsEngineDecodeFn>,
    pub get_info: Option<AvcsEngineGetInfoFn>,
    pub next_picture: Option<AvcsEngineNextPictureFn>,
    pub release: Option<AvcsEngineReleaseFn>,
}

/// 以函数表实现的外部引擎
struct VTableEngine {
    vtable: AvcsEngineVTable,
}

impl DecodeEngine for VTableEngine {
    fn init(&mut self, options: &EngineOptions) -> AvcResult<()> {
        let Some(init) = self.vtable.init else {
            return Err(AvcError::EngineInitFailed("函数表缺少 init".into()));
        };
        // 安全: 函数表在创建时由宿主保证有效
        let ret = unsafe {
            init(
                self.vtable.user_data,
                c_int::from(options.no_reorder),
                options.concealment.code() as c_uint,
            )
        };
        if ret == status_code::OK {
            Ok(())
        } else {
            Err(AvcError::EngineInitFailed(format!("引擎返回 {ret}")))
        }
    }

    fn decode_step(&mut self, data: &[u8], pic_id: u32) -> EngineStep {
        let Some(decode) = self.vtable.decode else {
            return EngineStep::new(DecodeStatus::Other(status_code::PARAM_ERR), 0);
        };
        let mut consumed = 0usize;
        let ret = unsafe {
            decode(
                self.vtable.user_data,
                data.as_ptr(),
                data.len(),
                pic_id,
                &mut consumed,
            )
        };
        EngineStep::new(DecodeStatus::from_code(ret), consumed)
    }

    fn stream_info(&self) -> StreamInfo {
        let mut raw = AvcsStreamInfo::default();
        if let Some(get_info) = self.vtable.get_info {
            let ret = unsafe { get_info(self.vtable.user_data, &mut raw) };
            if ret != status_code::OK {
                warn!("AVCS: 引擎查询码流信息失败, ret={}", ret);
                return StreamInfo::default();
            }
        }
        raw.into()
    }

    fn next_picture(&mut self, flush: bool) -> Option<DecodedPicture<'_>> {
        let next_picture = self.vtable.next_picture?;
        let mut raw = AvcsPicture::default();
        let ret = unsafe { next_picture(self.vtable.user_data, c_int::from(flush), &mut raw) };
        if ret != status_code::PIC_RDY || raw.pixels.is_null() {
            return None;
        }
        // 安全: 引擎保证像素缓冲在下一次引擎调用前有效, 借用期限绑定到 &mut self
        let pixels = unsafe { slice::from_raw_parts(raw.pixels, raw.len) };
        Some(DecodedPicture {
            pixels,
            pic_id: raw.pic_id,
            is_idr: raw.is_idr != 0,
            error_macroblocks: raw.error_mbs,
        })
    }

    fn release(&mut self) {
        if let Some(release) = self.vtable.release {
            unsafe { release(self.vtable.user_data) };
        }
    }
}

// ============================================================
// 图像回调
// ============================================================

/// 图像回调: (yuv, width, height, user_data)
pub type AvcsPictureCallback =
    extern "C" fn(yuv: *const u8, width: c_int, height: c_int, user_data: *mut c_void);

struct CallbackSink {
    callback: AvcsPictureCallback,
    user_data: *mut c_void,
}

impl PictureSink for CallbackSink {
    fn on_picture(&mut self, pixels: &[u8], width: u32, height: u32) {
        let (Ok(c_width), Ok(c_height)) = (c_int::try_from(width), c_int::try_from(height)) else {
            warn!("AVCS: 图像尺寸超出 C int 范围, 丢弃, {}x{}", width, height);
            return;
        };
        (self.callback)(pixels.as_ptr(), c_width, c_height, self.user_data);
    }
}

// ============================================================
// 解码器
// ============================================================

/// 不透明解码器句柄
///
/// 解码器位于 `RefCell` 中, 所有导出函数只取共享引用.
/// 图像回调期间 (解码器已被借出) 对同一句柄的调用被拒绝.
pub struct AvcsDecoder {
    inner: RefCell<StreamDecoder<VTableEngine>>,
}

impl AvcsDecoder {
    /// 借出内部解码器执行 `f`, 重入时返回 `None`
    fn with_inner<R>(&self, op: &str, f: impl FnOnce(&mut StreamDecoder<VTableEngine>) -> R) -> Option<R> {
        match self.inner.try_borrow_mut() {
            Ok(mut inner) => Some(f(&mut inner)),
            Err(_) => {
                warn!("AVCS: 图像回调内重入 {}, 已拒绝", op);
                None
            }
        }
    }
}

/// 创建解码器
///
/// 返回的句柄必须通过 [`avcs_decoder_destroy`] 释放.
///
/// # Safety
///
/// 函数表中的函数指针与 `user_data` 必须在句柄销毁前保持有效.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avcs_decoder_create(engine: AvcsEngineVTable) -> *mut AvcsDecoder {
    let decoder = AvcsDecoder {
        inner: RefCell::new(StreamDecoder::new(
            VTableEngine { vtable: engine },
            DecoderConfig::default(),
        )),
    };
    Box::into_raw(Box::new(decoder))
}

/// 初始化解码器
///
/// 返回 0 表示成功 (包括已初始化), -1 表示失败或在回调内重入.
///
/// # Safety
///
/// `dec` 必须为 [`avcs_decoder_create`] 返回且尚未销毁的句柄, 或为空指针.
/// 不得在同一句柄的图像回调或引擎函数中调用 (重入返回 -1).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avcs_decoder_init(dec: *mut AvcsDecoder, disable_reordering: c_int) -> c_int {
    let Some(dec) = (unsafe { dec.as_ref() }) else {
        return -1;
    };
    match dec.with_inner("init", |inner| inner.init(disable_reordering != 0)) {
        Some(Ok(_)) => 0,
        Some(Err(err)) => {
            warn!("AVCS: 解码器初始化失败: {}", err);
            -1
        }
        None => -1,
    }
}

/// 注册图像回调, `callback` 为空时注销
///
/// # Safety
///
/// `dec` 必须为有效句柄或空指针; `user_data` 在回调注册期间必须保持有效.
/// 在同一句柄的回调中调用时不做任何修改.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avcs_decoder_set_callback(
    dec: *mut AvcsDecoder,
    callback: Option<AvcsPictureCallback>,
    user_data: *mut c_void,
) {
    let Some(dec) = (unsafe { dec.as_ref() }) else {
        return;
    };
    let sink = callback.map(|callback| {
        Box::new(CallbackSink {
            callback,
            user_data,
        }) as Box<dyn PictureSink>
    });
    dec.with_inner("set_callback", |inner| inner.set_sink(sink));
}

/// 送入一段码流
///
/// # 返回
/// - 最后一次引擎状态码 (见 [`avcs_codec::engine::status_code`])
/// - `-1`: 句柄或缓冲区为空, 长度为 0, 解码器未初始化, 或在回调内重入
/// - `-4`: 缓冲区扩容失败
///
/// # Safety
///
/// `dec` 必须为有效句柄或空指针; `buf` 必须指向至少 `len` 个可读字节.
/// 图像回调在本函数内同步执行, 回调中对同一句柄的调用均被拒绝.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avcs_decoder_decode(dec: *mut AvcsDecoder, buf: *const u8, len: usize) -> c_int {
    let Some(dec) = (unsafe { dec.as_ref() }) else {
        return -1;
    };
    if buf.is_null() || len == 0 {
        return -1;
    }
    let chunk = unsafe { slice::from_raw_parts(buf, len) };
    match dec.with_inner("decode", |inner| inner.decode(chunk)) {
        Some(Ok(status)) => status.code(),
        Some(Err(AvcError::OutOfMemory(_))) => status_code::MEMFAIL,
        Some(Err(_)) | None => -1,
    }
}

/// 丢弃缓冲区中未消费的字节
///
/// # Safety
///
/// `dec` 必须为有效句柄或空指针. 在同一句柄的回调中调用时不做任何修改.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avcs_decoder_reset_buffer(dec: *mut AvcsDecoder) {
    if let Some(dec) = unsafe { dec.as_ref() } {
        dec.with_inner("reset_buffer", |inner| inner.reset_buffer());
    }
}

/// 释放引擎与缓冲区, 可重复调用; 句柄本身仍需销毁
///
/// # Safety
///
/// `dec` 必须为有效句柄或空指针. 在同一句柄的回调中调用时不做任何修改.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avcs_decoder_release(dec: *mut AvcsDecoder) {
    if let Some(dec) = unsafe { dec.as_ref() } {
        dec.with_inner("release", |inner| inner.release());
    }
}

/// 销毁解码器句柄
///
/// # Safety
///
/// `dec` 必须为 [`avcs_decoder_create`] 返回的句柄或空指针, 销毁后不可再使用.
/// 在同一句柄的回调中调用时句柄不会被销毁, 需在 `avcs_decoder_decode` 返回后再次调用.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avcs_decoder_destroy(dec: *mut AvcsDecoder) {
    let Some(handle) = (unsafe { dec.as_ref() }) else {
        return;
    };
    if handle.inner.try_borrow_mut().is_err() {
        warn!("AVCS: 图像回调内重入 destroy, 已拒绝");
        return;
    }
    drop(unsafe { Box::from_raw(dec) });
}
