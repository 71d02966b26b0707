//! H.264 残差反量化与反变换.
//!
//! 包含 4x4 残差块, 16 个 Luma DC 与 2x2 Chroma DC 的反量化和整数反变换.
//!
//! # 后端
//!
//! - [`scalar`]: 标量参考实现
//! - `simd`: x86 SSE2 实现 (启用 `simd` feature 时编译, 运行期检测)
//!
//! 两个后端对任意输入给出逐位相同的结果, 包括越界判定.
//! [`TransformEngine`] 在两者之间分发, 由外部解码引擎在宏块重建时调用.
//!
//! # 示例
//!
//! ```rust
//! use avcs_codec::transform::{Qp, TransformEngine};
//!
//! let engine = TransformEngine::detect();
//! let mut coeffs = [0i32; 16];
//! coeffs[0] = 100;
//! let out = engine.process_block(&coeffs, Qp::new(26).unwrap(), false, 0x0001).unwrap();
//! assert!(out.iter().all(|&v| v == 325));
//! ```

pub mod scalar;
#[cfg(all(feature = "simd", any(target_arch = "x86", target_arch = "x86_64")))]
pub mod simd;
pub mod tables;


use std::fmt;

use avcs_core::{AvcError, AvcResult};
use log::{debug, warn};
use thiserror::Error;

use tables::{QP_DIV6, QP_MOD6};

// ============================================================
// 量化参数
// ============================================================

/// 最大量化参数
pub const MAX_QP: u8 = 51;

/// 量化参数, 保证位于 [0, 51]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Qp(u8);

impl Qp {
    /// 校验并创建量化参数
    pub const fn new(value: u8) -> Option<Self> {
        if value <= MAX_QP {
            Some(Self(value))
        } else {
            None
        }
    }

    /// 原始数值
    pub const fn get(self) -> u8 {
        self.0
    }

    /// qp % 6
    #[inline]
    pub fn rem6(self) -> usize {
        QP_MOD6[self.0 as usize] as usize
    }

    /// qp / 6
    #[inline]
    pub fn div6(self) -> u32 {
        u32::from(QP_DIV6[self.0 as usize])
    }

    /// 遍历全部合法量化参数
    pub fn all() -> impl Iterator<Item = Qp> {
        (0..=MAX_QP).map(Qp)
    }
}

impl TryFrom<u8> for Qp {
    type Error = AvcError;

    fn try_from(value: u8) -> AvcResult<Self> {
        Self::new(value)
            .ok_or_else(|| AvcError::InvalidArgument(format!("qp 超出 [0, 51], qp={value}")))
    }
}

impl TryFrom<i32> for Qp {
    type Error = AvcError;

    fn try_from(value: i32) -> AvcResult<Self> {
        u8::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| AvcError::InvalidArgument(format!("qp 超出 [0, 51], qp={value}")))
    }
}

impl fmt::Display for Qp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================
// 越界错误
// ============================================================

/// 反变换输出超出 [-512, 511], 整块需丢弃
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("反变换结果超出有效范围 [-512, 511]")]
pub struct RangeViolation;

impl From<RangeViolation> for AvcError {
    fn from(_: RangeViolation) -> Self {
        AvcError::RangeViolation
    }
}

/// 反变换输出是否位于 [-512, 511]
#[inline(always)]
pub(crate) fn in_residual_range(v: i32) -> bool {
    (v.wrapping_add(512) as u32) <= 1023
}

// ============================================================
// 后端选择
// ============================================================

/// 反变换后端偏好 (来自配置)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformPreference {
    /// 运行期检测, 优先 SIMD
    #[default]
    Auto,
    /// 强制标量
    Scalar,
    /// 请求 SIMD, 不可用时回退标量
    Simd,
}

/// 反变换引擎
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformEngine {
    /// 标量参考实现
    Scalar,
    /// SSE2 实现
    Simd,
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::detect()
    }
}

impl TransformEngine {
    /// 当前 CPU 是否支持 SIMD 后端
    pub fn simd_available() -> bool {
        #[cfg(all(feature = "simd", any(target_arch = "x86", target_arch = "x86_64")))]
        {
            is_x86_feature_detected!("sse2")
        }
        #[cfg(not(all(feature = "simd", any(target_arch = "x86", target_arch = "x86_64"))))]
        {
            false
        }
    }

    /// 运行期检测最佳后端
    pub fn detect() -> Self {
        if Self::simd_available() {
            Self::Simd
        } else {
            Self::Scalar
        }
    }

    /// 按配置偏好选择后端
    pub fn from_preference(pref: TransformPreference) -> Self {
        let engine = match pref {
            TransformPreference::Auto => Self::detect(),
            TransformPreference::Scalar => Self::Scalar,
            TransformPreference::Simd => {
                if Self::simd_available() {
                    Self::Simd
                } else {
                    warn!("AVCS: 请求 SIMD 反变换但当前平台不可用, 回退标量实现");
                    Self::Scalar
                }
            }
        };
        debug!("AVCS: 反变换后端={}, pref={:?}", engine.name(), pref);
        engine
    }

    /// 后端名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Simd => "sse2",
        }
    }

    /// 4x4 残差块: 反 zigzag, 反量化, 反变换
    ///
    /// # 参数
    /// - `coeffs`: 扫描顺序系数
    /// - `skip_dc`: DC 已在块外完成缩放 (Intra16x16 / 色度), 不再乘以 scale
    /// - `coeff_map`: 第 i 位表示扫描位置 i 的系数非零
    ///
    /// # 返回
    /// 光栅顺序残差, 或 [`RangeViolation`]
    #[inline]
    pub fn process_block(
        &self,
        coeffs: &[i32; 16],
        qp: Qp,
        skip_dc: bool,
        coeff_map: u16,
    ) -> Result<[i32; 16], RangeViolation> {
        match self {
            Self::Scalar => scalar::process_block(coeffs, qp, skip_dc, coeff_map),
            #[cfg(all(feature = "simd", any(target_arch = "x86", target_arch = "x86_64")))]
            Self::Simd if Self::simd_available() => {
                // 安全: 已确认 CPU 支持 SSE2
                unsafe { simd::process_block(coeffs, qp, skip_dc, coeff_map) }
            }
            Self::Simd => scalar::process_block(coeffs, qp, skip_dc, coeff_map),
        }
    }

    /// 16 个 Luma DC 系数: 反 zigzag, 反 Hadamard, 反量化
    #[inline]
    pub fn process_luma_dc(&self, coeffs: &[i32; 16], qp: Qp) -> [i32; 16] {
        match self {
            Self::Scalar => scalar::process_luma_dc(coeffs, qp),
            #[cfg(all(feature = "simd", any(target_arch = "x86", target_arch = "x86_64")))]
            Self::Simd if Self::simd_available() => unsafe { simd::process_luma_dc(coeffs, qp) },
            Self::Simd => scalar::process_luma_dc(coeffs, qp),
        }
    }

    /// Cb/Cr 两个 2x2 Chroma DC 块: 反 Hadamard, 反量化
    #[inline]
    pub fn process_chroma_dc(&self, coeffs: &[i32; 8], qp: Qp) -> [i32; 8] {
        match self {
            Self::Scalar => scalar::process_chroma_dc(coeffs, qp),
            #[cfg(all(feature = "simd", any(target_arch = "x86", target_arch = "x86_64")))]
            Self::Simd if Self::simd_available() => unsafe { simd::process_chroma_dc(coeffs, qp) },
            Self::Simd => scalar::process_chroma_dc(coeffs, qp),
        }
    }
}
