//! SSE2 反量化反变换.
//!
//! 4x4 行/列蝶形通过两次转置映射为逐通道运算, 每个 `__m128i` 承载 4 个 i32.
//! 反 zigzag 与缩放沿用标量辅助函数, 逐位结果与 [`super::scalar`] 一致.
//!
//! 所有入口均为 `unsafe fn`, 调用方需确认 CPU 支持 SSE2
//! (见 [`super::TransformEngine::simd_available`]).

#[cfg(target_arch = "x86")]
use std::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use super::scalar::{
    block_scales, chroma_dc_params, dequant_to_raster, first_row_residual, luma_dc_params,
    scaled_dc,
};
use super::tables::{OUTSIDE_ROW0_MASK, ROW0_AC_MASK, SCAN_TO_RASTER};
use super::{Qp, RangeViolation};

// ============================================================
// 向量辅助
// ============================================================

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn load_row(src: &[i32], offset: usize) -> __m128i {
    debug_assert!(offset + 4 <= src.len());
    unsafe { _mm_loadu_si128(src.as_ptr().add(offset) as *const __m128i) }
}

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn store_row(dst: &mut [i32], offset: usize, v: __m128i) {
    debug_assert!(offset + 4 <= dst.len());
    unsafe { _mm_storeu_si128(dst.as_mut_ptr().add(offset) as *mut __m128i, v) }
}

/// 4x4 i32 矩阵转置
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn transpose4(r: [__m128i; 4]) -> [__m128i; 4] {
    unsafe {
        let t0 = _mm_unpacklo_epi32(r[0], r[1]);
        let t1 = _mm_unpacklo_epi32(r[2], r[3]);
        let t2 = _mm_unpackhi_epi32(r[0], r[1]);
        let t3 = _mm_unpackhi_epi32(r[2], r[3]);
        [
            _mm_unpacklo_epi64(t0, t1),
            _mm_unpackhi_epi64(t0, t1),
            _mm_unpacklo_epi64(t2, t3),
            _mm_unpackhi_epi64(t2, t3),
        ]
    }
}

/// 逐通道 4 点反变换蝶形
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn idct_lanes(x: [__m128i; 4]) -> [__m128i; 4] {
    unsafe {
        let t0 = _mm_add_epi32(x[0], x[2]);
        let t1 = _mm_sub_epi32(x[0], x[2]);
        let t2 = _mm_sub_epi32(_mm_srai_epi32(x[1], 1), x[3]);
        let t3 = _mm_add_epi32(x[1], _mm_srai_epi32(x[3], 1));
        [
            _mm_add_epi32(t0, t3),
            _mm_add_epi32(t1, t2),
            _mm_sub_epi32(t1, t2),
            _mm_sub_epi32(t0, t3),
        ]
    }
}

/// 逐通道 4 点 Hadamard 蝶形
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn hadamard_lanes(x: [__m128i; 4]) -> [__m128i; 4] {
    unsafe {
        let t0 = _mm_add_epi32(x[0], x[2]);
        let t1 = _mm_sub_epi32(x[0], x[2]);
        let t2 = _mm_sub_epi32(x[1], x[3]);
        let t3 = _mm_add_epi32(x[1], x[3]);
        [
            _mm_add_epi32(t0, t3),
            _mm_add_epi32(t1, t2),
            _mm_sub_epi32(t1, t2),
            _mm_sub_epi32(t0, t3),
        ]
    }
}

/// (v + 32) >> 6
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn round6(v: __m128i) -> __m128i {
    unsafe { _mm_srai_epi32(_mm_add_epi32(v, _mm_set1_epi32(32)), 6) }
}

/// 4 个通道均位于 [-512, 511]
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn lanes_in_range(v: __m128i) -> bool {
    unsafe {
        let lo = _mm_cmplt_epi32(v, _mm_set1_epi32(-512));
        let hi = _mm_cmpgt_epi32(v, _mm_set1_epi32(511));
        _mm_movemask_epi8(_mm_or_si128(lo, hi)) == 0
    }
}

/// 32 位逐通道乘法取低 32 位 (SSE2 无 `pmulld`)
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn mullo_epi32(a: __m128i, b: __m128i) -> __m128i {
    unsafe {
        let p02 = _mm_mul_epu32(a, b);
        let p13 = _mm_mul_epu32(_mm_srli_epi64(a, 32), _mm_srli_epi64(b, 32));
        let lo02 = _mm_shuffle_epi32(p02, 0b00_00_10_00);
        let lo13 = _mm_shuffle_epi32(p13, 0b00_00_10_00);
        _mm_unpacklo_epi32(lo02, lo13)
    }
}

/// 逐通道 (v * scale + bias) >> shift
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn scale_lanes(v: __m128i, scale: i32, bias: i32, shift: u32) -> __m128i {
    unsafe {
        let v = _mm_add_epi32(mullo_epi32(v, _mm_set1_epi32(scale)), _mm_set1_epi32(bias));
        _mm_sra_epi32(v, _mm_cvtsi32_si128(shift as i32))
    }
}

// ============================================================
// 入口
// ============================================================

/// 4x4 残差块反量化与反变换
///
/// # Safety
///
/// 调用方需确认 CPU 支持 SSE2.
#[target_feature(enable = "sse2")]
pub unsafe fn process_block(
    coeffs: &[i32; 16],
    qp: Qp,
    skip_dc: bool,
    coeff_map: u16,
) -> Result<[i32; 16], RangeViolation> {
    let scales = block_scales(qp);
    let dc = scaled_dc(coeffs, scales[0], skip_dc);
    let mut out = [0i32; 16];

    unsafe {
        if coeff_map & OUTSIDE_ROW0_MASK == 0 {
            let row = if coeff_map & ROW0_AC_MASK == 0 {
                round6(_mm_set1_epi32(dc))
            } else {
                load_row(&first_row_residual(coeffs, dc, scales), 0)
            };
            if !lanes_in_range(row) {
                return Err(RangeViolation);
            }
            for i in 0..4 {
                store_row(&mut out, i * 4, row);
            }
            return Ok(out);
        }

        let raster = dequant_to_raster(coeffs, dc, scales);
        let rows = [
            load_row(&raster, 0),
            load_row(&raster, 4),
            load_row(&raster, 8),
            load_row(&raster, 12),
        ];

        // 行变换: 转置后通道 r 对应第 r 行
        let rows = transpose4(idct_lanes(transpose4(rows)));
        // 列变换: 通道 j 对应第 j 列
        let mut cols = idct_lanes(rows);
        for v in cols.iter_mut() {
            *v = round6(*v);
            if !lanes_in_range(*v) {
                return Err(RangeViolation);
            }
        }
        for (i, &v) in cols.iter().enumerate() {
            store_row(&mut out, i * 4, v);
        }
    }
    Ok(out)
}

/// 16 个 Luma DC 系数: 反 zigzag, 4x4 反 Hadamard, 反量化
///
/// # Safety
///
/// 调用方需确认 CPU 支持 SSE2.
#[target_feature(enable = "sse2")]
pub unsafe fn process_luma_dc(coeffs: &[i32; 16], qp: Qp) -> [i32; 16] {
    let mut raster = [0i32; 16];
    for (scan, &c) in coeffs.iter().enumerate() {
        raster[SCAN_TO_RASTER[scan]] = c;
    }
    let (scale, shift, bias) = luma_dc_params(qp);
    let mut out = [0i32; 16];

    unsafe {
        let rows = [
            load_row(&raster, 0),
            load_row(&raster, 4),
            load_row(&raster, 8),
            load_row(&raster, 12),
        ];
        let rows = transpose4(hadamard_lanes(transpose4(rows)));
        let cols = hadamard_lanes(rows);
        for (i, &v) in cols.iter().enumerate() {
            store_row(&mut out, i * 4, scale_lanes(v, scale, bias, shift));
        }
    }
    out
}

/// Cb/Cr 两个 2x2 Chroma DC 块的反 Hadamard 与反量化
///
/// # Safety
///
/// 调用方需确认 CPU 支持 SSE2.
#[target_feature(enable = "sse2")]
pub unsafe fn process_chroma_dc(coeffs: &[i32; 8], qp: Qp) -> [i32; 8] {
    let (scale, shift) = chroma_dc_params(qp);
    let mut out = [0i32; 8];

    unsafe {
        let cb = load_row(coeffs, 0);
        let cr = load_row(coeffs, 4);
        // a = [d0, d1, d4, d5], b = [d2, d3, d6, d7]
        let a = _mm_unpacklo_epi64(cb, cr);
        let b = _mm_unpackhi_epi64(cb, cr);
        // sum = [t0, t3, t0', t3'], diff = [t1, t2, t1', t2']
        let sum = _mm_add_epi32(a, b);
        let diff = _mm_sub_epi32(a, b);
        // 奇数通道取负
        let neg = _mm_set_epi32(-1, 0, -1, 0);

        for (half, v) in [
            _mm_unpacklo_epi64(sum, diff),
            _mm_unpackhi_epi64(sum, diff),
        ]
        .into_iter()
        .enumerate()
        {
            let lhs = _mm_shuffle_epi32(v, 0b10_10_00_00);
            let rhs = _mm_shuffle_epi32(v, 0b11_11_01_01);
            let rhs = _mm_sub_epi32(_mm_xor_si128(rhs, neg), neg);
            let h = _mm_add_epi32(lhs, rhs);
            store_row(&mut out, half * 4, scale_lanes(h, scale, 0, shift));
        }
    }
    out
}
