//! 标量反量化反变换 (参考实现).
//!
//! 所有中间运算按补码回绕, 与 SIMD 通道运算结果一致.

use super::tables::{LEVEL_BAND, LEVEL_SCALE, OUTSIDE_ROW0_MASK, ROW0_AC_MASK, SCAN_TO_RASTER};
use super::{Qp, RangeViolation, in_residual_range};

/// 4x4 反变换蝶形: 输入 (a, b, c, d) 为同一行/列的 4 个元素
#[inline(always)]
fn idct_butterfly(a: i32, b: i32, c: i32, d: i32) -> [i32; 4] {
    let t0 = a.wrapping_add(c);
    let t1 = a.wrapping_sub(c);
    let t2 = (b >> 1).wrapping_sub(d);
    let t3 = b.wrapping_add(d >> 1);
    [
        t0.wrapping_add(t3),
        t1.wrapping_add(t2),
        t1.wrapping_sub(t2),
        t0.wrapping_sub(t3),
    ]
}

/// Hadamard 蝶形 (DC 变换, 不含 >>1)
#[inline(always)]
fn hadamard_butterfly(a: i32, b: i32, c: i32, d: i32) -> [i32; 4] {
    let t0 = a.wrapping_add(c);
    let t1 = a.wrapping_sub(c);
    let t2 = b.wrapping_sub(d);
    let t3 = b.wrapping_add(d);
    [
        t0.wrapping_add(t3),
        t1.wrapping_add(t2),
        t1.wrapping_sub(t2),
        t0.wrapping_sub(t3),
    ]
}

#[inline(always)]
fn round6(v: i32) -> i32 {
    v.wrapping_add(32) >> 6
}

/// 三档缩放因子: levelScale[qp % 6][band] << (qp / 6)
#[inline(always)]
pub(crate) fn block_scales(qp: Qp) -> [i32; 3] {
    let row = &LEVEL_SCALE[qp.rem6()];
    let shift = qp.div6();
    [row[0] << shift, row[1] << shift, row[2] << shift]
}

/// DC 经可选缩放后的值
#[inline(always)]
pub(crate) fn scaled_dc(coeffs: &[i32; 16], scale0: i32, skip_dc: bool) -> i32 {
    if skip_dc {
        coeffs[0]
    } else {
        coeffs[0].wrapping_mul(scale0)
    }
}

/// 仅第 0 行存在系数时的闭式计算: 返回第 0 行的 4 个残差 (已舍入)
///
/// 列变换中只有首元素非零, 四行结果相同.
#[inline(always)]
pub(crate) fn first_row_residual(coeffs: &[i32; 16], dc: i32, scales: [i32; 3]) -> [i32; 4] {
    let b = coeffs[1].wrapping_mul(scales[1]);
    let c = coeffs[5].wrapping_mul(scales[0]);
    let d = coeffs[6].wrapping_mul(scales[1]);
    idct_butterfly(dc, b, c, d).map(round6)
}

/// 反 zigzag + 按位置缩放, 输出光栅顺序
#[inline(always)]
pub(crate) fn dequant_to_raster(coeffs: &[i32; 16], dc: i32, scales: [i32; 3]) -> [i32; 16] {
    let mut raster = [0i32; 16];
    raster[0] = dc;
    for scan in 1..16 {
        let pos = SCAN_TO_RASTER[scan];
        raster[pos] = coeffs[scan].wrapping_mul(scales[LEVEL_BAND[pos]]);
    }
    raster
}

/// 4x4 残差块反量化与反变换
pub fn process_block(
    coeffs: &[i32; 16],
    qp: Qp,
    skip_dc: bool,
    coeff_map: u16,
) -> Result<[i32; 16], RangeViolation> {
    let scales = block_scales(qp);
    let dc = scaled_dc(coeffs, scales[0], skip_dc);

    if coeff_map & OUTSIDE_ROW0_MASK == 0 {
        if coeff_map & ROW0_AC_MASK == 0 {
            // 仅 DC
            let v = round6(dc);
            if !in_residual_range(v) {
                return Err(RangeViolation);
            }
            return Ok([v; 16]);
        }

        let row = first_row_residual(coeffs, dc, scales);
        if !row.iter().all(|&v| in_residual_range(v)) {
            return Err(RangeViolation);
        }
        let mut out = [0i32; 16];
        for chunk in out.chunks_exact_mut(4) {
            chunk.copy_from_slice(&row);
        }
        return Ok(out);
    }

    let mut temp = dequant_to_raster(coeffs, dc, scales);

    // 行变换
    for i in 0..4 {
        let s = i * 4;
        let r = idct_butterfly(temp[s], temp[s + 1], temp[s + 2], temp[s + 3]);
        temp[s..s + 4].copy_from_slice(&r);
    }

    // 列变换
    let mut out = [0i32; 16];
    for j in 0..4 {
        let c = idct_butterfly(temp[j], temp[4 + j], temp[8 + j], temp[12 + j]);
        for (k, &v) in c.iter().enumerate() {
            let v = round6(v);
            if !in_residual_range(v) {
                return Err(RangeViolation);
            }
            out[k * 4 + j] = v;
        }
    }
    Ok(out)
}

/// Luma DC 反量化的缩放与右移参数: (scale, right_shift, bias)
///
/// qp >= 12 时 right_shift 为 0, scale 已包含左移.
#[inline(always)]
pub(crate) fn luma_dc_params(qp: Qp) -> (i32, u32, i32) {
    let scale = LEVEL_SCALE[qp.rem6()][0];
    let qp_div = qp.div6();
    if qp.get() >= 12 {
        (scale << (qp_div - 2), 0, 0)
    } else {
        let bias = if qp_div == 1 { 1 } else { 2 };
        (scale, 2 - qp_div, bias)
    }
}

/// Chroma DC 反量化的缩放与右移参数: (scale, right_shift)
#[inline(always)]
pub(crate) fn chroma_dc_params(qp: Qp) -> (i32, u32) {
    let scale = LEVEL_SCALE[qp.rem6()][0];
    if qp.get() >= 6 {
        (scale << (qp.div6() - 1), 0)
    } else {
        (scale, 1)
    }
}

/// 16 个 Luma DC 系数: 反 zigzag, 4x4 反 Hadamard, 反量化
pub fn process_luma_dc(coeffs: &[i32; 16], qp: Qp) -> [i32; 16] {
    let mut temp = [0i32; 16];
    for (scan, &c) in coeffs.iter().enumerate() {
        temp[SCAN_TO_RASTER[scan]] = c;
    }

    // 行变换
    for i in 0..4 {
        let s = i * 4;
        let r = hadamard_butterfly(temp[s], temp[s + 1], temp[s + 2], temp[s + 3]);
        temp[s..s + 4].copy_from_slice(&r);
    }

    // 列变换与反量化
    let (scale, shift, bias) = luma_dc_params(qp);
    let mut out = [0i32; 16];
    for j in 0..4 {
        let c = hadamard_butterfly(temp[j], temp[4 + j], temp[8 + j], temp[12 + j]);
        for (k, &v) in c.iter().enumerate() {
            out[k * 4 + j] = v.wrapping_mul(scale).wrapping_add(bias) >> shift;
        }
    }
    out
}

/// Cb (0..4) 与 Cr (4..8) 两个 2x2 Chroma DC 块的反 Hadamard 与反量化
pub fn process_chroma_dc(coeffs: &[i32; 8], qp: Qp) -> [i32; 8] {
    let (scale, shift) = chroma_dc_params(qp);
    let mut out = [0i32; 8];
    for (src, dst) in coeffs.chunks_exact(4).zip(out.chunks_exact_mut(4)) {
        let t0 = src[0].wrapping_add(src[2]);
        let t1 = src[0].wrapping_sub(src[2]);
        let t2 = src[1].wrapping_sub(src[3]);
        let t3 = src[1].wrapping_add(src[3]);
        let h = [
            t0.wrapping_add(t3),
            t0.wrapping_sub(t3),
            t1.wrapping_add(t2),
            t1.wrapping_sub(t2),
        ];
        for (d, v) in dst.iter_mut().zip(h) {
            *d = v.wrapping_mul(scale) >> shift;
        }
    }
    out
}
