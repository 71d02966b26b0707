//! 反量化与扫描顺序常量表.

/// LevelScale 表 (H.264 Table 8-14): [qP % 6][band]
/// band: 0=偶行偶列, 1=偶行奇列/奇行偶列, 2=奇行奇列
pub const LEVEL_SCALE: [[i32; 3]; 6] = [
    [10, 13, 16],
    [11, 14, 18],
    [13, 16, 20],
    [14, 18, 23],
    [16, 20, 25],
    [18, 23, 29],
];

/// qp % 6
pub const QP_MOD6: [u8; 52] = [
    0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1,
    2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1, 2, 3,
];

/// qp / 6
pub const QP_DIV6: [u8; 52] = [
    0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4, 5, 5,
    5, 5, 5, 5, 6, 6, 6, 6, 6, 6, 7, 7, 7, 7, 7, 7, 8, 8, 8, 8,
];

/// 4x4 zigzag 扫描 (帧编码): scan_pos → 光栅位置 (row * 4 + col)
pub const SCAN_TO_RASTER: [usize; 16] = [0, 1, 4, 8, 5, 2, 3, 6, 9, 12, 13, 10, 7, 11, 14, 15];

/// 光栅位置 → LevelScale 列
pub const LEVEL_BAND: [usize; 16] = [0, 1, 0, 1, 1, 2, 1, 2, 0, 1, 0, 1, 1, 2, 1, 2];

/// 扫描位置 1, 5, 6 (第 0 行的 AC 系数)
pub const ROW0_AC_MASK: u16 = 0x0062;

/// 第 0 行以外的全部 AC 扫描位置
pub const OUTSIDE_ROW0_MASK: u16 = 0xFF9C;
